use admission_limiter::{Error as TransportError, admission::http::RawResponse};
use serde_json::Value;

use crate::{
    envelope::{self, EnvelopeDepth},
    error::BuzzApiError,
};

/// Turns one transport outcome into either the response body or a classified error.
///
/// The body is clean only when the exchange produced a response, the status is in
/// the 2xx range, a body came back, and it carries no `api_error_info` at `depth`.
/// Otherwise the most specific kind wins: a protocol error field, then a
/// non-success status, then the transport failure.
pub fn classify(
    outcome: Result<RawResponse, TransportError>,
    depth: EnvelopeDepth,
) -> Result<Value, BuzzApiError> {
    let RawResponse { status, body } = match outcome {
        Ok(response) => response,
        Err(source) => return Err(BuzzApiError::Transport { source }),
    };

    let error_info = body
        .as_ref()
        .and_then(|body| envelope::error_info(body, depth))
        .cloned();
    if let Some(error_info) = error_info {
        return Err(BuzzApiError::Protocol {
            error_info,
            raw_body: body,
        });
    }

    if !status.is_success() {
        return Err(BuzzApiError::HttpStatus {
            status: status.as_u16(),
            raw_body: body,
        });
    }

    body.ok_or(BuzzApiError::MalformedEnvelope {
        field: "response body",
        raw_body: None,
    })
}
