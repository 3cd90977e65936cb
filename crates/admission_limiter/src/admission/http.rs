// src/admission/http.rs
use std::time::Duration;

use crate::Error as CrateError;
use http::StatusCode;
use serde_json::Value;
use snafu::Snafu;

/// Failures that leave the caller without any response from the server.
///
/// A non-success status is *not* an `HttpError`: transports hand those back as a
/// [`RawResponse`] so the caller can inspect the body that came with it.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum HttpError {
    /// An error occurred during the transport of the request (e.g., network issue, DNS).
    #[snafu(display("HTTP transport error: {}", source))]
    Transport { source: CrateError },

    /// The request itself was malformed or invalid before sending.
    #[snafu(display("Invalid HTTP request: {}", details))]
    InvalidRequest { details: String },

    /// A timeout occurred.
    #[snafu(display("HTTP request timed out"))]
    Timeout,

    /// The response arrived but its body could not be read.
    #[snafu(display("Failed to read response body: {}", source))]
    ReadBody { source: CrateError },

    /// Other, unspecified HTTP client errors.
    #[snafu(display("Generic HTTP client error: {}", source))]
    ClientError { source: CrateError },
}

/// Longest time to wait for the complete response to one request.
///
/// Set as an `http::Request` extension. Requests without it wait as long as the
/// server keeps the connection open.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ResponseDeadline(pub Duration);

/// Status and decoded body of one HTTP exchange.
///
/// `body` is `None` when the server sent nothing, a JSON value when the body parsed
/// as JSON, and a JSON string holding the raw text otherwise.
#[derive(Clone, Debug, PartialEq)]
pub struct RawResponse {
    pub status: StatusCode,
    pub body: Option<Value>,
}

impl RawResponse {
    pub fn new(status: StatusCode, body: Option<Value>) -> Self {
        Self { status, body }
    }

    /// Decodes a body the way a JSON-expecting client sees it.
    pub fn from_text(status: StatusCode, text: &str) -> Self {
        let body = if text.trim().is_empty() {
            None
        } else {
            Some(serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string())))
        };
        Self { status, body }
    }

    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn json_body_is_decoded() {
        let response = RawResponse::from_text(StatusCode::OK, r#"{"api_result_data": 1}"#);
        assert_eq!(response.body, Some(json!({"api_result_data": 1})));
        assert!(response.is_success());
    }

    #[test]
    fn plain_text_body_is_kept_as_string() {
        let response = RawResponse::from_text(StatusCode::NOT_FOUND, "Not Found");
        assert_eq!(response.body, Some(Value::String("Not Found".to_string())));
        assert!(!response.is_success());
    }

    #[test]
    fn empty_body_is_absent() {
        let response = RawResponse::from_text(StatusCode::BAD_REQUEST, "");
        assert_eq!(response.body, None);
    }
}
