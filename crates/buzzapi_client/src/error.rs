use std::time::Duration;

use admission_limiter::Error as TransportError;
use serde_json::Value;
use snafu::Snafu;

/// Coarse classification of a failed request.
///
/// Callers that only need to decide how to react can match on this instead of on
/// every [`BuzzApiError`] variant.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// No response was obtained at all.
    Transport,
    /// The server answered with a status above 299.
    HttpStatus,
    /// The envelope carried `api_error_info`, or was not shaped like an envelope.
    Protocol,
    /// The result wrapper arrived with an empty inner result; the upstream gave up.
    StaleResult,
    /// The client-side receive timeout expired while polling.
    Timeout,
}

impl ErrorKind {
    pub const fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Transport => "transport",
            ErrorKind::HttpStatus => "http_status",
            ErrorKind::Protocol => "protocol",
            ErrorKind::StaleResult => "stale_result",
            ErrorKind::Timeout => "timeout",
        }
    }
}

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum BuzzApiError {
    #[snafu(display("BuzzApi transport error: {source}"))]
    Transport { source: TransportError },

    #[snafu(display("Failed to build BuzzApi request: {message}"))]
    RequestBuild { message: String },

    #[snafu(display("BuzzApi error (HTTP status {status})"))]
    HttpStatus { status: u16, raw_body: Option<Value> },

    #[snafu(display("BuzzApi returned error_info: {error_info}"))]
    Protocol {
        error_info: Value,
        raw_body: Option<Value>,
    },

    #[snafu(display("BuzzApi response is missing {field}"))]
    MalformedEnvelope {
        field: &'static str,
        raw_body: Option<Value>,
    },

    #[snafu(display(
        "BuzzAPI returned an empty result for {message_id}, this usually means it timed out requesting a resource"
    ))]
    StaleResult {
        message_id: String,
        raw_body: Option<Value>,
    },

    #[snafu(display("Request timed out for: {message_id}"))]
    Timeout {
        message_id: String,
        elapsed: Duration,
    },
}

impl BuzzApiError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            BuzzApiError::Transport { .. } | BuzzApiError::RequestBuild { .. } => {
                ErrorKind::Transport
            }
            BuzzApiError::HttpStatus { .. } => ErrorKind::HttpStatus,
            BuzzApiError::Protocol { .. } | BuzzApiError::MalformedEnvelope { .. } => {
                ErrorKind::Protocol
            }
            BuzzApiError::StaleResult { .. } => ErrorKind::StaleResult,
            BuzzApiError::Timeout { .. } => ErrorKind::Timeout,
        }
    }

    /// The body the server sent, if any.
    ///
    /// Always `None` for failures that never produced a response.
    pub fn raw_body(&self) -> Option<&Value> {
        match self {
            BuzzApiError::HttpStatus { raw_body, .. }
            | BuzzApiError::Protocol { raw_body, .. }
            | BuzzApiError::MalformedEnvelope { raw_body, .. }
            | BuzzApiError::StaleResult { raw_body, .. } => raw_body.as_ref(),
            BuzzApiError::Transport { .. }
            | BuzzApiError::RequestBuild { .. }
            | BuzzApiError::Timeout { .. } => None,
        }
    }

    /// The service's `api_error_info` object for protocol errors.
    pub fn error_info(&self) -> Option<&Value> {
        match self {
            BuzzApiError::Protocol { error_info, .. } => Some(error_info),
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            BuzzApiError::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// The message id of the pending result this error concerns, if polling had begun.
    pub fn message_id(&self) -> Option<&str> {
        match self {
            BuzzApiError::StaleResult { message_id, .. } | BuzzApiError::Timeout { message_id, .. } => {
                Some(message_id)
            }
            _ => None,
        }
    }
}
