//! Field names and shape rules of the BuzzAPI response envelope.
//!
//! Submission responses look like `{api_result_data, api_app_ticket?, api_error_info?}`.
//! Poll responses nest a second envelope inside `api_result_data`.

use serde_json::Value;

pub const RESULT_DATA: &str = "api_result_data";
pub const ERROR_INFO: &str = "api_error_info";
pub const APP_TICKET: &str = "api_app_ticket";

/// How deep to look for `api_error_info`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EnvelopeDepth {
    /// Submission responses: only the top level.
    Outer,
    /// Poll responses: the top level, then inside `api_result_data`.
    OuterOrNested,
}

/// Missing, null, and empty strings, arrays, and objects count as empty.
pub fn is_empty(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Object(o)) => o.is_empty(),
        Some(Value::Bool(_)) | Some(Value::Number(_)) => false,
    }
}

/// Falsy scalars (`null`, `false`, `""`, zero) mean "no error info". Objects and
/// arrays always count, even when empty.
fn present(value: Option<&Value>) -> Option<&Value> {
    value.filter(|v| match v {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::String(s) => !s.is_empty(),
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::Array(_) | Value::Object(_) => true,
    })
}

/// The service-level error object at the requested depth, if any.
pub fn error_info(body: &Value, depth: EnvelopeDepth) -> Option<&Value> {
    let outer = present(body.get(ERROR_INFO));
    match depth {
        EnvelopeDepth::Outer => outer,
        EnvelopeDepth::OuterOrNested => outer.or_else(|| {
            present(body.get(RESULT_DATA).and_then(|data| data.get(ERROR_INFO)))
        }),
    }
}

/// What one clean poll response says about the pending result.
#[derive(Clone, Debug, PartialEq)]
pub enum PollStep {
    /// Outer `api_result_data` is empty: the work is still running.
    NotReady,
    /// The wrapper arrived but its inner result is empty: the upstream gave up.
    UpstreamGaveUp,
    /// The inner result, passed through unmodified.
    Ready(Value),
}

impl PollStep {
    pub fn interpret(body: &Value) -> Self {
        let outer = body.get(RESULT_DATA);
        if is_empty(outer) {
            return PollStep::NotReady;
        }

        let inner = outer.and_then(|data| data.get(RESULT_DATA));
        match inner {
            Some(value) if !is_empty(Some(value)) => PollStep::Ready(value.clone()),
            _ => PollStep::UpstreamGaveUp,
        }
    }
}

/// Message id and ticket from an asynchronous submission response.
///
/// Numeric message ids are rendered as strings.
pub fn message_id(body: &Value) -> Option<String> {
    match body.get(RESULT_DATA)? {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

pub fn app_ticket(body: &Value) -> Option<&str> {
    body.get(APP_TICKET)
        .and_then(Value::as_str)
        .filter(|t| !t.is_empty())
}
