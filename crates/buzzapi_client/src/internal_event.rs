use std::time::Duration;

use admission_limiter::admission::internal_event::InternalEvent;
use metrics::{counter, histogram};

use crate::error::ErrorKind;

/// One poll of a pending asynchronous result.
#[derive(Clone, Copy, Debug)]
pub struct PollAttempt {
    pub ready: bool,
}

impl InternalEvent for PollAttempt {
    fn emit(self) {
        counter!("buzzapi_poll_attempts", "ready" => if self.ready { "true" } else { "false" })
            .increment(1);
    }
}

/// Wall-clock time from admission to terminal outcome.
#[derive(Clone, Copy, Debug)]
pub struct RequestCompleted {
    pub elapsed: Duration,
    pub success: bool,
}

impl InternalEvent for RequestCompleted {
    fn emit(self) {
        histogram!(
            "buzzapi_request_duration_seconds",
            "outcome" => if self.success { "success" } else { "failure" }
        )
        .record(self.elapsed);
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RequestFailed {
    pub kind: ErrorKind,
}

impl InternalEvent for RequestFailed {
    fn emit(self) {
        counter!("buzzapi_errors_total", "kind" => self.kind.as_str()).increment(1);
        debug!(target: "buzzapi_client", kind = self.kind.as_str(), "Request failed");
    }
}
