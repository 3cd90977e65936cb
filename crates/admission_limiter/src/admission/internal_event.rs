use std::time::Duration;

use metrics::{gauge, histogram};

/// An observable occurrence inside the limiter or a client built on it.
///
/// Each event records its metrics and logs under the `admission_limiter::stats` target.
pub trait InternalEvent {
    fn emit(self);
}

#[derive(Clone, Copy, Debug)]
pub struct AdmissionInFlight(pub usize);

impl InternalEvent for AdmissionInFlight {
    fn emit(self) {
        gauge!("admission_in_flight").set(self.0 as f64);
        trace!(target: "admission_limiter::stats", in_flight = self.0, "In-flight Updated");
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AdmissionQueued(pub usize);

impl InternalEvent for AdmissionQueued {
    fn emit(self) {
        gauge!("admission_queued").set(self.0 as f64);
        trace!(target: "admission_limiter::stats", queued = self.0, "Queue Depth Updated");
    }
}

#[derive(Clone, Copy, Debug)]
pub struct AdmissionWaitTime(pub Duration);

impl InternalEvent for AdmissionWaitTime {
    fn emit(self) {
        histogram!("admission_wait_seconds").record(self.0);
        debug!(
            target: "admission_limiter::stats",
            waited_ms = self.0.as_millis(),
            "Queued operation admitted"
        );
    }
}
