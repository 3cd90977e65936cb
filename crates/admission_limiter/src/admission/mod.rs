//! Limit the max number of operations being concurrently processed.

mod controller;

pub mod backoff;
pub mod http;
pub mod internal_event;
pub mod reqwest_integration;

pub use controller::{AdmissionController, AdmissionSlot, AdmissionStats};

use bon::Builder;

/// Configuration of the admission controller.
///
/// | Parameter | Default | Description |
/// |-----------|---------|-------------|
/// | `capacity` | 20 | Maximum number of operations holding a slot at once |
///
/// # Example
///
/// ```rust
/// use admission_limiter::admission::AdmissionSettings;
///
/// let settings = AdmissionSettings::builder().capacity(8).build();
/// assert_eq!(settings.capacity(), 8);
/// ```
#[derive(Clone, Copy, Debug, Builder)]
pub struct AdmissionSettings {
    /// Number of slots available to concurrent operations.
    ///
    /// Every operation holds exactly one slot from admission until its terminal
    /// outcome, including any time spent polling for an asynchronous result.
    ///
    /// **Default**: 20
    #[builder(default = default_capacity())]
    pub(super) capacity: usize,
}

/// Returns the default capacity (20).
const fn default_capacity() -> usize {
    20
}

impl Default for AdmissionSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl AdmissionSettings {
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}
