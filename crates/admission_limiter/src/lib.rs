//! Bounded admission control for clients of remote batch APIs
//!
//! This crate provides the building blocks that service-specific clients compose:
//! a fixed-capacity admission controller that queues overflow strictly in arrival
//! order, a `tower::Service` wrapper for `reqwest` that reports raw status and body,
//! and a jittered delay source for poll loops.
//!
//! # Admission Overview
//!
//! 1. **Immediate admission**: while fewer than `capacity` slots are held, `acquire`
//!    returns a slot at once
//! 2. **Queuing**: otherwise the caller waits in a FIFO queue
//! 3. **Hand-off**: dropping a slot passes it straight to the earliest waiter, so the
//!    number of held slots never exceeds the capacity
//!
//! # Safety & Concurrency
//! - Thread-safe: counter and queue live behind a single mutex
//! - No unsafe code
//!
//! # Basic Usage
//! ```
//! use admission_limiter::admission::{AdmissionController, AdmissionSettings};
//!
//! # async fn demo() {
//! let controller = AdmissionController::new(AdmissionSettings::builder().capacity(4).build());
//! let slot = controller.acquire().await;
//! // ... perform one operation while holding the slot ...
//! drop(slot);
//! # }
//! ```
//!
//! # Metrics
//! Emits gauges and histograms via the `metrics` facade, see [`admission::internal_event`].
pub mod admission;

#[macro_use]
extern crate tracing;

pub type Error = Box<dyn std::error::Error + Send + Sync + 'static>;
