//! Client for the BuzzAPI batch-processing service.
//!
//! Work items are submitted with [`BuzzApiClient::post`]. In synchronous mode the
//! service answers with the result directly; in asynchronous mode it answers with a
//! message id, and the client polls `api.my_messages` until the result is ready, the
//! service reports an error, or the receive timeout expires.
//!
//! At most `capacity` requests (default 20) are in flight at once. Further requests
//! wait and are admitted in the order they arrived, see
//! [`admission_limiter::admission::AdmissionController`].
//!
//! ```rust,no_run
//! use buzzapi_client::{BuzzApiClient, BuzzApiConfig};
//! use serde_json::json;
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let client = BuzzApiClient::new(
//!     BuzzApiConfig::builder()
//!         .api_user("my-app")
//!         .api_password("secret")
//!         .build(),
//! )?;
//!
//! let payload = json!({"gtid": "900000000"});
//! let result = client
//!     .post("central.iam.gted.accounts", "search", payload.as_object().cloned().unwrap_or_default())
//!     .await?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```
//!
//! Failures carry an [`ErrorKind`] and, whenever the server sent one, the raw
//! response body ([`BuzzApiError::raw_body`]).

pub mod classify;
pub mod client;
pub mod config;
pub mod envelope;
pub mod error;
pub mod internal_event;
pub mod poll;
pub mod request;
pub mod submit;
pub mod transport;

pub use client::BuzzApiClient;
pub use config::{BuzzApiConfig, ConfigError};
pub use error::{BuzzApiError, ErrorKind};
pub use request::{ApiRequest, Handle, RequestMode};
pub use transport::{ApiCall, Transport};

#[macro_use]
extern crate tracing;
