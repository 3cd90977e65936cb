use std::{fmt, process, time::Duration};

use base64::{Engine as _, engine::general_purpose::STANDARD};
use rand::Rng;
use serde_json::{Map, Value};

use crate::config::BuzzApiConfig;

/// How the service should deliver the result of one request.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RequestMode {
    /// The result comes back in the response to the submission.
    Sync,
    /// The submission returns a message id; the result is polled for.
    Async,
}

impl RequestMode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            RequestMode::Sync => "sync",
            RequestMode::Async => "async",
        }
    }
}

impl From<bool> for RequestMode {
    fn from(sync: bool) -> Self {
        if sync { RequestMode::Sync } else { RequestMode::Async }
    }
}

/// Client-generated correlation id, `from-{pid}@{host}-rand{n}`.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Handle(String);

impl Handle {
    pub fn generate() -> Self {
        Self(format!(
            "from-{}@{}-rand{}",
            process::id(),
            hostname(),
            rand::rng().random_range(0..32768u32)
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn hostname() -> String {
    std::env::var("HOSTNAME")
        .or_else(|_| std::env::var("COMPUTERNAME"))
        .ok()
        .filter(|h| !h.is_empty())
        .unwrap_or_else(|| {
            std::fs::read_to_string("/etc/hostname")
                .map(|s| s.trim().to_string())
                .ok()
                .filter(|h| !h.is_empty())
                .unwrap_or_else(|| "localhost".to_string())
        })
}

/// One unit of work for the service.
///
/// The handle is fixed at construction and reused for the whole lifetime of the
/// request.
#[derive(Clone, Debug)]
pub struct ApiRequest {
    pub resource: String,
    pub operation: String,
    pub payload: Map<String, Value>,
    pub mode: RequestMode,
    pub handle: Handle,
}

impl ApiRequest {
    /// A string `handle` in the payload is used as-is instead of a generated one.
    pub fn new(
        resource: impl Into<String>,
        operation: impl Into<String>,
        payload: Map<String, Value>,
        mode: RequestMode,
    ) -> Self {
        let handle = match payload.get("handle").and_then(Value::as_str) {
            Some(h) if !h.is_empty() => Handle(h.to_string()),
            _ => Handle::generate(),
        };
        Self {
            resource: resource.into(),
            operation: operation.into(),
            payload,
            mode,
            handle,
        }
    }

    /// The JSON body of the submission: the payload with the credential fields laid
    /// over it.
    pub(crate) fn body(&self, credentials: &Credentials) -> Map<String, Value> {
        let mut body = self.payload.clone();
        body.insert("handle".to_string(), Value::String(self.handle.0.clone()));
        body.insert(
            "api_app_id".to_string(),
            Value::String(credentials.app_id.clone()),
        );
        body.insert(
            "api_app_password".to_string(),
            Value::String(credentials.encoded_password.clone()),
        );
        body.insert(
            "api_request_mode".to_string(),
            Value::String(self.mode.as_str().to_string()),
        );
        body.insert(
            "api_receive_timeout".to_string(),
            Value::from(credentials.receive_timeout.as_millis() as u64),
        );
        body
    }
}

/// Fixed per-client fields merged into every submission.
#[derive(Clone)]
pub(crate) struct Credentials {
    app_id: String,
    encoded_password: String,
    receive_timeout: Duration,
}

impl Credentials {
    pub(crate) fn receive_timeout(&self) -> Duration {
        self.receive_timeout
    }

    pub(crate) fn from_config(config: &BuzzApiConfig) -> Self {
        Self {
            app_id: config.api_user.clone(),
            encoded_password: STANDARD.encode(config.api_password.as_bytes()),
            receive_timeout: config.api_receive_timeout,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("app_id", &self.app_id)
            .field("encoded_password", &"<redacted>")
            .field("receive_timeout", &self.receive_timeout)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn credentials() -> Credentials {
        Credentials::from_config(
            &BuzzApiConfig::builder()
                .api_user("app")
                .api_password("secret")
                .api_receive_timeout(Duration::from_millis(1234))
                .build(),
        )
    }

    #[test]
    fn generated_handle_has_expected_shape() {
        let handle = Handle::generate();
        let text = handle.as_str();
        assert!(text.starts_with(&format!("from-{}@", process::id())));
        let (_, random) = text.rsplit_once("-rand").expect("random suffix");
        let n: u32 = random.parse().expect("numeric suffix");
        assert!(n < 32768);
    }

    #[test]
    fn payload_handle_overrides_generated_one() {
        let payload = json!({"handle": "my-handle", "x": 1});
        let request = ApiRequest::new(
            "test",
            "test",
            payload.as_object().cloned().unwrap_or_default(),
            RequestMode::Sync,
        );
        assert_eq!(request.handle.as_str(), "my-handle");
    }

    #[test]
    fn body_merges_payload_and_credentials() {
        let payload = json!({"gtid": "900000000", "api_app_id": "spoofed"});
        let request = ApiRequest::new(
            "central.iam.gted.accounts",
            "search",
            payload.as_object().cloned().unwrap_or_default(),
            RequestMode::Async,
        );

        let body = request.body(&credentials());
        assert_eq!(body["gtid"], json!("900000000"));
        assert_eq!(body["api_app_id"], json!("app"));
        assert_eq!(body["api_app_password"], json!("c2VjcmV0"));
        assert_eq!(body["api_request_mode"], json!("async"));
        assert_eq!(body["api_receive_timeout"], json!(1234));
        assert_eq!(body["handle"], json!(request.handle.as_str()));
    }

    #[test]
    fn credentials_debug_is_redacted() {
        let rendered = format!("{:?}", credentials());
        assert!(!rendered.contains("c2VjcmV0"));
    }

    #[test]
    fn mode_from_sync_flag() {
        assert_eq!(RequestMode::from(true), RequestMode::Sync);
        assert_eq!(RequestMode::from(false), RequestMode::Async);
    }
}
