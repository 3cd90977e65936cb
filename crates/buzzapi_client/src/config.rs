use std::{env, fmt, str::FromStr, time::Duration};

use admission_limiter::admission::{AdmissionSettings, backoff::PollBackoff};
use bon::Builder;
use snafu::{OptionExt, ResultExt, Snafu, ensure};
use url::Url;

pub const DEFAULT_SERVER: &str = "https://api.gatech.edu";
pub const DEFAULT_RECEIVE_TIMEOUT: Duration = Duration::from_millis(900_000);
/// How long the service may hold a poll open before answering "not ready".
pub const DEFAULT_POLL_WAIT: Duration = Duration::from_millis(5000);
/// Slack added to the time the server may take before the client stops waiting for
/// a response: `api_receive_timeout` for submissions, `poll_wait` for polls.
pub const RESPONSE_MARGIN: Duration = Duration::from_secs(60);
pub const DEFAULT_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

// --- Configuration Environment Variable Names ---
pub const ENV_API_USER: &str = "BUZZAPI_USER";
pub const ENV_API_PASSWORD: &str = "BUZZAPI_PASSWORD";
pub const ENV_SERVER: &str = "BUZZAPI_SERVER";
pub const ENV_SYNC: &str = "BUZZAPI_SYNC";
pub const ENV_RECEIVE_TIMEOUT_MS: &str = "BUZZAPI_RECEIVE_TIMEOUT_MS";
pub const ENV_CAPACITY: &str = "BUZZAPI_CAPACITY";

#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum ConfigError {
    #[snafu(display("Required environment variable '{name}' not set"))]
    MissingVariable { name: &'static str },

    #[snafu(display("Invalid server URL '{server}': {source}"))]
    InvalidServer {
        server: String,
        source: url::ParseError,
    },

    #[snafu(display("Admission capacity must be at least 1"))]
    ZeroCapacity,

    #[snafu(display("Poll delay window is inverted: min {min:?} > max {max:?}"))]
    InvertedPollWindow { min: Duration, max: Duration },

    #[snafu(display("Failed to build HTTP client: {source}"))]
    HttpClient { source: reqwest::Error },
}

/// Construction-time settings of a [`crate::BuzzApiClient`].
///
/// ```rust
/// use buzzapi_client::BuzzApiConfig;
/// use std::time::Duration;
///
/// let config = BuzzApiConfig::builder()
///     .api_user("app-id")
///     .api_password("secret")
///     .sync(true)
///     .api_receive_timeout(Duration::from_secs(60))
///     .build();
/// assert_eq!(config.server, "https://api.gatech.edu");
/// ```
#[derive(Clone, Builder)]
pub struct BuzzApiConfig {
    /// Application id, sent as `api_app_id`.
    #[builder(into)]
    pub api_user: String,

    /// Application password in plain text; base64-encoded before it is sent.
    #[builder(into)]
    pub api_password: String,

    /// Selects `api_request_mode`: `sync` when true, `async` otherwise.
    #[builder(default)]
    pub sync: bool,

    /// How long the service may take, and how long the client keeps polling.
    #[builder(default = DEFAULT_RECEIVE_TIMEOUT)]
    pub api_receive_timeout: Duration,

    #[builder(into, default = DEFAULT_SERVER.to_string())]
    pub server: String,

    #[builder(default)]
    pub admission: AdmissionSettings,

    #[builder(default = DEFAULT_POLL_WAIT)]
    pub poll_wait: Duration,

    /// Delay between polls that found the result not ready yet.
    #[builder(default)]
    pub poll_backoff: PollBackoff,

    #[builder(into, default = DEFAULT_USER_AGENT.to_string())]
    pub user_agent: String,

    /// Pre-built client to use instead of the default one.
    pub reqwest_client: Option<reqwest::Client>,
}

impl BuzzApiConfig {
    /// Loads settings from `BUZZAPI_*` environment variables.
    ///
    /// User and password are required; every other variable falls back to its
    /// default, with a warning when present but unparsable.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| env::var(name).ok())
    }

    pub(crate) fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let api_user = lookup(ENV_API_USER).context(MissingVariableSnafu { name: ENV_API_USER })?;
        let api_password =
            lookup(ENV_API_PASSWORD).context(MissingVariableSnafu { name: ENV_API_PASSWORD })?;

        let receive_timeout_ms = parse_var(
            &lookup,
            ENV_RECEIVE_TIMEOUT_MS,
            DEFAULT_RECEIVE_TIMEOUT.as_millis() as u64,
        );
        let capacity = parse_var(
            &lookup,
            ENV_CAPACITY,
            AdmissionSettings::default().capacity(),
        );

        let config = Self::builder()
            .api_user(api_user)
            .api_password(api_password)
            .sync(parse_var(&lookup, ENV_SYNC, false))
            .api_receive_timeout(Duration::from_millis(receive_timeout_ms))
            .server(lookup(ENV_SERVER).unwrap_or_else(|| DEFAULT_SERVER.to_string()))
            .admission(AdmissionSettings::builder().capacity(capacity).build())
            .build();

        info!(target: "config_loading", ?config, "BuzzApi configuration loaded.");
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        Url::parse(&self.server).context(InvalidServerSnafu {
            server: self.server.clone(),
        })?;
        ensure!(self.admission.capacity() > 0, ZeroCapacitySnafu);
        ensure!(
            self.poll_backoff.min_delay() <= self.poll_backoff.max_delay(),
            InvertedPollWindowSnafu {
                min: self.poll_backoff.min_delay(),
                max: self.poll_backoff.max_delay(),
            }
        );
        if self.api_user.is_empty() {
            warn!(target: "buzzapi_client", "api_user is empty; the service will likely reject requests");
        }
        Ok(())
    }
}

impl fmt::Debug for BuzzApiConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuzzApiConfig")
            .field("api_user", &self.api_user)
            .field("api_password", &"<redacted>")
            .field("sync", &self.sync)
            .field("api_receive_timeout", &self.api_receive_timeout)
            .field("server", &self.server)
            .field("admission", &self.admission)
            .field("poll_wait", &self.poll_wait)
            .field("poll_backoff", &self.poll_backoff)
            .field("user_agent", &self.user_agent)
            .finish_non_exhaustive()
    }
}

// Helper to parse lookups with a default
fn parse_var<T>(lookup: &impl Fn(&str) -> Option<String>, name: &str, default_value: T) -> T
where
    T: FromStr + fmt::Debug,
    <T as FromStr>::Err: fmt::Debug,
{
    lookup(name)
        .and_then(|raw| match raw.parse::<T>() {
            Ok(value) => Some(value),
            Err(e) => {
                warn!(
                    "Failed to parse env var '{}' (value: '{}'). Error: {:?}. Using default: {:?}",
                    name, raw, e, default_value
                );
                None
            }
        })
        .unwrap_or(default_value)
}
