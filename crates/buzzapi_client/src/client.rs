use std::{fmt, sync::Arc, time::Duration};

use admission_limiter::admission::{
    AdmissionController, AdmissionStats,
    internal_event::InternalEvent,
    reqwest_integration::ReqwestService,
};
use serde_json::{Map, Value};
use snafu::ResultExt;
use tokio::{task::JoinHandle, time::Instant};

use crate::{
    config::{BuzzApiConfig, ConfigError, HttpClientSnafu},
    error::BuzzApiError,
    internal_event::{RequestCompleted, RequestFailed},
    poll::Poller,
    request::{ApiRequest, Credentials, RequestMode},
    submit::{Submission, submit_one},
    transport::Transport,
};

/// Client for the BuzzAPI batch service.
///
/// Every request holds one admission slot from the moment it is admitted until its
/// result (or error) is known, including all time spent polling. Requests beyond the
/// configured capacity wait and are admitted in arrival order. Clones share the same
/// admission pool.
#[derive(Clone)]
pub struct BuzzApiClient<T = ReqwestService> {
    transport: T,
    admission: AdmissionController,
    config: Arc<BuzzApiConfig>,
    credentials: Arc<Credentials>,
}

impl<T> fmt::Debug for BuzzApiClient<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BuzzApiClient")
            .field("config", &self.config)
            .field("admission", &self.admission)
            .finish_non_exhaustive()
    }
}

impl BuzzApiClient<ReqwestService> {
    /// Creates a client that talks to `config.server` over `reqwest`.
    ///
    /// Cookies set by the service are kept and sent back on later calls. There is no
    /// client-wide response timeout; each call carries its own
    /// [`ResponseDeadline`](admission_limiter::admission::http::ResponseDeadline).
    pub fn new(config: BuzzApiConfig) -> Result<Self, ConfigError> {
        let client = match config.reqwest_client.clone() {
            Some(client) => client,
            None => reqwest::Client::builder()
                .cookie_store(true)
                .user_agent(config.user_agent.as_str())
                .connect_timeout(Duration::from_secs(10))
                .build()
                .context(HttpClientSnafu)?,
        };

        Self::with_transport(config, ReqwestService::new_with_client(client))
    }
}

impl<T: Transport> BuzzApiClient<T> {
    /// Creates a client over any transport, e.g. an in-memory service in tests.
    pub fn with_transport(config: BuzzApiConfig, transport: T) -> Result<Self, ConfigError> {
        config.validate()?;

        let admission = AdmissionController::new(config.admission);
        let credentials = Credentials::from_config(&config);

        info!(target: "buzzapi_client", server = %config.server, mode = RequestMode::from(config.sync).as_str(), capacity = admission.capacity(), "BuzzApiClient initialized");
        debug!(target: "buzzapi_client", client_config = ?config, "Full client configuration");

        Ok(Self {
            transport,
            admission,
            config: Arc::new(config),
            credentials: Arc::new(credentials),
        })
    }

    pub fn config(&self) -> &BuzzApiConfig {
        &self.config
    }

    /// The request mode selected by the configuration.
    pub fn mode(&self) -> RequestMode {
        RequestMode::from(self.config.sync)
    }

    pub fn stats(&self) -> AdmissionStats {
        self.admission.stats()
    }

    /// Calls `operation` on `resource` and resolves to the service's result.
    ///
    /// In synchronous mode that is `api_result_data` of the response; in asynchronous
    /// mode it is the inner `api_result_data` of the first ready poll response.
    pub async fn post(
        &self,
        resource: &str,
        operation: &str,
        payload: Map<String, Value>,
    ) -> Result<Value, BuzzApiError> {
        self.execute(ApiRequest::new(resource, operation, payload, self.mode()))
            .await
    }

    /// Same as [`post`](Self::post), reporting the outcome to `callback` instead.
    ///
    /// The request runs on a spawned task; the callback receives exactly the value the
    /// future would have resolved to.
    pub fn post_with_callback<F>(
        &self,
        resource: &str,
        operation: &str,
        payload: Map<String, Value>,
        callback: F,
    ) -> JoinHandle<()>
    where
        F: FnOnce(Result<Value, BuzzApiError>) + Send + 'static,
    {
        let client = self.clone();
        let request = ApiRequest::new(resource, operation, payload, self.mode());
        tokio::spawn(async move {
            let outcome = client.execute(request).await;
            callback(outcome);
        })
    }

    /// Runs a fully specified request under admission control.
    pub async fn execute(&self, request: ApiRequest) -> Result<Value, BuzzApiError> {
        let _slot = self.admission.acquire().await;
        let started = Instant::now();

        let outcome = self.run(&request).await;

        RequestCompleted {
            elapsed: started.elapsed(),
            success: outcome.is_ok(),
        }
        .emit();
        if let Err(error) = &outcome {
            RequestFailed { kind: error.kind() }
            .emit();
            warn!(
                target: "buzzapi_client",
                handle = %request.handle,
                resource = %request.resource,
                operation = %request.operation,
                kind = error.kind().as_str(),
                %error,
                "Request failed"
            );
        }
        trace!(target: "buzzapi_client", handle = %request.handle, "Releasing admission slot");
        outcome
    }

    async fn run(&self, request: &ApiRequest) -> Result<Value, BuzzApiError> {
        let submission = submit_one(
            &self.transport,
            &self.config.server,
            &self.credentials,
            request,
        )
        .await?;

        match submission {
            Submission::Complete(result) => Ok(result),
            Submission::Pending(pending) => {
                Poller {
                    transport: &self.transport,
                    server: &self.config.server,
                    poll_wait: self.config.poll_wait,
                    receive_timeout: self.config.api_receive_timeout,
                    backoff: self.config.poll_backoff,
                }
                .wait_for_result(pending)
                .await
            }
        }
    }
}
