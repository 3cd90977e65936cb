use std::time::Duration;

use admission_limiter::admission::{
    backoff::PollBackoff, http::ResponseDeadline, internal_event::InternalEvent,
};
use http::{Method, Request as HttpRequest, header};
use serde_json::Value;
use tokio::time::{Instant, sleep};
use url::Url;

use crate::{
    classify::classify,
    config::RESPONSE_MARGIN,
    envelope::{self, EnvelopeDepth, PollStep},
    error::{BuzzApiError, ErrorKind},
    internal_event::PollAttempt,
    submit::PendingResult,
    transport::{ApiCall, Transport},
};

/// A pending asynchronous result being polled for.
#[derive(Clone, Debug)]
pub struct Ticket {
    pub message_id: String,
    pub app_ticket: String,
    /// Set once, when polling starts; retries do not move it.
    pub submitted_at: Instant,
}

impl Ticket {
    fn start(pending: PendingResult) -> Self {
        Self {
            message_id: pending.message_id,
            app_ticket: pending.app_ticket,
            submitted_at: Instant::now(),
        }
    }
}

/// Where a ticket ended up. Every state but `Polling` is terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PollState {
    Polling,
    Ready,
    ProtocolFailed,
    TransportFailed,
    TimedOut,
}

impl PollState {
    fn after(outcome: &Result<Value, BuzzApiError>) -> Self {
        match outcome {
            Ok(_) => PollState::Ready,
            Err(error) => match error.kind() {
                ErrorKind::Transport => PollState::TransportFailed,
                ErrorKind::Timeout => PollState::TimedOut,
                ErrorKind::HttpStatus | ErrorKind::Protocol | ErrorKind::StaleResult => {
                    PollState::ProtocolFailed
                }
            },
        }
    }
}

/// Drives one ticket from submission to a terminal state.
pub(crate) struct Poller<'a, T> {
    pub(crate) transport: &'a T,
    pub(crate) server: &'a str,
    /// Server-side wait per poll.
    pub(crate) poll_wait: Duration,
    /// Client-side deadline, measured from the first poll.
    pub(crate) receive_timeout: Duration,
    pub(crate) backoff: PollBackoff,
}

impl<T: Transport> Poller<'_, T> {
    pub(crate) async fn wait_for_result(
        &self,
        pending: PendingResult,
    ) -> Result<Value, BuzzApiError> {
        let mut ticket = Ticket::start(pending);
        let mut attempts: u32 = 0;

        let outcome = loop {
            attempts += 1;
            let body = match self.poll_once(&ticket).await {
                Ok(body) => body,
                Err(error) => break Err(error),
            };

            if let Some(fresh) = envelope::app_ticket(&body) {
                if fresh != ticket.app_ticket {
                    trace!(target: "buzzapi_client::poll", message_id = %ticket.message_id, "Ticket refreshed");
                    ticket.app_ticket = fresh.to_string();
                }
            }

            match PollStep::interpret(&body) {
                PollStep::NotReady => {
                    PollAttempt { ready: false }.emit();
                    let elapsed = ticket.submitted_at.elapsed();
                    if elapsed > self.receive_timeout {
                        break Err(BuzzApiError::Timeout {
                            message_id: ticket.message_id.clone(),
                            elapsed,
                        });
                    }

                    let delay = self.backoff.next_delay();
                    debug!(
                        target: "buzzapi_client::poll",
                        message_id = %ticket.message_id,
                        attempt = attempts,
                        delay_ms = delay.as_millis(),
                        "Result not ready"
                    );
                    sleep(delay).await;
                }
                PollStep::UpstreamGaveUp => {
                    break Err(BuzzApiError::StaleResult {
                        message_id: ticket.message_id.clone(),
                        raw_body: Some(body),
                    });
                }
                PollStep::Ready(result) => {
                    PollAttempt { ready: true }.emit();
                    debug!(
                        target: "buzzapi_client::poll",
                        "Completed {} in {}ms",
                        ticket.message_id,
                        ticket.submitted_at.elapsed().as_millis()
                    );
                    break Ok(result);
                }
            }
        };

        let state = PollState::after(&outcome);
        if state != PollState::Ready {
            debug!(target: "buzzapi_client::poll", message_id = %ticket.message_id, ?state, attempts, "Polling stopped");
        }
        outcome
    }

    async fn poll_once(&self, ticket: &Ticket) -> Result<Value, BuzzApiError> {
        let call = self.poll_call(ticket)?;
        debug!(target: "buzzapi_client::poll", message_id = %ticket.message_id, "Asking for result");
        classify(self.transport.send(call).await, EnvelopeDepth::OuterOrNested)
    }

    fn poll_call(&self, ticket: &Ticket) -> Result<ApiCall, BuzzApiError> {
        let base = format!("{}/apiv3/api.my_messages", self.server.trim_end_matches('/'));
        let mut url = Url::parse(&base).map_err(|e| BuzzApiError::RequestBuild {
            message: format!("invalid poll URL '{}': {}", base, e),
        })?;
        url.query_pairs_mut()
            .append_pair(envelope::APP_TICKET, &ticket.app_ticket)
            .append_pair("api_pull_response_to", &ticket.message_id)
            .append_pair(
                "api_receive_timeout",
                &self.poll_wait.as_millis().to_string(),
            );

        HttpRequest::builder()
            .method(Method::GET)
            .uri(url.as_str())
            .header(header::ACCEPT, "application/json")
            .extension(ResponseDeadline(self.poll_wait + RESPONSE_MARGIN))
            .body(None)
            .map_err(|e| BuzzApiError::RequestBuild {
                message: e.to_string(),
            })
    }
}
