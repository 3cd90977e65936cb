use admission_limiter::admission::http::ResponseDeadline;
use bytes::Bytes;
use http::{Method, Request as HttpRequest, header};
use serde_json::Value;

use crate::{
    classify::classify,
    config::RESPONSE_MARGIN,
    envelope::{self, EnvelopeDepth},
    error::BuzzApiError,
    request::{ApiRequest, Credentials, RequestMode},
    transport::{ApiCall, Transport},
};

/// Message id and ticket of a result that has to be polled for.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PendingResult {
    pub message_id: String,
    pub app_ticket: String,
}

/// Outcome of a clean submission.
#[derive(Clone, Debug, PartialEq)]
pub enum Submission {
    /// Synchronous mode: the result itself.
    Complete(Value),
    /// Asynchronous mode: where to poll for the result.
    Pending(PendingResult),
}

pub(crate) fn submit_url(server: &str, resource: &str, operation: &str) -> String {
    format!(
        "{}/apiv3/{}/{}",
        server.trim_end_matches('/'),
        resource,
        operation
    )
}

pub(crate) fn build_submit_call(
    server: &str,
    request: &ApiRequest,
    credentials: &Credentials,
) -> Result<ApiCall, BuzzApiError> {
    let url = submit_url(server, &request.resource, &request.operation);
    let body = serde_json::to_vec(&request.body(credentials)).map_err(|e| {
        BuzzApiError::RequestBuild {
            message: format!("failed to serialize body: {}", e),
        }
    })?;

    HttpRequest::builder()
        .method(Method::POST)
        .uri(url.as_str())
        .header(header::CONTENT_TYPE, "application/json")
        .header(header::ACCEPT, "application/json")
        .extension(ResponseDeadline(credentials.receive_timeout() + RESPONSE_MARGIN))
        .body(Some(Bytes::from(body)))
        .map_err(|e| {
            error!(target: "buzzapi_client", "HTTP request construction failed. Error (debug): {:?}, URL attempted: '{}'", e, url);
            BuzzApiError::RequestBuild {
                message: e.to_string(),
            }
        })
}

/// Issues the initial call for one request and interprets the outer envelope.
pub(crate) async fn submit_one<T: Transport>(
    transport: &T,
    server: &str,
    credentials: &Credentials,
    request: &ApiRequest,
) -> Result<Submission, BuzzApiError> {
    let call = build_submit_call(server, request, credentials)?;
    debug!(
        target: "buzzapi_client",
        url = %call.uri(),
        handle = %request.handle,
        mode = request.mode.as_str(),
        "Requesting"
    );

    let body = classify(transport.send(call).await, EnvelopeDepth::Outer)?;

    match request.mode {
        RequestMode::Sync => {
            debug!(target: "buzzapi_client", handle = %request.handle, "Sync was set, returning the result");
            let Some(result) = body.get(envelope::RESULT_DATA).cloned() else {
                return Err(BuzzApiError::MalformedEnvelope {
                    field: envelope::RESULT_DATA,
                    raw_body: Some(body),
                });
            };
            Ok(Submission::Complete(result))
        }
        RequestMode::Async => {
            let Some(message_id) = envelope::message_id(&body) else {
                return Err(BuzzApiError::MalformedEnvelope {
                    field: envelope::RESULT_DATA,
                    raw_body: Some(body),
                });
            };
            let Some(app_ticket) = envelope::app_ticket(&body).map(str::to_string) else {
                return Err(BuzzApiError::MalformedEnvelope {
                    field: envelope::APP_TICKET,
                    raw_body: Some(body),
                });
            };
            debug!(target: "buzzapi_client", %message_id, handle = %request.handle, "Got messageId");
            Ok(Submission::Pending(PendingResult {
                message_id,
                app_ticket,
            }))
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use admission_limiter::admission::http::RawResponse;
    use http::StatusCode;
    use serde_json::{Map, json};
    use tower_test::mock;

    use super::*;
    use crate::{config::BuzzApiConfig, error::ErrorKind};

    fn credentials() -> Credentials {
        Credentials::from_config(
            &BuzzApiConfig::builder()
                .api_user("app")
                .api_password("pw")
                .api_receive_timeout(Duration::from_secs(900))
                .build(),
        )
    }

    fn request(mode: RequestMode) -> ApiRequest {
        ApiRequest::new("test", "test", Map::new(), mode)
    }

    async fn exchange(
        mode: RequestMode,
        response: RawResponse,
    ) -> (ApiCall, Result<Submission, BuzzApiError>) {
        let (service, mut handle) = mock::pair::<ApiCall, RawResponse>();
        let task = tokio::spawn(async move {
            submit_one(&service, "https://api.gatech.edu/", &credentials(), &request(mode)).await
        });

        let (call, send) = handle.next_request().await.expect("one request");
        send.send_response(response);
        let result = task.await.expect("task completes");
        (call, result)
    }

    #[test]
    fn url_joins_without_double_slash() {
        assert_eq!(
            submit_url("https://api.gatech.edu/", "test", "op"),
            "https://api.gatech.edu/apiv3/test/op"
        );
    }

    #[tokio::test]
    async fn sync_submission_returns_result_data() {
        let (call, result) = exchange(
            RequestMode::Sync,
            RawResponse::new(
                StatusCode::OK,
                Some(json!({"api_result_data": {"success": true}})),
            ),
        )
        .await;

        assert_eq!(call.method(), &Method::POST);
        assert_eq!(call.uri(), "https://api.gatech.edu/apiv3/test/test");
        let sent: Value =
            serde_json::from_slice(call.body().as_deref().expect("body")).expect("json body");
        assert_eq!(sent["api_request_mode"], json!("sync"));
        assert_eq!(sent["api_app_id"], json!("app"));
        assert_eq!(sent["api_receive_timeout"], json!(900_000));
        assert_eq!(
            call.extensions().get::<ResponseDeadline>(),
            Some(&ResponseDeadline(Duration::from_secs(900) + RESPONSE_MARGIN))
        );

        assert_eq!(
            result.expect("clean"),
            Submission::Complete(json!({"success": true}))
        );
    }

    #[tokio::test]
    async fn async_submission_returns_pending_ticket() {
        let (_, result) = exchange(
            RequestMode::Async,
            RawResponse::new(
                StatusCode::OK,
                Some(json!({"api_result_data": "ABC123", "api_app_ticket": "XYZ789"})),
            ),
        )
        .await;

        assert_eq!(
            result.expect("clean"),
            Submission::Pending(PendingResult {
                message_id: "ABC123".into(),
                app_ticket: "XYZ789".into(),
            })
        );
    }

    #[tokio::test]
    async fn async_submission_without_ticket_is_malformed() {
        let (_, result) = exchange(
            RequestMode::Async,
            RawResponse::new(StatusCode::OK, Some(json!({"api_result_data": "ABC123"}))),
        )
        .await;

        let err = result.expect_err("missing ticket");
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert!(err.to_string().contains("api_app_ticket"));
    }

    #[tokio::test]
    async fn outer_error_info_is_a_protocol_error() {
        let body = json!({"api_error_info": {"success": false}});
        let (_, result) = exchange(
            RequestMode::Sync,
            RawResponse::new(StatusCode::OK, Some(body.clone())),
        )
        .await;

        let err = result.expect_err("error_info");
        assert_eq!(err.kind(), ErrorKind::Protocol);
        assert_eq!(err.raw_body(), Some(&body));
    }
}
