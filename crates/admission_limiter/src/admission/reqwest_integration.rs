// src/admission/reqwest_integration.rs
use crate::admission::http::{HttpError, RawResponse, ResponseDeadline};
use bytes::Bytes;
use futures::future::BoxFuture;

use http::{Request as HttpRequest, StatusCode};
use std::task::{Context, Poll};
use tower::Service;

/// A `tower::Service` wrapper for `reqwest::Client`.
/// Accepts `http::Request<Option<Bytes>>`.
///
/// Every response that arrives, whatever its status, is returned as a
/// [`RawResponse`]; only failures that produce no response become errors.
#[derive(Clone, Debug)]
pub struct ReqwestService {
    client: reqwest::Client,
}

impl ReqwestService {
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::new(),
        }
    }

    pub fn new_with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

impl Default for ReqwestService {
    fn default() -> Self {
        Self::new()
    }
}

impl Service<HttpRequest<Option<Bytes>>> for ReqwestService {
    type Response = RawResponse;
    type Error = HttpError;
    type Future = BoxFuture<'static, Result<Self::Response, Self::Error>>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, http_request: HttpRequest<Option<Bytes>>) -> Self::Future {
        let (parts, body_option) = http_request.into_parts();

        let url_str = parts.uri.to_string();
        let url = match reqwest::Url::parse(&url_str) {
            Ok(u) => u,
            Err(parse_err) => {
                let ge = HttpError::InvalidRequest {
                    details: format!("Invalid URL '{}': {}", url_str, parse_err),
                };
                return Box::pin(async move { Err(ge) });
            }
        };

        let mut request_builder = self.client.request(parts.method, url);

        if let Some(ResponseDeadline(limit)) = parts.extensions.get::<ResponseDeadline>().copied() {
            request_builder = request_builder.timeout(limit);
        }

        for (header_name, header_value) in parts.headers.iter() {
            request_builder = request_builder.header(header_name, header_value);
        }

        if let Some(body) = body_option {
            request_builder = request_builder.body(body);
        }

        let request_future = request_builder.send();
        Box::pin(async move {
            match request_future.await {
                Ok(response) => {
                    let status = response.status();
                    let text = response.text().await.map_err(|e| HttpError::ReadBody {
                        source: Box::new(e),
                    })?;

                    if status.is_server_error() || status == StatusCode::TOO_MANY_REQUESTS {
                        warn!(status = %status, "Server error or rate limited");
                    } else if status.is_client_error() {
                        debug!(status = %status, "Client error");
                    }

                    Ok(RawResponse::from_text(status, &text))
                }
                Err(e) => {
                    if e.is_timeout() {
                        warn!(error = %e, "Request timed out");
                        Err(HttpError::Timeout)
                    } else if e.is_connect() {
                        error!(error = %e, "Connection error");
                        Err(HttpError::Transport {
                            source: Box::new(e),
                        })
                    } else {
                        error!(error = %e, "Other reqwest error");
                        Err(HttpError::ClientError {
                            source: Box::new(e),
                        })
                    }
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use tokio::net::TcpListener;
    use tower::ServiceExt;

    use super::*;

    #[tokio::test]
    async fn response_deadline_limits_one_request() {
        let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let addr = listener.local_addr().expect("local addr");
        let _silent = tokio::spawn(async move {
            let (_stream, _) = listener.accept().await.expect("accept");
            std::future::pending::<()>().await;
        });

        let request = HttpRequest::builder()
            .uri(format!("http://{addr}/slow"))
            .extension(ResponseDeadline(Duration::from_millis(200)))
            .body(None)
            .expect("request builds");

        let result = ReqwestService::new().oneshot(request).await;
        assert!(matches!(result, Err(HttpError::Timeout)));
    }

    #[tokio::test]
    async fn unparsable_uri_is_an_invalid_request() {
        let request = HttpRequest::builder()
            .uri("/relative/only")
            .body(None)
            .expect("request builds");

        let result = ReqwestService::new().oneshot(request).await;
        assert!(matches!(result, Err(HttpError::InvalidRequest { .. })));
    }
}
