use admission_limiter::{Error as TransportError, admission::http::RawResponse};
use bytes::Bytes;
use futures::future::BoxFuture;
use http::Request as HttpRequest;
use tower::{Service, ServiceExt};

/// One HTTP exchange as handed to the transport.
pub type ApiCall = HttpRequest<Option<Bytes>>;

/// Anything that can carry an [`ApiCall`] to the service and report what came back.
///
/// Implemented for every cloneable `tower::Service` with the right request and
/// response types, including [`admission_limiter::admission::reqwest_integration::ReqwestService`].
pub trait Transport: Clone + Send + Sync + 'static {
    fn send(&self, request: ApiCall) -> BoxFuture<'static, Result<RawResponse, TransportError>>;
}

impl<S> Transport for S
where
    S: Service<ApiCall, Response = RawResponse> + Clone + Send + Sync + 'static,
    S::Error: Into<TransportError>,
    S::Future: Send,
{
    fn send(&self, request: ApiCall) -> BoxFuture<'static, Result<RawResponse, TransportError>> {
        let service = self.clone();
        Box::pin(async move { service.oneshot(request).await.map_err(Into::into) })
    }
}
