//! Request execution capability.
//!
//! # Responsibilities
//! - Define the boundary the executor calls through (`Transport`)
//! - Provide the default pooled HTTP/1.1 + HTTP/2 transport (hyper-util)
//! - Adapt any tower service into a transport (test doubles, layered stacks)
//!
//! # Design Decisions
//! - The executor bounds every call; transports only enforce their own timeouts
//! - Dropping the returned future aborts the in-flight request
//! - Plain HTTP only in the default transport; bring your own for TLS

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use futures_util::future::BoxFuture;
use hyper::{Request, Response};
use hyper_util::{
    client::legacy::{connect::HttpConnector, Client},
    rt::{TokioExecutor, TokioTimer},
};
use thiserror::Error;
use tower::{Service, ServiceExt};

/// Boxed error returned by transports.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Executes one HTTP request.
pub trait Transport: Send + Sync + 'static {
    fn execute(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, BoxError>>;
}

/// Shared transport handle stored in the configuration.
pub type SharedTransport = Arc<dyn Transport>;

/// Timeouts applied by the default transport. `None` keeps hyper's behaviour.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransportTimeouts {
    /// How long an idle pooled connection is kept.
    pub idle_conn: Option<Duration>,
    /// Connection establishment timeout.
    pub handshake: Option<Duration>,
    /// Time allowed for response headers once the request is dispatched.
    pub response_header: Option<Duration>,
}

/// The upstream did not send response headers in time.
#[derive(Debug, Error)]
#[error("no response headers received within {0:?}")]
pub struct ResponseHeaderTimeout(pub Duration);

/// Default transport over a pooled hyper-util client.
#[derive(Clone)]
pub struct HyperTransport {
    client: Client<HttpConnector, Body>,
    response_header_timeout: Option<Duration>,
}

impl HyperTransport {
    pub fn new(timeouts: TransportTimeouts) -> Self {
        let mut connector = HttpConnector::new();
        connector.set_connect_timeout(timeouts.handshake);

        let mut builder = Client::builder(TokioExecutor::new());
        builder.pool_timer(TokioTimer::new());
        if let Some(idle) = timeouts.idle_conn {
            builder.pool_idle_timeout(idle);
        }

        Self {
            client: builder.build(connector),
            response_header_timeout: timeouts.response_header,
        }
    }
}

impl Transport for HyperTransport {
    fn execute(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, BoxError>> {
        let client = self.client.clone();
        let header_timeout = self.response_header_timeout;
        Box::pin(async move {
            let pending = client.request(request);
            let response = match header_timeout {
                Some(limit) => tokio::time::timeout(limit, pending)
                    .await
                    .map_err(|_| ResponseHeaderTimeout(limit))??,
                None => pending.await?,
            };
            Ok::<_, BoxError>(response.map(Body::new))
        })
    }
}

impl fmt::Debug for HyperTransport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HyperTransport")
            .field("response_header_timeout", &self.response_header_timeout)
            .finish()
    }
}

/// Transport backed by a tower service.
#[derive(Clone)]
pub struct TowerTransport<S> {
    inner: S,
}

impl<S> TowerTransport<S> {
    pub fn new(inner: S) -> Self {
        Self { inner }
    }
}

impl<S> Transport for TowerTransport<S>
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    fn execute(&self, request: Request<Body>) -> BoxFuture<'static, Result<Response<Body>, BoxError>> {
        let service = self.inner.clone();
        Box::pin(async move {
            let result: Result<Response<Body>, BoxError> = service.oneshot(request).await.map_err(Into::into);
            result
        })
    }
}

impl<S> fmt::Debug for TowerTransport<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TowerTransport")
            .field("service", &std::any::type_name::<S>())
            .finish()
    }
}

/// Wrap a tower service as a shared transport.
pub fn from_service<S>(service: S) -> SharedTransport
where
    S: Service<Request<Body>, Response = Response<Body>> + Clone + Send + Sync + 'static,
    S::Error: Into<BoxError>,
    S::Future: Send + 'static,
{
    Arc::new(TowerTransport::new(service))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::convert::Infallible;

    #[tokio::test]
    async fn tower_transport_forwards_request() {
        let transport = from_service(tower::service_fn(|req: Request<Body>| async move {
            let echoed = req.uri().path().to_string();
            Ok::<_, Infallible>(Response::new(Body::from(echoed)))
        }));

        let request = Request::get("http://inventory.local/stock").body(Body::empty()).unwrap();
        let response = transport.execute(request).await.unwrap();
        let body = axum::body::to_bytes(response.into_body(), 1024).await.unwrap();
        assert_eq!(&body[..], b"/stock");
    }

    #[tokio::test]
    async fn hyper_transport_reports_connection_errors() {
        // Bind then drop to obtain a port nobody listens on.
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let transport = HyperTransport::new(TransportTimeouts {
            handshake: Some(Duration::from_millis(200)),
            ..TransportTimeouts::default()
        });
        let request = Request::get(format!("http://{}/", addr)).body(Body::empty()).unwrap();
        assert!(transport.execute(request).await.is_err());
    }
}
