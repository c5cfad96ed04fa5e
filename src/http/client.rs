//! Resilient call executor.
//!
//! # Responsibilities
//! - Gate every call through the operation's circuit breaker
//! - Bound every call by the effective deadline and honour cancellation
//! - Decorate the request (trace context, user agent)
//! - Classify the result and report it to the breaker before returning
//!
//! # Design Decisions
//! - Any response counts as success; status codes are the caller's concern
//! - Responses and transport errors are returned as-is, never retried
//! - The breaker lock is never held across the transport call

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use hyper::{Request, Response};
use tokio::time::Instant;
use tracing::Instrument;

use crate::config::options::Configuration;
use crate::context::CallContext;
use crate::http::error::CallError;
use crate::http::headers::inject_headers;
use crate::http::transport::{BoxError, SharedTransport};
use crate::observability::metrics;
use crate::resilience::circuit_breaker::{CallOutcome, CircuitBreaker};
use crate::resilience::timeouts::effective_deadline;

/// HTTP client decorated with tracing, user agent, timeout and circuit breaking.
///
/// Cheap to clone; clones share the configuration, breaker and transport.
#[derive(Clone)]
pub struct Client {
    inner: Arc<Inner>,
}

struct Inner {
    config: Configuration,
    breaker: Arc<CircuitBreaker>,
    transport: SharedTransport,
}

enum Attempt {
    Completed(Result<Response<Body>, BoxError>),
    TimedOut,
    Cancelled,
}

impl Client {
    pub(crate) fn new(config: Configuration, breaker: Arc<CircuitBreaker>, transport: SharedTransport) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                breaker,
                transport,
            }),
        }
    }

    pub fn configuration(&self) -> &Configuration {
        &self.inner.config
    }

    /// Operation name the breaker is keyed by.
    pub fn operation_name(&self) -> &str {
        self.inner.config.operation_name()
    }

    pub fn breaker(&self) -> &Arc<CircuitBreaker> {
        &self.inner.breaker
    }

    /// Execute `request` for `operation_name` within `ctx`.
    ///
    /// `operation_name` names the tracing span of this call; breaker
    /// bookkeeping always uses the configured operation.
    pub async fn call(
        &self,
        ctx: &CallContext,
        operation_name: &str,
        mut request: Request<Body>,
    ) -> Result<Response<Body>, CallError> {
        let config = &self.inner.config;
        let operation = config.operation_name();

        let Some(permit) = self.inner.breaker.try_acquire() else {
            tracing::debug!(operation = %operation, call = %operation_name, "Circuit open, short-circuiting call");
            metrics::record_call(operation, CallOutcome::ShortCircuited);
            return Err(CallError::CircuitOpen {
                operation: operation.to_string(),
            });
        };

        if ctx.is_cancelled() {
            permit.record(CallOutcome::Cancelled);
            metrics::record_call(operation, CallOutcome::Cancelled);
            return Err(CallError::Cancelled {
                operation: operation.to_string(),
            });
        }

        let started = Instant::now();
        let deadline = effective_deadline(started, ctx.deadline(), config.call_timeout());
        let budget = deadline.0.saturating_duration_since(started);

        if budget.is_zero() {
            tracing::debug!(operation = %operation, call = %operation_name, "Deadline already passed, not calling upstream");
            // Never reached the transport: not a failure for the breaker.
            permit.record(CallOutcome::Cancelled);
            metrics::record_call(operation, CallOutcome::Timeout);
            return Err(CallError::CallTimeout {
                operation: operation.to_string(),
                timeout: Duration::ZERO,
            });
        }

        let propagated = match inject_headers(
            config.tracer().as_ref(),
            ctx,
            config.user_agent(),
            request.headers_mut(),
        ) {
            Ok(span) => span,
            Err(e) => {
                tracing::warn!(operation = %operation, error = %e, "Unable to inject tracing headers");
                // Never reached the transport: not a failure for the breaker.
                permit.record(CallOutcome::Cancelled);
                metrics::record_call(operation, CallOutcome::Cancelled);
                return Err(CallError::TracingInjectionFailed(e));
            }
        };
        request.extensions_mut().insert(deadline);

        let span = tracing::info_span!(
            "outbound_call",
            call = %operation_name,
            operation = %operation,
            method = %request.method(),
            uri = %request.uri(),
            trace = %propagated.as_ref().map(ToString::to_string).unwrap_or_default(),
            probe = permit.is_probe(),
        );

        let pending = self.inner.transport.execute(request);
        let attempt = async {
            tokio::select! {
                biased;
                _ = ctx.cancelled() => Attempt::Cancelled,
                result = tokio::time::timeout_at(deadline.0, pending) => match result {
                    Ok(completed) => Attempt::Completed(completed),
                    Err(_) => Attempt::TimedOut,
                },
            }
        }
        .instrument(span.clone())
        .await;

        metrics::record_call_duration(operation, started.into_std());
        span.in_scope(|| match attempt {
            Attempt::Completed(Ok(response)) => {
                permit.record(CallOutcome::Success);
                metrics::record_call(operation, CallOutcome::Success);
                tracing::debug!(status = %response.status(), elapsed = ?started.elapsed(), "Upstream responded");
                Ok(response)
            }
            Attempt::Completed(Err(source)) => {
                permit.record(CallOutcome::Failure);
                metrics::record_call(operation, CallOutcome::Failure);
                tracing::warn!(error = %source, "Upstream request failed");
                Err(CallError::Transport {
                    operation: operation.to_string(),
                    source,
                })
            }
            Attempt::TimedOut => {
                permit.record(CallOutcome::Timeout);
                metrics::record_call(operation, CallOutcome::Timeout);
                tracing::warn!(timeout = ?budget, "Upstream request timed out");
                Err(CallError::CallTimeout {
                    operation: operation.to_string(),
                    timeout: budget,
                })
            }
            Attempt::Cancelled => {
                permit.record(CallOutcome::Cancelled);
                metrics::record_call(operation, CallOutcome::Cancelled);
                tracing::debug!("Call cancelled by caller");
                Err(CallError::Cancelled {
                    operation: operation.to_string(),
                })
            }
        })
    }

    /// Configured bound for a single call.
    pub fn call_timeout(&self) -> Duration {
        self.inner.config.call_timeout()
    }
}

impl std::fmt::Debug for Client {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Client")
            .field("operation", &self.operation_name())
            .field("breaker_state", &self.inner.breaker.state())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::transport::from_service;
    use hyper::StatusCode;
    use std::convert::Infallible;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn counting_client(status: StatusCode, calls: Arc<AtomicUsize>) -> Client {
        let transport = from_service(tower::service_fn(move |_req: Request<Body>| {
            let calls = calls.clone();
            async move {
                calls.fetch_add(1, Ordering::SeqCst);
                let mut response = Response::new(Body::empty());
                *response.status_mut() = status;
                Ok::<_, Infallible>(response)
            }
        }));
        Configuration::builder()
            .operation_name("orders/inventory")
            .transport(transport)
            .finish()
            .unwrap()
            .build()
    }

    fn get() -> Request<Body> {
        Request::get("http://inventory.local/stock").body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn server_errors_are_breaker_successes() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = counting_client(StatusCode::INTERNAL_SERVER_ERROR, calls.clone());

        for _ in 0..10 {
            let response = client.call(&CallContext::new(), "get-stock", get()).await.unwrap();
            assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 10);
        assert_eq!(client.breaker().failure_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_context_skips_transport() {
        let calls = Arc::new(AtomicUsize::new(0));
        let client = counting_client(StatusCode::OK, calls.clone());
        let ctx = CallContext::new();
        ctx.cancel();

        let err = client.call(&ctx, "get-stock", get()).await.unwrap_err();
        assert!(matches!(err, CallError::Cancelled { .. }));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
