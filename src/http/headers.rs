//! Outgoing request decoration.
//!
//! # Responsibilities
//! - Propagate the caller's active span as trace-context headers
//! - Tag every request with the configured `User-Agent`
//!
//! # Design Decisions
//! - Touches nothing but the request headers
//! - No active span: no trace headers, and no error
//! - Encoding failures are returned, never dropped silently

use hyper::header::{HeaderMap, HeaderValue, USER_AGENT};

use crate::context::CallContext;
use crate::observability::tracing::{InjectError, SpanContext, Tracer};

/// Write trace context (if any) and the user agent (if configured) onto `headers`.
///
/// Returns the span that was propagated.
pub fn inject_headers(
    tracer: &dyn Tracer,
    ctx: &CallContext,
    user_agent: Option<&HeaderValue>,
    headers: &mut HeaderMap,
) -> Result<Option<SpanContext>, InjectError> {
    let span = tracer.active_span(ctx);
    if let Some(span) = &span {
        tracer.inject(span, headers)?;
    }

    if let Some(ua) = user_agent {
        headers.insert(USER_AGENT, ua.clone());
    }

    Ok(span)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::observability::tracing::{W3cTracer, TRACEPARENT, TRACESTATE};

    #[test]
    fn active_span_and_user_agent_are_written() {
        let span = SpanContext::new(0x4bf92f3577b34da6a3ce929d0e0e4736, 0x00f067aa0ba902b7, true);
        let ctx = CallContext::new().with_span(span.clone());
        let ua = HeaderValue::from_static("orders/1.0");
        let mut headers = HeaderMap::new();

        let injected = inject_headers(&W3cTracer, &ctx, Some(&ua), &mut headers).unwrap();

        assert_eq!(injected, Some(span));
        assert_eq!(
            headers.get(TRACEPARENT).unwrap(),
            "00-4bf92f3577b34da6a3ce929d0e0e4736-00f067aa0ba902b7-01"
        );
        assert_eq!(headers.get(USER_AGENT).unwrap(), "orders/1.0");
    }

    #[test]
    fn no_span_means_no_trace_headers() {
        let ua = HeaderValue::from_static("orders/1.0");
        let mut headers = HeaderMap::new();

        let injected = inject_headers(&W3cTracer, &CallContext::new(), Some(&ua), &mut headers).unwrap();

        assert!(injected.is_none());
        assert!(headers.get(TRACEPARENT).is_none());
        assert!(headers.get(TRACESTATE).is_none());
        assert_eq!(headers.get(USER_AGENT).unwrap(), "orders/1.0");
    }

    #[test]
    fn configured_user_agent_replaces_existing() {
        let ua = HeaderValue::from_static("orders/1.0");
        let mut headers = HeaderMap::new();
        headers.insert(USER_AGENT, HeaderValue::from_static("curl/8.0"));

        inject_headers(&W3cTracer, &CallContext::new(), Some(&ua), &mut headers).unwrap();

        assert_eq!(headers.get_all(USER_AGENT).iter().count(), 1);
        assert_eq!(headers.get(USER_AGENT).unwrap(), "orders/1.0");
    }

    #[test]
    fn no_user_agent_configured_leaves_header_alone() {
        let mut headers = HeaderMap::new();
        inject_headers(&W3cTracer, &CallContext::new(), None, &mut headers).unwrap();
        assert!(headers.is_empty());
    }

    #[test]
    fn encoding_failure_is_returned() {
        let span = SpanContext::new_root().with_trace_state("broken\u{7f}");
        let ctx = CallContext::new().with_span(span);
        let mut headers = HeaderMap::new();
        assert!(inject_headers(&W3cTracer, &ctx, None, &mut headers).is_err());
    }
}
