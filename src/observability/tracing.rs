//! Distributed tracing context propagation.
//!
//! # Responsibilities
//! - Represent the context of the caller's active span
//! - Serialize it into outgoing request headers (W3C Trace Context)
//! - Parse it back out of incoming headers so services can forward it
//!
//! # Design Decisions
//! - Propagation is a capability (`Tracer`) so callers can plug their own format
//! - Absence of an active span is not an error; a malformed carrier is
//! - Only the `traceparent` version `00` layout is produced

use std::fmt;
use std::sync::Arc;

use hyper::header::{HeaderMap, HeaderName, HeaderValue};
use rand::Rng;
use thiserror::Error;

use crate::context::CallContext;

/// Header carrying trace id, parent span id and flags.
pub const TRACEPARENT: HeaderName = HeaderName::from_static("traceparent");
/// Header carrying vendor-specific trace state.
pub const TRACESTATE: HeaderName = HeaderName::from_static("tracestate");

const SAMPLED_FLAG: u8 = 0x01;

/// Errors raised while serializing a span context into headers.
#[derive(Debug, Error)]
pub enum InjectError {
    /// The span context has an all-zero trace id or span id.
    #[error("span context is invalid: {0}")]
    InvalidContext(String),

    /// A serialized value is not a legal header value.
    #[error("cannot encode `{header}` header: {reason}")]
    Encoding { header: &'static str, reason: String },
}

/// Identity of the active span that is propagated downstream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpanContext {
    trace_id: u128,
    span_id: u64,
    flags: u8,
    trace_state: Option<String>,
}

impl SpanContext {
    pub fn new(trace_id: u128, span_id: u64, sampled: bool) -> Self {
        Self {
            trace_id,
            span_id,
            flags: if sampled { SAMPLED_FLAG } else { 0 },
            trace_state: None,
        }
    }

    /// Start a new sampled trace with random identifiers.
    pub fn new_root() -> Self {
        let trace_id = uuid::Uuid::new_v4().as_u128();
        Self::new(trace_id, random_span_id(), true)
    }

    /// A new span within the same trace.
    pub fn child(&self) -> Self {
        Self {
            span_id: random_span_id(),
            ..self.clone()
        }
    }

    /// Attach vendor trace state (`tracestate` header value).
    pub fn with_trace_state(mut self, state: impl Into<String>) -> Self {
        self.trace_state = Some(state.into());
        self
    }

    pub fn trace_id(&self) -> u128 {
        self.trace_id
    }

    pub fn span_id(&self) -> u64 {
        self.span_id
    }

    pub fn is_sampled(&self) -> bool {
        self.flags & SAMPLED_FLAG != 0
    }

    pub fn trace_state(&self) -> Option<&str> {
        self.trace_state.as_deref()
    }

    pub fn is_valid(&self) -> bool {
        self.trace_id != 0 && self.span_id != 0
    }

    /// `traceparent` serialization of this context.
    pub fn to_traceparent(&self) -> String {
        format!(
            "00-{:032x}-{:016x}-{:02x}",
            self.trace_id, self.span_id, self.flags
        )
    }

    /// Parse the span context carried by incoming request headers.
    ///
    /// Returns `None` when the header is missing or malformed.
    pub fn extract(headers: &HeaderMap) -> Option<Self> {
        let raw = headers.get(TRACEPARENT)?.to_str().ok()?;
        let mut parts = raw.trim().split('-');

        let version = parts.next()?;
        if version.len() != 2 || version == "ff" {
            return None;
        }
        let trace_id = parse_hex_field(parts.next()?, 32).and_then(|v| u128::from_str_radix(v, 16).ok())?;
        let span_id = parse_hex_field(parts.next()?, 16).and_then(|v| u64::from_str_radix(v, 16).ok())?;
        let flags = parse_hex_field(parts.next()?, 2).and_then(|v| u8::from_str_radix(v, 16).ok())?;
        // Version 00 has exactly four fields.
        if version == "00" && parts.next().is_some() {
            return None;
        }

        let context = Self {
            trace_id,
            span_id,
            flags,
            trace_state: headers
                .get(TRACESTATE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string),
        };
        context.is_valid().then_some(context)
    }
}

impl fmt::Display for SpanContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:032x}/{:016x}", self.trace_id, self.span_id)
    }
}

fn parse_hex_field(field: &str, len: usize) -> Option<&str> {
    (field.len() == len && field.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))).then_some(field)
}

fn random_span_id() -> u64 {
    // Zero is reserved as the invalid span id.
    rand::thread_rng().gen_range(1..=u64::MAX)
}

/// Capability to find the active span for a call and serialize it into headers.
pub trait Tracer: Send + Sync + fmt::Debug {
    /// The span to propagate for a call made with `ctx`.
    fn active_span(&self, ctx: &CallContext) -> Option<SpanContext> {
        ctx.span().cloned()
    }

    /// Write the carrier for `span` into `headers`.
    fn inject(&self, span: &SpanContext, headers: &mut HeaderMap) -> Result<(), InjectError>;
}

/// Shared tracer handle stored in the configuration.
pub type SharedTracer = Arc<dyn Tracer>;

/// W3C Trace Context propagator (`traceparent` + `tracestate`).
#[derive(Debug, Clone, Copy, Default)]
pub struct W3cTracer;

impl Tracer for W3cTracer {
    fn inject(&self, span: &SpanContext, headers: &mut HeaderMap) -> Result<(), InjectError> {
        if !span.is_valid() {
            return Err(InjectError::InvalidContext(span.to_string()));
        }

        let parent = HeaderValue::from_str(&span.to_traceparent()).map_err(|e| InjectError::Encoding {
            header: "traceparent",
            reason: e.to_string(),
        })?;

        let state = match span.trace_state() {
            Some(state) => Some(HeaderValue::from_str(state).map_err(|e| InjectError::Encoding {
                header: "tracestate",
                reason: e.to_string(),
            })?),
            None => None,
        };

        // Nothing is written unless both values encode.
        headers.insert(TRACEPARENT, parent);
        match state {
            Some(value) => {
                headers.insert(TRACESTATE, value);
            }
            None => {
                headers.remove(TRACESTATE);
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn traceparent_layout() {
        let span = SpanContext::new(0x0af7651916cd43dd8448eb211c80319c, 0xb7ad6b7169203331, true);
        assert_eq!(
            span.to_traceparent(),
            "00-0af7651916cd43dd8448eb211c80319c-b7ad6b7169203331-01"
        );
    }

    #[test]
    fn inject_then_extract_preserves_identity() {
        let span = SpanContext::new_root().with_trace_state("vendor=abc");
        let mut headers = HeaderMap::new();
        W3cTracer.inject(&span, &mut headers).unwrap();

        let extracted = SpanContext::extract(&headers).unwrap();
        assert_eq!(extracted, span);
    }

    #[test]
    fn extract_rejects_malformed_headers() {
        let mut headers = HeaderMap::new();
        assert!(SpanContext::extract(&headers).is_none());

        headers.insert(TRACEPARENT, HeaderValue::from_static("00-xyz-b7ad6b7169203331-01"));
        assert!(SpanContext::extract(&headers).is_none());

        headers.insert(
            TRACEPARENT,
            HeaderValue::from_static("00-00000000000000000000000000000000-b7ad6b7169203331-01"),
        );
        assert!(SpanContext::extract(&headers).is_none());

        headers.insert(
            TRACEPARENT,
            HeaderValue::from_static("00-0AF7651916CD43DD8448EB211C80319C-b7ad6b7169203331-01"),
        );
        assert!(SpanContext::extract(&headers).is_none());
    }

    #[test]
    fn child_keeps_trace_and_changes_span() {
        let root = SpanContext::new_root();
        let child = root.child();
        assert_eq!(child.trace_id(), root.trace_id());
        assert_ne!(child.span_id(), root.span_id());
        assert!(child.is_sampled());
    }

    #[test]
    fn invalid_trace_state_is_an_encoding_error() {
        let span = SpanContext::new_root().with_trace_state("bad\nvalue");
        let mut headers = HeaderMap::new();
        let err = W3cTracer.inject(&span, &mut headers).unwrap_err();
        assert!(matches!(err, InjectError::Encoding { header: "tracestate", .. }));
        assert!(headers.is_empty());
    }

    #[test]
    fn zero_ids_are_rejected() {
        let span = SpanContext::new(0, 1, true);
        let mut headers = HeaderMap::new();
        assert!(matches!(
            W3cTracer.inject(&span, &mut headers),
            Err(InjectError::InvalidContext(_))
        ));
    }
}
