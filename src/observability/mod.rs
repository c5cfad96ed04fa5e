//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! Every outbound call produces:
//!     → logging.rs (structured log events)
//!     → metrics.rs (outcome counters, latency, breaker state)
//!     → tracing.rs (trace context propagated in request headers)
//! ```
//!
//! # Design Decisions
//! - Structured logging for machine parsing
//! - Metrics are cheap (facade calls, no-op without a recorder)
//! - Trace propagation only happens when the caller has an active span

pub mod logging;
pub mod metrics;
pub mod tracing;

pub use self::tracing::{InjectError, SharedTracer, SpanContext, Tracer, W3cTracer};
