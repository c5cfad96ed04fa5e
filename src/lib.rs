//! Resilient outbound HTTP client.
//!
//! Decorates service-to-service calls with trace-context propagation,
//! user-agent tagging, per-call timeouts and a circuit breaker keyed by
//! operation name.
//!
//! ```text
//! Configuration::new([options])  →  Configuration::build()  →  Client
//!
//! Client::call(ctx, operation, request):
//!     breaker ── open ──▶ CallError::CircuitOpen
//!        │
//!     deadline = min(ctx deadline, call timeout)
//!        │
//!     headers (traceparent, User-Agent)
//!        │
//!     transport ──▶ outcome recorded on breaker ──▶ response / error
//! ```

pub mod config;
pub mod context;
pub mod http;
pub mod observability;
pub mod resilience;

pub use config::{ClientSettings, ConfigError, ConfigOption, Configuration, ConfigurationBuilder};
pub use context::CallContext;
pub use http::{CallError, Client, Transport};
pub use observability::tracing::{SpanContext, Tracer, W3cTracer};
pub use resilience::{BreakerRegistry, BreakerSettings, BreakerState, CallOutcome, CircuitBreaker};
