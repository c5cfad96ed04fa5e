//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Outbound call:
//!     → circuit_breaker.rs (admit or short-circuit)
//!     → timeouts.rs (effective deadline = min(caller, configured))
//!     → transport
//!     → circuit_breaker.rs (record outcome, maybe transition)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every call has a deadline
//! - No internal retries; retry policy belongs to the caller
//! - Circuit breaker prevents cascading failures
//! - Breakers are shared only through an explicit registry

pub mod circuit_breaker;
pub mod registry;
pub mod timeouts;

pub use circuit_breaker::{BreakerSettings, BreakerState, CallOutcome, CallPermit, CircuitBreaker};
pub use registry::BreakerRegistry;
pub use timeouts::{effective_deadline, Deadline};
