//! Per-call error kinds.

use std::time::Duration;

use thiserror::Error;

use crate::http::transport::BoxError;
use crate::observability::tracing::InjectError;
use crate::resilience::circuit_breaker::CallOutcome;

/// Why a call did not produce a response.
///
/// Each variant is distinguishable so callers can pick a fallback, e.g. serve
/// cached data on [`CallError::CircuitOpen`] but alert on [`CallError::Transport`].
#[derive(Debug, Error)]
pub enum CallError {
    /// Trace context could not be serialized; the call was not attempted.
    #[error("unable to inject tracing headers: {0}")]
    TracingInjectionFailed(#[source] InjectError),

    /// The breaker rejected the call; the transport was not invoked.
    #[error("circuit open for operation `{operation}`")]
    CircuitOpen { operation: String },

    /// The effective deadline passed before a response arrived.
    #[error("operation `{operation}` timed out after {timeout:?}")]
    CallTimeout { operation: String, timeout: Duration },

    /// The caller cancelled the call context.
    #[error("operation `{operation}` was cancelled")]
    Cancelled { operation: String },

    /// The transport failed (connect, protocol, I/O).
    #[error("transport error for operation `{operation}`: {source}")]
    Transport {
        operation: String,
        #[source]
        source: BoxError,
    },
}

impl CallError {
    /// How the breaker accounted for this error.
    pub fn outcome(&self) -> CallOutcome {
        match self {
            CallError::TracingInjectionFailed(_) | CallError::Cancelled { .. } => CallOutcome::Cancelled,
            CallError::CircuitOpen { .. } => CallOutcome::ShortCircuited,
            CallError::CallTimeout { .. } => CallOutcome::Timeout,
            CallError::Transport { .. } => CallOutcome::Failure,
        }
    }

    pub fn is_circuit_open(&self) -> bool {
        matches!(self, CallError::CircuitOpen { .. })
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, CallError::CallTimeout { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, CallError::Transport { .. })
    }
}
