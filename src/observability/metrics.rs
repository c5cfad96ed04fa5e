//! Metrics collection and exposition.
//!
//! # Metrics
//! - `guppy_calls_total` (counter): calls by operation and outcome
//! - `guppy_call_duration_seconds` (histogram): transport latency by operation
//! - `guppy_breaker_state` (gauge): 0=closed, 1=half-open, 2=open
//! - `guppy_breaker_transitions_total` (counter): transitions by operation, target state
//!
//! # Design Decisions
//! - Recording goes through the `metrics` facade and is a no-op without a recorder
//! - Exposition (Prometheus) is opt-in and installed by the binary

use std::net::SocketAddr;
use std::time::Instant;

use metrics_exporter_prometheus::PrometheusBuilder;

use crate::resilience::circuit_breaker::{BreakerState, CallOutcome};

/// Install the Prometheus exporter listening on `addr`.
///
/// Must be called from within a Tokio runtime.
pub fn init_metrics(addr: SocketAddr) {
    match PrometheusBuilder::new().with_http_listener(addr).install() {
        Ok(()) => tracing::info!(address = %addr, "Metrics exporter listening"),
        Err(e) => tracing::error!(address = %addr, error = %e, "Failed to install metrics exporter"),
    }
}

/// Record the outcome of one call (admitted or short-circuited).
pub fn record_call(operation: &str, outcome: CallOutcome) {
    metrics::counter!(
        "guppy_calls_total",
        "operation" => operation.to_string(),
        "outcome" => outcome.as_str()
    )
    .increment(1);
}

/// Record how long the transport took for one admitted call.
pub fn record_call_duration(operation: &str, start: Instant) {
    metrics::histogram!("guppy_call_duration_seconds", "operation" => operation.to_string())
        .record(start.elapsed().as_secs_f64());
}

/// Publish the current breaker state.
pub fn record_breaker_state(operation: &str, state: BreakerState) {
    metrics::gauge!("guppy_breaker_state", "operation" => operation.to_string()).set(state.as_gauge());
}

/// Record a breaker state transition.
pub fn record_breaker_transition(operation: &str, to: BreakerState) {
    record_breaker_state(operation, to);
    metrics::counter!(
        "guppy_breaker_transitions_total",
        "operation" => operation.to_string(),
        "to" => to.as_str()
    )
    .increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker};

    #[test]
    fn new_breaker_exports_closed_state() {
        let recorder = PrometheusBuilder::new().build_recorder();
        let handle = recorder.handle();

        metrics::with_local_recorder(&recorder, || {
            let _breaker = CircuitBreaker::new("orders/inventory", BreakerSettings::default());
        });

        let rendered = handle.render();
        assert!(rendered.contains(r#"guppy_breaker_state{operation="orders/inventory"} 0"#));
        assert!(!rendered.contains("guppy_breaker_transitions_total"));
    }
}
