//! Configuration file schema.
//!
//! Mirrors every named option so a client can be configured from a TOML file.
//! All types derive Serde traits; durations are expressed in milliseconds.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::options::ConfigOption;

/// Root of the settings file.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ClientSettings {
    /// Name of the calling service.
    pub service_name: Option<String>,

    /// Name of the service being called.
    pub upstream_service_name: Option<String>,

    /// Explicit operation name (defaults to `service/upstream`).
    pub operation_name: Option<String>,

    /// Value of the `User-Agent` header sent on every call.
    pub user_agent: Option<String>,

    /// Upper bound for a whole call in milliseconds.
    pub call_timeout_ms: u64,

    /// Transport-level timeouts.
    pub transport: TransportConfig,

    /// Circuit breaker thresholds.
    pub circuit: CircuitConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ClientSettings {
    fn default() -> Self {
        Self {
            service_name: None,
            upstream_service_name: None,
            operation_name: None,
            user_agent: None,
            call_timeout_ms: 500,
            transport: TransportConfig::default(),
            circuit: CircuitConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// Transport timeouts; unset values keep the transport's defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// How long an idle pooled connection is kept.
    pub idle_conn_timeout_ms: Option<u64>,

    /// Connection establishment timeout.
    pub tls_handshake_timeout_ms: Option<u64>,

    /// Time allowed for the response headers once the request is sent.
    pub response_header_timeout_ms: Option<u64>,
}

/// Circuit breaker configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CircuitConfig {
    /// Rolling window over which failures are counted.
    pub timeout_ms: u64,

    /// How long the circuit stays open before a probe is allowed.
    pub open_timeout_ms: u64,

    /// Failures within the window that open the circuit.
    pub failure_threshold: u32,
}

impl Default for CircuitConfig {
    fn default() -> Self {
        Self {
            timeout_ms: 500,
            open_timeout_ms: 60_000,
            failure_threshold: 5,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error).
    pub log_level: String,

    /// Prometheus exporter bind address; disabled when unset.
    pub metrics_address: Option<String>,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            metrics_address: None,
        }
    }
}

impl ClientSettings {
    /// Translate the file settings into the ordered option list.
    pub fn to_options(&self) -> Vec<ConfigOption> {
        let mut options = Vec::new();

        if let Some(name) = &self.service_name {
            options.push(ConfigOption::ServiceName(name.clone()));
        }
        if let Some(name) = &self.upstream_service_name {
            options.push(ConfigOption::UpstreamServiceName(name.clone()));
        }
        if let Some(name) = &self.operation_name {
            options.push(ConfigOption::OperationName(name.clone()));
        }
        if let Some(ua) = &self.user_agent {
            options.push(ConfigOption::UserAgent(ua.clone()));
        }

        if let Some(ms) = self.transport.idle_conn_timeout_ms {
            options.push(ConfigOption::IdleConnTimeout(Duration::from_millis(ms)));
        }
        if let Some(ms) = self.transport.tls_handshake_timeout_ms {
            options.push(ConfigOption::TlsHandshakeTimeout(Duration::from_millis(ms)));
        }
        if let Some(ms) = self.transport.response_header_timeout_ms {
            options.push(ConfigOption::ResponseHeaderTimeout(Duration::from_millis(ms)));
        }

        options.push(ConfigOption::CallTimeout(Duration::from_millis(self.call_timeout_ms)));
        options.push(ConfigOption::CircuitTimeout(Duration::from_millis(self.circuit.timeout_ms)));
        options.push(ConfigOption::CircuitOpenTimeout(Duration::from_millis(
            self.circuit.open_timeout_ms,
        )));
        options.push(ConfigOption::FailureThreshold(self.circuit.failure_threshold));

        options
    }
}
