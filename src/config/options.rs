//! Named configuration options and the immutable client configuration.
//!
//! Options are applied in order over defaults; the last value for a field wins.
//! Validation runs once, after every option has been applied.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use hyper::header::HeaderValue;
use thiserror::Error;

use crate::http::client::Client;
use crate::http::transport::{HyperTransport, SharedTransport, TransportTimeouts};
use crate::observability::tracing::{SharedTracer, W3cTracer};
use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker};
use crate::resilience::registry::BreakerRegistry;

/// Default bound on a single call.
pub const DEFAULT_CALL_TIMEOUT: Duration = Duration::from_millis(500);
/// Default rolling window for counting breaker failures.
pub const DEFAULT_CIRCUIT_TIMEOUT: Duration = Duration::from_millis(500);
/// Default time the breaker stays open.
pub const DEFAULT_CIRCUIT_OPEN_TIMEOUT: Duration = Duration::from_secs(60);
/// Default failures in the window that open the breaker.
pub const DEFAULT_FAILURE_THRESHOLD: u32 = 5;

/// Errors raised while assembling a [`Configuration`].
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Neither an operation name nor a complete service/upstream pair was given.
    #[error("must specify operation name and/or service name and upstream service name")]
    IdentityNotSpecified,

    /// An option carries a value that can never work.
    #[error("invalid option `{option}`: {reason}")]
    InvalidOption { option: &'static str, reason: String },
}

/// One named configuration option.
#[derive(Clone)]
pub enum ConfigOption {
    ServiceName(String),
    UpstreamServiceName(String),
    OperationName(String),
    UserAgent(String),
    IdleConnTimeout(Duration),
    TlsHandshakeTimeout(Duration),
    ResponseHeaderTimeout(Duration),
    /// Upper bound for a whole call.
    CallTimeout(Duration),
    /// Rolling window over which breaker failures are counted.
    CircuitTimeout(Duration),
    /// How long the breaker stays open before probing.
    CircuitOpenTimeout(Duration),
    FailureThreshold(u32),
    /// Replace the default hyper transport.
    Transport(SharedTransport),
    Tracer(SharedTracer),
    /// Take the breaker from a shared registry instead of creating a private one.
    BreakerRegistry(Arc<BreakerRegistry>),
}

impl ConfigOption {
    fn name(&self) -> &'static str {
        match self {
            ConfigOption::ServiceName(_) => "service_name",
            ConfigOption::UpstreamServiceName(_) => "upstream_service_name",
            ConfigOption::OperationName(_) => "operation_name",
            ConfigOption::UserAgent(_) => "user_agent",
            ConfigOption::IdleConnTimeout(_) => "idle_conn_timeout",
            ConfigOption::TlsHandshakeTimeout(_) => "tls_handshake_timeout",
            ConfigOption::ResponseHeaderTimeout(_) => "response_header_timeout",
            ConfigOption::CallTimeout(_) => "call_timeout",
            ConfigOption::CircuitTimeout(_) => "circuit_timeout",
            ConfigOption::CircuitOpenTimeout(_) => "circuit_open_timeout",
            ConfigOption::FailureThreshold(_) => "failure_threshold",
            ConfigOption::Transport(_) => "transport",
            ConfigOption::Tracer(_) => "tracer",
            ConfigOption::BreakerRegistry(_) => "breaker_registry",
        }
    }
}

impl fmt::Debug for ConfigOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigOption::ServiceName(v)
            | ConfigOption::UpstreamServiceName(v)
            | ConfigOption::OperationName(v)
            | ConfigOption::UserAgent(v) => write!(f, "{}({:?})", self.name(), v),
            ConfigOption::IdleConnTimeout(d)
            | ConfigOption::TlsHandshakeTimeout(d)
            | ConfigOption::ResponseHeaderTimeout(d)
            | ConfigOption::CallTimeout(d)
            | ConfigOption::CircuitTimeout(d)
            | ConfigOption::CircuitOpenTimeout(d) => write!(f, "{}({:?})", self.name(), d),
            ConfigOption::FailureThreshold(n) => write!(f, "{}({})", self.name(), n),
            ConfigOption::Transport(_) | ConfigOption::Tracer(_) | ConfigOption::BreakerRegistry(_) => {
                f.write_str(self.name())
            }
        }
    }
}

/// Working state while options are applied.
#[derive(Default)]
struct Draft {
    service_name: Option<String>,
    upstream_service_name: Option<String>,
    operation_name: Option<String>,
    user_agent: Option<String>,
    transport_timeouts: TransportTimeouts,
    call_timeout: Option<Duration>,
    circuit_timeout: Option<Duration>,
    circuit_open_timeout: Option<Duration>,
    failure_threshold: Option<u32>,
    transport: Option<SharedTransport>,
    tracer: Option<SharedTracer>,
    registry: Option<Arc<BreakerRegistry>>,
}

impl Draft {
    fn apply(&mut self, option: ConfigOption) {
        match option {
            ConfigOption::ServiceName(v) => self.service_name = non_empty(v),
            ConfigOption::UpstreamServiceName(v) => self.upstream_service_name = non_empty(v),
            ConfigOption::OperationName(v) => self.operation_name = non_empty(v),
            ConfigOption::UserAgent(v) => self.user_agent = non_empty(v),
            ConfigOption::IdleConnTimeout(d) => self.transport_timeouts.idle_conn = Some(d),
            ConfigOption::TlsHandshakeTimeout(d) => self.transport_timeouts.handshake = Some(d),
            ConfigOption::ResponseHeaderTimeout(d) => self.transport_timeouts.response_header = Some(d),
            ConfigOption::CallTimeout(d) => self.call_timeout = Some(d),
            ConfigOption::CircuitTimeout(d) => self.circuit_timeout = Some(d),
            ConfigOption::CircuitOpenTimeout(d) => self.circuit_open_timeout = Some(d),
            ConfigOption::FailureThreshold(n) => self.failure_threshold = Some(n),
            ConfigOption::Transport(t) => self.transport = Some(t),
            ConfigOption::Tracer(t) => self.tracer = Some(t),
            ConfigOption::BreakerRegistry(r) => self.registry = Some(r),
        }
    }

    fn validate(self) -> Result<Configuration, ConfigError> {
        let operation_name = match (&self.operation_name, &self.service_name, &self.upstream_service_name) {
            (Some(op), _, _) => op.clone(),
            (None, Some(service), Some(upstream)) => format!("{}/{}", service, upstream),
            _ => return Err(ConfigError::IdentityNotSpecified),
        };

        let user_agent = match self.user_agent {
            Some(ua) => Some(HeaderValue::from_str(&ua).map_err(|e| ConfigError::InvalidOption {
                option: "user_agent",
                reason: e.to_string(),
            })?),
            None => None,
        };

        let call_timeout = non_zero("call_timeout", self.call_timeout.unwrap_or(DEFAULT_CALL_TIMEOUT))?;
        let breaker = BreakerSettings {
            failure_threshold: match self.failure_threshold.unwrap_or(DEFAULT_FAILURE_THRESHOLD) {
                0 => {
                    return Err(ConfigError::InvalidOption {
                        option: "failure_threshold",
                        reason: "must be at least 1".to_string(),
                    })
                }
                n => n,
            },
            trip_window: non_zero("circuit_timeout", self.circuit_timeout.unwrap_or(DEFAULT_CIRCUIT_TIMEOUT))?,
            open_duration: non_zero(
                "circuit_open_timeout",
                self.circuit_open_timeout.unwrap_or(DEFAULT_CIRCUIT_OPEN_TIMEOUT),
            )?,
        };

        Ok(Configuration {
            service_name: self.service_name,
            upstream_service_name: self.upstream_service_name,
            operation_name,
            user_agent,
            transport_timeouts: self.transport_timeouts,
            call_timeout,
            breaker,
            transport: self.transport,
            tracer: self.tracer.unwrap_or_else(|| Arc::new(W3cTracer)),
            registry: self.registry,
        })
    }
}

fn non_empty(value: String) -> Option<String> {
    (!value.is_empty()).then_some(value)
}

fn non_zero(option: &'static str, value: Duration) -> Result<Duration, ConfigError> {
    if value.is_zero() {
        return Err(ConfigError::InvalidOption {
            option,
            reason: "must be greater than zero".to_string(),
        });
    }
    Ok(value)
}

/// Validated, immutable client configuration.
#[derive(Clone)]
pub struct Configuration {
    service_name: Option<String>,
    upstream_service_name: Option<String>,
    operation_name: String,
    user_agent: Option<HeaderValue>,
    transport_timeouts: TransportTimeouts,
    call_timeout: Duration,
    breaker: BreakerSettings,
    transport: Option<SharedTransport>,
    tracer: SharedTracer,
    registry: Option<Arc<BreakerRegistry>>,
}

impl Configuration {
    /// Apply `options` in order over the defaults and validate the result.
    pub fn new<I>(options: I) -> Result<Self, ConfigError>
    where
        I: IntoIterator<Item = ConfigOption>,
    {
        let mut draft = Draft::default();
        for option in options {
            draft.apply(option);
        }
        draft.validate()
    }

    pub fn builder() -> ConfigurationBuilder {
        ConfigurationBuilder::default()
    }

    /// Construct a client bound to this configuration.
    ///
    /// The breaker comes from the configured registry when there is one,
    /// otherwise it is private to the returned client (and its clones).
    pub fn build(&self) -> Client {
        let breaker = match &self.registry {
            Some(registry) => registry.get_or_create(&self.operation_name, self.breaker),
            None => Arc::new(CircuitBreaker::new(self.operation_name.clone(), self.breaker)),
        };
        let transport = match &self.transport {
            Some(transport) => transport.clone(),
            None => Arc::new(HyperTransport::new(self.transport_timeouts)) as SharedTransport,
        };

        tracing::debug!(
            operation = %self.operation_name,
            call_timeout = ?self.call_timeout,
            failure_threshold = self.breaker.failure_threshold,
            open_duration = ?self.breaker.open_duration,
            "Client configured"
        );

        Client::new(self.clone(), breaker, transport)
    }

    pub fn service_name(&self) -> Option<&str> {
        self.service_name.as_deref()
    }

    pub fn upstream_service_name(&self) -> Option<&str> {
        self.upstream_service_name.as_deref()
    }

    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    pub fn user_agent(&self) -> Option<&HeaderValue> {
        self.user_agent.as_ref()
    }

    pub fn transport_timeouts(&self) -> &TransportTimeouts {
        &self.transport_timeouts
    }

    pub fn call_timeout(&self) -> Duration {
        self.call_timeout
    }

    pub fn breaker_settings(&self) -> &BreakerSettings {
        &self.breaker
    }

    pub fn tracer(&self) -> &SharedTracer {
        &self.tracer
    }
}

impl fmt::Debug for Configuration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Configuration")
            .field("operation_name", &self.operation_name)
            .field("service_name", &self.service_name)
            .field("upstream_service_name", &self.upstream_service_name)
            .field("user_agent", &self.user_agent)
            .field("transport_timeouts", &self.transport_timeouts)
            .field("call_timeout", &self.call_timeout)
            .field("breaker", &self.breaker)
            .field("custom_transport", &self.transport.is_some())
            .field("shared_registry", &self.registry.is_some())
            .finish()
    }
}

/// Fluent front-end over an ordered [`ConfigOption`] list.
#[derive(Debug, Default, Clone)]
pub struct ConfigurationBuilder {
    options: Vec<ConfigOption>,
}

impl ConfigurationBuilder {
    pub fn option(mut self, option: ConfigOption) -> Self {
        self.options.push(option);
        self
    }

    pub fn options<I: IntoIterator<Item = ConfigOption>>(mut self, options: I) -> Self {
        self.options.extend(options);
        self
    }

    pub fn service_name(self, name: impl Into<String>) -> Self {
        self.option(ConfigOption::ServiceName(name.into()))
    }

    pub fn upstream_service_name(self, name: impl Into<String>) -> Self {
        self.option(ConfigOption::UpstreamServiceName(name.into()))
    }

    pub fn operation_name(self, name: impl Into<String>) -> Self {
        self.option(ConfigOption::OperationName(name.into()))
    }

    pub fn user_agent(self, user_agent: impl Into<String>) -> Self {
        self.option(ConfigOption::UserAgent(user_agent.into()))
    }

    pub fn idle_conn_timeout(self, timeout: Duration) -> Self {
        self.option(ConfigOption::IdleConnTimeout(timeout))
    }

    pub fn tls_handshake_timeout(self, timeout: Duration) -> Self {
        self.option(ConfigOption::TlsHandshakeTimeout(timeout))
    }

    pub fn response_header_timeout(self, timeout: Duration) -> Self {
        self.option(ConfigOption::ResponseHeaderTimeout(timeout))
    }

    pub fn call_timeout(self, timeout: Duration) -> Self {
        self.option(ConfigOption::CallTimeout(timeout))
    }

    pub fn circuit_timeout(self, timeout: Duration) -> Self {
        self.option(ConfigOption::CircuitTimeout(timeout))
    }

    pub fn circuit_open_timeout(self, timeout: Duration) -> Self {
        self.option(ConfigOption::CircuitOpenTimeout(timeout))
    }

    pub fn failure_threshold(self, threshold: u32) -> Self {
        self.option(ConfigOption::FailureThreshold(threshold))
    }

    pub fn transport(self, transport: SharedTransport) -> Self {
        self.option(ConfigOption::Transport(transport))
    }

    pub fn tracer(self, tracer: SharedTracer) -> Self {
        self.option(ConfigOption::Tracer(tracer))
    }

    pub fn breaker_registry(self, registry: Arc<BreakerRegistry>) -> Self {
        self.option(ConfigOption::BreakerRegistry(registry))
    }

    /// Validate the collected options.
    pub fn finish(self) -> Result<Configuration, ConfigError> {
        Configuration::new(self.options)
    }

    /// Validate and construct a client in one step.
    pub fn build(self) -> Result<Client, ConfigError> {
        Ok(self.finish()?.build())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_identity_is_rejected() {
        let cases: Vec<Vec<ConfigOption>> = vec![
            vec![],
            vec![ConfigOption::ServiceName("orders".into())],
            vec![ConfigOption::UpstreamServiceName("inventory".into())],
            vec![
                ConfigOption::ServiceName("orders".into()),
                ConfigOption::UpstreamServiceName(String::new()),
            ],
            vec![ConfigOption::OperationName(String::new()), ConfigOption::UserAgent("ua".into())],
        ];
        for options in cases {
            let result = Configuration::new(options.clone());
            assert!(
                matches!(result, Err(ConfigError::IdentityNotSpecified)),
                "expected identity error for {:?}",
                options
            );
        }
    }

    #[test]
    fn operation_name_derived_from_service_pair() {
        let config = Configuration::builder()
            .service_name("orders")
            .upstream_service_name("inventory")
            .finish()
            .unwrap();
        assert_eq!(config.operation_name(), "orders/inventory");
    }

    #[test]
    fn explicit_operation_name_needs_no_service_identity() {
        let config = Configuration::builder().operation_name("fetch-stock").finish().unwrap();
        assert_eq!(config.operation_name(), "fetch-stock");
        assert!(config.service_name().is_none());
    }

    #[test]
    fn explicit_operation_name_wins_over_derivation() {
        let config = Configuration::builder()
            .service_name("orders")
            .upstream_service_name("inventory")
            .operation_name("fetch-stock")
            .finish()
            .unwrap();
        assert_eq!(config.operation_name(), "fetch-stock");
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = Configuration::builder().operation_name("op").finish().unwrap();
        assert_eq!(config.call_timeout(), Duration::from_millis(500));
        assert_eq!(config.breaker_settings().trip_window, Duration::from_millis(500));
        assert_eq!(config.breaker_settings().open_duration, Duration::from_secs(60));
        assert_eq!(config.breaker_settings().failure_threshold, DEFAULT_FAILURE_THRESHOLD);
        assert!(config.user_agent().is_none());
        assert_eq!(config.transport_timeouts(), &TransportTimeouts::default());
    }

    #[test]
    fn explicit_values_override_defaults_and_last_wins() {
        let config = Configuration::new(vec![
            ConfigOption::OperationName("op".into()),
            ConfigOption::CallTimeout(Duration::from_secs(1)),
            ConfigOption::CircuitOpenTimeout(Duration::from_secs(5)),
            ConfigOption::CallTimeout(Duration::from_secs(2)),
            ConfigOption::IdleConnTimeout(Duration::from_secs(30)),
            ConfigOption::UserAgent("orders/1.0".into()),
        ])
        .unwrap();
        assert_eq!(config.call_timeout(), Duration::from_secs(2));
        assert_eq!(config.breaker_settings().open_duration, Duration::from_secs(5));
        assert_eq!(config.transport_timeouts().idle_conn, Some(Duration::from_secs(30)));
        assert_eq!(config.user_agent().unwrap(), "orders/1.0");
    }

    #[test]
    fn invalid_values_are_rejected() {
        let err = Configuration::builder()
            .operation_name("op")
            .user_agent("bad\r\nagent")
            .finish()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { option: "user_agent", .. }));

        let err = Configuration::builder()
            .operation_name("op")
            .call_timeout(Duration::ZERO)
            .finish()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { option: "call_timeout", .. }));

        let err = Configuration::builder()
            .operation_name("op")
            .failure_threshold(0)
            .finish()
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidOption { option: "failure_threshold", .. }));
    }

    #[tokio::test]
    async fn registry_shares_breakers_between_clients() {
        let registry = Arc::new(BreakerRegistry::new());
        let config = Configuration::builder()
            .operation_name("orders/inventory")
            .breaker_registry(registry.clone())
            .finish()
            .unwrap();

        let a = config.build();
        let b = config.build();
        assert!(Arc::ptr_eq(a.breaker(), b.breaker()));
        assert_eq!(registry.len(), 1);
    }

    #[tokio::test]
    async fn private_breakers_without_registry() {
        let config = Configuration::builder().operation_name("op").finish().unwrap();
        let a = config.build();
        let b = config.build();
        assert!(!Arc::ptr_eq(a.breaker(), b.breaker()));
    }

    #[test]
    fn error_message_names_identity_fields() {
        let msg = ConfigError::IdentityNotSpecified.to_string();
        assert!(msg.contains("operation name"));
        assert!(msg.contains("upstream service name"));
    }
}
