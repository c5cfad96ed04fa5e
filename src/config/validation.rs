//! Settings validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (timeouts > 0, threshold >= 1, addresses parse)
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: ClientSettings → Result<(), Vec<ValidationError>>
//! - Runs before settings are turned into options
//! - Identity is checked when the options are built, after any overrides

use std::net::SocketAddr;

use thiserror::Error;

use crate::config::schema::ClientSettings;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];

/// A single semantic problem in the settings file.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("{field} must be greater than zero")]
    ZeroValue { field: &'static str },

    #[error("invalid log level `{0}`")]
    LogLevel(String),

    #[error("invalid metrics address `{0}`")]
    MetricsAddress(String),
}

/// Check every semantic rule and report all violations.
pub fn validate_settings(settings: &ClientSettings) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    let ranges = [
        ("call_timeout_ms", settings.call_timeout_ms),
        ("circuit.timeout_ms", settings.circuit.timeout_ms),
        ("circuit.open_timeout_ms", settings.circuit.open_timeout_ms),
        ("circuit.failure_threshold", u64::from(settings.circuit.failure_threshold)),
    ];
    for (field, value) in ranges {
        if value == 0 {
            errors.push(ValidationError::ZeroValue { field });
        }
    }

    let level = settings.observability.log_level.to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        errors.push(ValidationError::LogLevel(settings.observability.log_level.clone()));
    }

    if let Some(addr) = &settings.observability.metrics_address {
        if addr.parse::<SocketAddr>().is_err() {
            errors.push(ValidationError::MetricsAddress(addr.clone()));
        }
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}
