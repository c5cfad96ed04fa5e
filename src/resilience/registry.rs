//! Shared breaker registry.
//!
//! # Responsibilities
//! - Map operation names to breakers so several clients can share one
//!
//! # Design Decisions
//! - Passed explicitly to configurations; there is no process-global registry
//! - First registration wins: later settings for the same name are ignored

use std::sync::Arc;

use dashmap::DashMap;

use crate::resilience::circuit_breaker::{BreakerSettings, CircuitBreaker};

/// Concurrent map of operation name to breaker.
#[derive(Debug, Default)]
pub struct BreakerRegistry {
    breakers: DashMap<String, Arc<CircuitBreaker>>,
}

impl BreakerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the breaker for `operation`, creating it with `settings` if absent.
    pub fn get_or_create(&self, operation: &str, settings: BreakerSettings) -> Arc<CircuitBreaker> {
        if let Some(existing) = self.breakers.get(operation) {
            return existing.value().clone();
        }
        self.breakers
            .entry(operation.to_string())
            .or_insert_with(|| {
                tracing::debug!(operation = %operation, "Registering circuit breaker");
                Arc::new(CircuitBreaker::new(operation, settings))
            })
            .value()
            .clone()
    }

    pub fn get(&self, operation: &str) -> Option<Arc<CircuitBreaker>> {
        self.breakers.get(operation).map(|b| b.value().clone())
    }

    pub fn len(&self) -> usize {
        self.breakers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.breakers.is_empty()
    }
}
