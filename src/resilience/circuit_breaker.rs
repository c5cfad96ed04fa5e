//! Circuit breaker for upstream protection.
//!
//! # States
//! - Closed: normal operation, calls pass through
//! - Open: upstream assumed down, calls fail fast
//! - Half-Open: testing if upstream recovered
//!
//! # State Transitions
//! ```text
//! Closed → Open: failures in trip window >= failure_threshold
//! Open → Half-Open: first admission attempt after open_duration
//! Half-Open → Closed: probe call succeeds
//! Half-Open → Open: probe call fails or times out
//! ```
//!
//! # Design Decisions
//! - One breaker per operation, owned by the client or a shared registry
//! - Fail fast in Open state (no waiting for timeout)
//! - Single probe in Half-Open (prevents hammering recovering upstream)
//! - Admission hands out a permit; dropping it unresolved counts as cancelled
//! - Outcomes from calls admitted before the last transition are ignored

use std::collections::VecDeque;
use std::fmt;
use std::sync::{Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::observability::metrics;

/// Breaker thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BreakerSettings {
    /// Failures within `trip_window` that open the circuit.
    pub failure_threshold: u32,
    /// Rolling window over which failures are counted.
    pub trip_window: Duration,
    /// How long the circuit stays open before a probe is admitted.
    pub open_duration: Duration,
}

impl Default for BreakerSettings {
    fn default() -> Self {
        Self {
            failure_threshold: 5,
            trip_window: Duration::from_millis(500),
            open_duration: Duration::from_secs(60),
        }
    }
}

/// Current breaker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BreakerState {
    Closed,
    Open,
    HalfOpen,
}

impl BreakerState {
    pub fn as_str(&self) -> &'static str {
        match self {
            BreakerState::Closed => "closed",
            BreakerState::Open => "open",
            BreakerState::HalfOpen => "half_open",
        }
    }

    pub(crate) fn as_gauge(&self) -> f64 {
        match self {
            BreakerState::Closed => 0.0,
            BreakerState::HalfOpen => 1.0,
            BreakerState::Open => 2.0,
        }
    }
}

impl fmt::Display for BreakerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one call as seen by the breaker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallOutcome {
    /// A response was received, whatever its status code.
    Success,
    /// The transport failed (connect, protocol, I/O).
    Failure,
    /// The effective deadline passed before a response arrived.
    Timeout,
    /// Rejected by the breaker without reaching the transport.
    ShortCircuited,
    /// The caller gave up, or the call never reached the transport.
    Cancelled,
}

impl CallOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            CallOutcome::Success => "success",
            CallOutcome::Failure => "failure",
            CallOutcome::Timeout => "timeout",
            CallOutcome::ShortCircuited => "short_circuited",
            CallOutcome::Cancelled => "cancelled",
        }
    }

    fn is_failure(&self) -> bool {
        matches!(self, CallOutcome::Failure | CallOutcome::Timeout)
    }
}

#[derive(Debug)]
struct Core {
    state: BreakerState,
    /// Timestamps of failures inside the trip window (Closed only).
    failures: VecDeque<Instant>,
    opened_at: Option<Instant>,
    probe_in_flight: bool,
    /// Bumped on every transition; permits from older generations are stale.
    generation: u64,
}

impl Core {
    fn transition(&mut self, to: BreakerState, now: Instant) {
        self.state = to;
        self.generation += 1;
        self.failures.clear();
        self.probe_in_flight = false;
        self.opened_at = match to {
            BreakerState::Open => Some(now),
            _ => None,
        };
    }
}

/// Circuit breaker guarding one logical operation.
#[derive(Debug)]
pub struct CircuitBreaker {
    name: String,
    settings: BreakerSettings,
    core: Mutex<Core>,
}

impl CircuitBreaker {
    pub fn new(name: impl Into<String>, settings: BreakerSettings) -> Self {
        let name = name.into();
        metrics::record_breaker_state(&name, BreakerState::Closed);
        Self {
            name,
            settings,
            core: Mutex::new(Core {
                state: BreakerState::Closed,
                failures: VecDeque::new(),
                opened_at: None,
                probe_in_flight: false,
                generation: 0,
            }),
        }
    }

    /// Operation name this breaker is keyed by.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn settings(&self) -> &BreakerSettings {
        &self.settings
    }

    /// Current state. An expired Open state is reported as Open until the next admission attempt.
    pub fn state(&self) -> BreakerState {
        self.lock().state
    }

    /// Failures currently counted in the trip window.
    pub fn failure_count(&self) -> usize {
        self.lock().failures.len()
    }

    /// Ask to make a call. `None` means the call must be short-circuited.
    pub fn try_acquire(&self) -> Option<CallPermit<'_>> {
        self.try_acquire_at(Instant::now())
    }

    pub(crate) fn try_acquire_at(&self, now: Instant) -> Option<CallPermit<'_>> {
        let mut core = self.lock();
        let state = core.state;
        let probe = match state {
            BreakerState::Closed => false,
            BreakerState::Open => {
                let opened_at = core.opened_at.unwrap_or(now);
                if now.saturating_duration_since(opened_at) < self.settings.open_duration {
                    return None;
                }
                core.transition(BreakerState::HalfOpen, now);
                core.probe_in_flight = true;
                let generation = core.generation;
                drop(core);
                self.announce(BreakerState::HalfOpen);
                return Some(CallPermit::new(self, generation, true));
            }
            BreakerState::HalfOpen => {
                if core.probe_in_flight {
                    return None;
                }
                core.probe_in_flight = true;
                true
            }
        };
        Some(CallPermit::new(self, core.generation, probe))
    }

    fn record_at(&self, generation: u64, probe: bool, outcome: CallOutcome, now: Instant) {
        let mut core = self.lock();
        if generation != core.generation {
            tracing::trace!(
                operation = %self.name,
                outcome = outcome.as_str(),
                "Ignoring outcome from a previous breaker generation"
            );
            return;
        }

        let state = core.state;
        let transitioned = match (state, probe) {
            (BreakerState::Closed, false) => match outcome {
                CallOutcome::Success => {
                    core.failures.clear();
                    None
                }
                o if o.is_failure() => {
                    let window = self.settings.trip_window;
                    while let Some(&oldest) = core.failures.front() {
                        if now.saturating_duration_since(oldest) >= window {
                            core.failures.pop_front();
                        } else {
                            break;
                        }
                    }
                    core.failures.push_back(now);
                    if core.failures.len() >= self.settings.failure_threshold as usize {
                        core.transition(BreakerState::Open, now);
                        Some(BreakerState::Open)
                    } else {
                        None
                    }
                }
                _ => None,
            },
            (BreakerState::HalfOpen, true) => match outcome {
                CallOutcome::Success => {
                    core.transition(BreakerState::Closed, now);
                    Some(BreakerState::Closed)
                }
                o if o.is_failure() => {
                    core.transition(BreakerState::Open, now);
                    Some(BreakerState::Open)
                }
                _ => {
                    // Probe never completed; let the next caller try.
                    core.probe_in_flight = false;
                    None
                }
            },
            _ => None,
        };
        drop(core);

        if let Some(to) = transitioned {
            self.announce(to);
        }
    }

    fn announce(&self, to: BreakerState) {
        match to {
            BreakerState::Open => tracing::warn!(
                operation = %self.name,
                open_for = ?self.settings.open_duration,
                "Circuit opened"
            ),
            BreakerState::HalfOpen => tracing::info!(operation = %self.name, "Circuit half-open, probing upstream"),
            BreakerState::Closed => tracing::info!(operation = %self.name, "Circuit closed"),
        }
        metrics::record_breaker_transition(&self.name, to);
    }

    fn lock(&self) -> MutexGuard<'_, Core> {
        // Core is left consistent by every critical section.
        self.core.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Admission granted by [`CircuitBreaker::try_acquire`].
///
/// Resolve it with [`CallPermit::record`]; dropping it unresolved records `Cancelled`.
#[must_use = "an unresolved permit counts as a cancelled call"]
#[derive(Debug)]
pub struct CallPermit<'a> {
    breaker: &'a CircuitBreaker,
    generation: u64,
    probe: bool,
    resolved: bool,
}

impl<'a> CallPermit<'a> {
    fn new(breaker: &'a CircuitBreaker, generation: u64, probe: bool) -> Self {
        Self {
            breaker,
            generation,
            probe,
            resolved: false,
        }
    }

    /// Whether this call is the single Half-Open probe.
    pub fn is_probe(&self) -> bool {
        self.probe
    }

    /// Report how the call ended.
    pub fn record(self, outcome: CallOutcome) {
        self.record_at(outcome, Instant::now());
    }

    pub(crate) fn record_at(mut self, outcome: CallOutcome, now: Instant) {
        self.resolved = true;
        self.breaker.record_at(self.generation, self.probe, outcome, now);
    }
}

impl Drop for CallPermit<'_> {
    fn drop(&mut self) {
        if !self.resolved {
            self.breaker
                .record_at(self.generation, self.probe, CallOutcome::Cancelled, Instant::now());
        }
    }
}
