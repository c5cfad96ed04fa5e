//! Timeout enforcement.
//!
//! # Responsibilities
//! - Compose the caller's deadline with the configured call timeout
//! - Expose the effective deadline to transports via request extensions
//!
//! # Design Decisions
//! - Uses Tokio's monotonic clock; the earliest deadline always wins
//! - Timeout errors are distinct from transport errors

use std::time::Duration;
use tokio::time::Instant;

/// Effective deadline of a call, inserted into the outgoing request's extensions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Deadline(pub Instant);

impl Deadline {
    /// Time left before the deadline (zero once passed).
    pub fn remaining(&self) -> Duration {
        self.0.saturating_duration_since(Instant::now())
    }
}

/// The lesser of the caller's deadline and `now + call_timeout`.
pub fn effective_deadline(now: Instant, caller: Option<Instant>, call_timeout: Duration) -> Deadline {
    let configured = now + call_timeout;
    match caller {
        Some(caller) if caller < configured => Deadline(caller),
        _ => Deadline(configured),
    }
}
