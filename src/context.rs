//! Per-call context.
//!
//! # Responsibilities
//! - Carry the caller's deadline (if any) into the executor
//! - Carry a cancellation handle the caller can trigger from elsewhere
//! - Carry the active trace span to propagate downstream
//!
//! # Design Decisions
//! - Deadlines are monotonic (`tokio::time::Instant`), never wall-clock
//! - Contexts are cheap to clone; clones share the cancellation token
//! - A context without a deadline is bounded only by the configured call timeout

use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use crate::observability::tracing::SpanContext;

/// Context supplied by the caller for one (or several) outbound calls.
#[derive(Debug, Clone, Default)]
pub struct CallContext {
    deadline: Option<Instant>,
    cancel: CancellationToken,
    span: Option<SpanContext>,
}

impl CallContext {
    /// An empty context: no deadline, not cancelled, no active span.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set an absolute deadline.
    pub fn with_deadline(mut self, deadline: Instant) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Set a deadline relative to now.
    pub fn with_timeout(self, timeout: Duration) -> Self {
        self.with_deadline(Instant::now() + timeout)
    }

    /// Use the given cancellation token instead of a private one.
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    /// Attach the active span whose context is propagated downstream.
    pub fn with_span(mut self, span: SpanContext) -> Self {
        self.span = Some(span);
        self
    }

    pub fn deadline(&self) -> Option<Instant> {
        self.deadline
    }

    pub fn span(&self) -> Option<&SpanContext> {
        self.span.as_ref()
    }

    /// Handle that cancels every call made with this context (and its clones).
    pub fn cancellation_token(&self) -> &CancellationToken {
        &self.cancel
    }

    /// Cancel in-flight and future calls made with this context.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Resolves once the context is cancelled.
    pub async fn cancelled(&self) {
        self.cancel.cancelled().await
    }
}
