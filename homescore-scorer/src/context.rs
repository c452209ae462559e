//! Per-run context threaded through both stages.
#![forbid(unsafe_code)]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use uuid::Uuid;

/// Cooperative cancellation flag shared between a caller and running stages.
///
/// Stages check the flag at batch and score-type boundaries, so work that
/// has already been committed is kept.
#[derive(Debug, Clone, Default)]
pub struct CancellationToken(Arc<AtomicBool>);

impl CancellationToken {
    /// Create a token that has not been cancelled.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Every clone observes the request.
    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Report whether cancellation was requested.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Correlation id and cancellation token for one pipeline run.
#[derive(Debug, Clone)]
pub struct RunContext {
    correlation_id: Uuid,
    cancellation: CancellationToken,
}

impl Default for RunContext {
    fn default() -> Self {
        Self::new()
    }
}

impl RunContext {
    /// Start a run with a fresh random correlation id.
    #[must_use]
    pub fn new() -> Self {
        Self::with_correlation_id(Uuid::new_v4())
    }

    /// Start a run with a caller-supplied correlation id.
    #[must_use]
    pub fn with_correlation_id(correlation_id: Uuid) -> Self {
        Self {
            correlation_id,
            cancellation: CancellationToken::new(),
        }
    }

    /// Replace the cancellation token, e.g. with one wired to a signal.
    #[must_use]
    pub fn with_cancellation(mut self, cancellation: CancellationToken) -> Self {
        self.cancellation = cancellation;
        self
    }

    /// Identifier attached to every log line of the run.
    #[must_use]
    pub const fn correlation_id(&self) -> Uuid {
        self.correlation_id
    }

    /// Token controlling the run.
    #[must_use]
    pub const fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }

    /// Report whether the run was asked to stop.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancellation.is_cancelled()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    fn cancelling_a_clone_cancels_the_run() {
        let token = CancellationToken::new();
        let context = RunContext::new().with_cancellation(token.clone());
        assert!(!context.is_cancelled());
        token.cancel();
        assert!(context.is_cancelled());
    }

    #[rstest]
    fn runs_get_distinct_correlation_ids() {
        assert_ne!(
            RunContext::new().correlation_id(),
            RunContext::new().correlation_id()
        );
    }
}
