//! Exponential backoff around store calls.
#![forbid(unsafe_code)]

use std::thread;
use std::time::Duration;

use homescore_core::StoreError;

use crate::{RunContext, StageError};

/// Retry schedule for transient store failures.
///
/// Only [`StoreError::Unavailable`] is retried; every other store error fails
/// immediately. The delay before retry `n` (counting from zero) is
/// `initial_backoff * multiplier^n`, capped at `max_backoff`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry.
    pub initial_backoff: Duration,
    /// Upper bound on any single delay.
    pub max_backoff: Duration,
    /// Growth factor between consecutive delays.
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_millis(100),
            max_backoff: Duration::from_secs(10),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Retry up to `max_retries` times without sleeping.
    #[must_use]
    pub const fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            initial_backoff: Duration::ZERO,
            max_backoff: Duration::ZERO,
            multiplier: 1,
        }
    }

    /// Delay before retry number `retry`, starting at zero.
    #[must_use]
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(retry);
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }

    /// Call `operation` until it succeeds, fails permanently, or the retry
    /// budget is spent.
    ///
    /// # Errors
    /// Returns [`StageError::Store`] for permanent failures and
    /// [`StageError::RetriesExhausted`] when every attempt was transient.
    pub fn run<T>(
        &self,
        context: &RunContext,
        operation: &'static str,
        mut call: impl FnMut() -> Result<T, StoreError>,
    ) -> Result<T, StageError> {
        let mut retry = 0;
        loop {
            match call() {
                Ok(value) => return Ok(value),
                Err(source) if !source.is_transient() => {
                    return Err(StageError::Store { operation, source });
                }
                Err(source) if retry >= self.max_retries => {
                    log::warn!(
                        "[{}] {operation} still failing after {} attempts: {source}",
                        context.correlation_id(),
                        retry + 1
                    );
                    return Err(StageError::RetriesExhausted {
                        operation,
                        attempts: retry + 1,
                        source,
                    });
                }
                Err(source) => {
                    let delay = self.backoff(retry);
                    retry += 1;
                    log::warn!(
                        "[{}] {operation} failed ({source}); retry {retry}/{} in {delay:?}",
                        context.correlation_id(),
                        self.max_retries
                    );
                    thread::sleep(delay);
                }
            }
        }
    }
}
