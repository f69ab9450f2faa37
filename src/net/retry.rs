use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::common::cancel::wait_cancellable;
use crate::common::errors::{EngineError, EngineResult};
use crate::configs::RetryConfig;

/// Exponential backoff tracker for transient stream failures.
pub struct Backoff {
    attempt: u32,
    max_attempts: u32,
    base_delay: Duration,
}

impl Backoff {
    pub fn new(config: &RetryConfig) -> Self {
        Self {
            attempt: 0,
            max_attempts: config.max_attempts,
            base_delay: Duration::from_millis(config.base_delay_ms),
        }
    }

    /// Delay before the next attempt, doubling per failure with the
    /// exponent capped at 3.
    pub fn next_delay(&mut self) -> Duration {
        self.attempt += 1;
        let exp = (self.attempt - 1).min(3);
        self.base_delay * 2u32.pow(exp)
    }

    pub fn is_exhausted(&self) -> bool {
        self.attempt >= self.max_attempts
    }

    pub fn reset(&mut self) {
        self.attempt = 0;
    }
}

/// Runs `op` until it succeeds, the attempt budget is spent, or the token
/// fires. Only transient errors are retried; permanent errors return on the
/// first occurrence.
pub fn retry_fetch<T>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    label: &str,
    mut op: impl FnMut() -> EngineResult<T>,
) -> EngineResult<T> {
    let mut backoff = Backoff::new(config);
    loop {
        if cancel.is_cancelled() {
            return Err(EngineError::Cancelled);
        }
        match op() {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() => {
                let delay = backoff.next_delay();
                if backoff.is_exhausted() {
                    return Err(e);
                }
                warn!("{} failed ({}), retrying in {:?}", label, e, delay);
                if !wait_cancellable(cancel, delay) {
                    return Err(e);
                }
            }
            Err(e) => return Err(e),
        }
    }
}
