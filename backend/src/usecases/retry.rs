use std::{future::Future, time::Duration};

use anyhow::Result;
use backon::{ExponentialBuilder, Retryable};
use tracing::warn;

/// Bounded exponential backoff: `max_retries` retries after the first attempt,
/// waiting `initial_backoff`, then double that, and so on. No jitter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub initial_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_backoff: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_retries: u32, initial_backoff: Duration) -> Self {
        Self {
            max_retries,
            initial_backoff,
        }
    }

    /// Delay before retry number `retry` (0-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        self.initial_backoff
            .saturating_mul(2u32.saturating_pow(retry))
    }

    fn backoff(&self) -> ExponentialBuilder {
        ExponentialBuilder::default()
            .with_min_delay(self.initial_backoff)
            .with_max_delay(self.delay_for(self.max_retries))
            .with_factor(2.0)
            .with_max_times(self.max_retries as usize)
    }

    /// Runs `operation` until it succeeds or the retries are used up; the error of
    /// the final attempt is returned as is.
    pub async fn run<T, F, Fut>(&self, label: &str, operation: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let max_attempts = self.max_retries + 1;
        let mut attempt = 0u32;

        operation
            .retry(self.backoff())
            .notify(|err: &anyhow::Error, delay: Duration| {
                attempt += 1;
                warn!(
                    operation = label,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = ?err,
                    "retry: attempt failed, backing off"
                );
            })
            .await
    }
}
