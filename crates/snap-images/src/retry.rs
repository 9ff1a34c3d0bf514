use std::future::Future;
use std::time::Duration;

use tracing::debug;

/// Bounded retry with exponential backoff.
///
/// Attempt `n` (1-based) that fails is followed by a sleep of
/// `base_delay * 2^(n-1)`; no sleep follows the last attempt.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay: Duration::from_millis(100),
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after the given failed attempt.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.saturating_pow(attempt.saturating_sub(1))
    }

    /// Run `op` until it succeeds or attempts are exhausted.
    ///
    /// On exhaustion returns the number of attempts made and the last error.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, (u32, E)>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(e) if attempt >= attempts => return Err((attempt, e)),
                Err(_) => {
                    let delay = self.delay_after(attempt);
                    debug!(attempt, delay_ms = delay.as_millis() as u64, "retrying");
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }
}
