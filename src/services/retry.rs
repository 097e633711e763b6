use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

use crate::config::RetryPolicy;
use crate::error::{DubError, Result};

impl RetryPolicy {
    /// Delay before attempt `attempt + 1` (attempts count from 1)
    pub fn backoff_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(1u32 << exponent)
            .min(self.max_backoff)
    }

    /// Run `call` with a per-attempt timeout, retrying retryable failures.
    ///
    /// Non-retryable errors and the last attempt's error are returned as is.
    pub async fn run<T, F, Fut>(&self, service: &'static str, mut call: F) -> Result<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut attempt = 1;

        loop {
            let outcome = match tokio::time::timeout(self.call_timeout, call()).await {
                Ok(outcome) => outcome,
                Err(_) => Err(DubError::CollaboratorTimeout {
                    service,
                    after: self.call_timeout,
                }),
            };

            match outcome {
                Ok(value) => {
                    if attempt > 1 {
                        debug!("{} succeeded on attempt {}", service, attempt);
                    }
                    return Ok(value);
                }
                Err(e) if e.is_retryable() && attempt < attempts => {
                    let delay = self.backoff_for(attempt);
                    warn!(
                        "{} attempt {}/{} failed: {} (retrying in {:?})",
                        service, attempt, attempts, e, delay
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
