//! Retry logic with exponential backoff and jitter.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

use crate::error::{PostHogError, Result};

pub const DEFAULT_MAX_RETRIES: u32 = 3;
pub const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(3000);
pub const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(30);

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Retries after the first attempt. Default: 3 (four attempts in total)
    pub max_retries: u32,

    /// Delay before the first retry. Default: 3s
    pub base_delay: Duration,

    /// Upper bound on any single delay. Default: 30s
    pub max_delay: Duration,

    /// Backoff multiplier. Default: 2.0
    pub backoff_multiplier: f64,

    /// Maximum random jitter added to each delay. Default: none
    pub jitter: Duration,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: 2.0,
            jitter: Duration::ZERO,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> RetryConfigBuilder {
        RetryConfigBuilder::default()
    }

    /// Delay before retry number `retry` (0-based):
    /// `base_delay * multiplier ^ retry`, capped at `max_delay`, plus jitter.
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let exponential =
            self.base_delay.as_millis() as f64 * self.backoff_multiplier.powi(retry as i32);
        let capped = exponential.min(self.max_delay.as_millis() as f64);

        let jitter = if self.jitter.is_zero() {
            0.0
        } else {
            rand::random::<f64>() * self.jitter.as_millis() as f64
        };

        Duration::from_millis((capped + jitter) as u64)
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }
}

#[derive(Debug, Default)]
pub struct RetryConfigBuilder {
    max_retries: Option<u32>,
    base_delay: Option<Duration>,
    max_delay: Option<Duration>,
    backoff_multiplier: Option<f64>,
    jitter: Option<Duration>,
}

impl RetryConfigBuilder {
    pub fn max_retries(mut self, retries: u32) -> Self {
        self.max_retries = Some(retries);
        self
    }

    pub fn base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = Some(delay);
        self
    }

    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = Some(delay);
        self
    }

    pub fn backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = Some(multiplier);
        self
    }

    pub fn jitter(mut self, jitter: Duration) -> Self {
        self.jitter = Some(jitter);
        self
    }

    pub fn build(self) -> RetryConfig {
        RetryConfig {
            max_retries: self.max_retries.unwrap_or(DEFAULT_MAX_RETRIES),
            base_delay: self.base_delay.unwrap_or(DEFAULT_BASE_DELAY),
            max_delay: self.max_delay.unwrap_or(DEFAULT_MAX_DELAY),
            backoff_multiplier: self.backoff_multiplier.unwrap_or(2.0),
            jitter: self.jitter.unwrap_or(Duration::ZERO),
        }
    }
}

/// Outcome of [`with_retry`] with the number of attempts made.
#[derive(Debug)]
pub struct RetryResult<T> {
    pub result: Result<T>,
    pub attempts: u32,
}

/// Run `operation` until it succeeds, `should_retry` rejects the error, or
/// the retry budget is spent. The last error is returned on failure.
pub async fn with_retry<T, F, Fut, P>(
    operation: F,
    config: &RetryConfig,
    should_retry: P,
) -> RetryResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T>>,
    P: Fn(&PostHogError) -> bool,
{
    let mut attempt: u32 = 0;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => {
                return RetryResult {
                    result: Ok(value),
                    attempts: attempt,
                }
            }
            Err(e) => {
                if !should_retry(&e) || attempt >= config.max_attempts() {
                    return RetryResult {
                        result: Err(e),
                        attempts: attempt,
                    };
                }

                let delay = config.calculate_delay(attempt - 1);
                tracing::debug!(
                    attempt,
                    max_attempts = config.max_attempts(),
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Retrying request"
                );
                sleep(delay).await;
            }
        }
    }
}
