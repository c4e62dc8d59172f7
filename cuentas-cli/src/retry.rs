//! Bounded retry with linear backoff for transport calls.

use std::thread;
use std::time::Duration;
use thiserror::Error;
use tracing::{error, warn};

/// Statuses that will not get better by asking again.
pub const NON_RETRYABLE_STATUS: &[u16] = &[403, 404];
/// Rate limiting and transient server failures.
pub const RETRYABLE_STATUS: &[u16] = &[429, 500, 502, 503, 504];

/// A transport failure carrying an HTTP status code.
#[derive(Debug, Error)]
#[error("HTTP {status}: {body}")]
pub struct HttpStatusError {
    pub status: u16,
    pub body: String,
}

/// Status code of the first [`HttpStatusError`] in the error chain.
pub fn http_status(err: &anyhow::Error) -> Option<u16> {
    err.chain()
        .find_map(|e| e.downcast_ref::<HttpStatusError>())
        .map(|e| e.status)
}

pub type RetryCallback = Box<dyn Fn(u32, &anyhow::Error)>;

pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    on_retry: Option<RetryCallback>,
}

/// What happened after all attempts.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    pub result: anyhow::Result<T>,
    pub attempts: u32,
}

impl<T> RetryOutcome<T> {
    pub fn into_result(self) -> anyhow::Result<T> {
        self.result
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            on_retry: None,
        }
    }

    /// Called with the failed attempt number and its error before each
    /// backoff sleep.
    pub fn with_on_retry(mut self, f: impl Fn(u32, &anyhow::Error) + 'static) -> Self {
        self.on_retry = Some(Box::new(f));
        self
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Delay after failed attempt `attempt` (1-based).
    pub fn delay_for(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }

    pub fn run<T>(&self, mut op: impl FnMut() -> anyhow::Result<T>) -> RetryOutcome<T> {
        let mut attempt = 0;
        loop {
            attempt += 1;
            let err = match op() {
                Ok(value) => {
                    return RetryOutcome {
                        result: Ok(value),
                        attempts: attempt,
                    };
                }
                Err(e) => e,
            };

            match http_status(&err) {
                Some(status) if NON_RETRYABLE_STATUS.contains(&status) => {
                    error!(status, attempt, error = %err, "non-retryable status, giving up");
                    return RetryOutcome {
                        result: Err(err),
                        attempts: attempt,
                    };
                }
                Some(status) if RETRYABLE_STATUS.contains(&status) => {
                    warn!(status, attempt, max = self.max_attempts, "retryable status");
                }
                Some(status) => {
                    error!(status, attempt, max = self.max_attempts, error = %err, "unexpected status");
                }
                None => {
                    warn!(attempt, max = self.max_attempts, error = %err, "attempt failed");
                }
            }

            if attempt >= self.max_attempts {
                error!(attempts = attempt, error = %err, "all attempts failed");
                return RetryOutcome {
                    result: Err(err),
                    attempts: attempt,
                };
            }

            if let Some(cb) = &self.on_retry {
                cb(attempt, &err);
            }
            let delay = self.delay_for(attempt);
            if !delay.is_zero() {
                thread::sleep(delay);
            }
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_secs(2))
    }
}
