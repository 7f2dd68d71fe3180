//! Bounded retry with a fixed inter-attempt delay.

use std::future::Future;
use std::time::Duration;

use crate::error::AppError;

/// How many times to attempt an operation and how long to wait between tries.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Never less than 1.
    pub max_attempts: u32,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, retry_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            retry_delay,
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts.max(1);
        self
    }

    pub fn with_retry_delay(mut self, retry_delay: Duration) -> Self {
        self.retry_delay = retry_delay;
        self
    }

    fn attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Result of [`attempt_with_retry`].
#[derive(Debug)]
pub enum RetryOutcome<T> {
    Success { value: T, attempts: u32 },
    Exhausted { attempts: u32, last_error: AppError },
}

impl<T> RetryOutcome<T> {
    pub fn is_success(&self) -> bool {
        matches!(self, RetryOutcome::Success { .. })
    }

    pub fn attempts(&self) -> u32 {
        match self {
            RetryOutcome::Success { attempts, .. } | RetryOutcome::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Run `op` until it succeeds or `policy.max_attempts` is reached.
///
/// `op` receives the 1-based attempt number. `on_failure` is called after
/// every failed attempt with that number, the error, and whether another
/// attempt follows. The delay is slept only between attempts.
pub async fn attempt_with_retry<T, F, Fut, R>(
    policy: &RetryPolicy,
    mut op: F,
    mut on_failure: R,
) -> RetryOutcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AppError>>,
    R: FnMut(u32, &AppError, bool),
{
    let max_attempts = policy.attempts();
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => {
                return RetryOutcome::Success {
                    value,
                    attempts: attempt,
                };
            }
            Err(e) => {
                let will_retry = attempt < max_attempts;
                on_failure(attempt, &e, will_retry);

                if !will_retry {
                    return RetryOutcome::Exhausted {
                        attempts: attempt,
                        last_error: e,
                    };
                }
            }
        }

        tokio::time::sleep(policy.retry_delay).await;
        attempt += 1;
    }
}
