//! Shared retry driver
//!
//! One loop serves every call site that needs bounded repetition: the
//! provisioner's transient-create retries and the propagation wait on
//! the connection's service identity. Call sites express a single
//! attempt as [`Attempt`] and the policy drives the loop, so the retry
//! arithmetic lives in exactly one place.

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;

/// Delay progression between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Backoff {
    /// Same delay every time.
    Fixed,
    /// Delay doubles each attempt, capped.
    Exponential { cap: Duration },
}

/// Bounded retry policy: attempt count, base delay, and progression.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub interval: Duration,
    pub backoff: Backoff,
}

impl RetryPolicy {
    /// Fixed-interval policy.
    #[must_use]
    pub fn fixed(max_attempts: u32, interval: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Fixed,
        }
    }

    /// Doubling policy with a delay cap.
    #[must_use]
    pub fn exponential(max_attempts: u32, interval: Duration, cap: Duration) -> Self {
        Self {
            max_attempts,
            interval,
            backoff: Backoff::Exponential { cap },
        }
    }

    /// Delay to sleep after the given 1-based attempt.
    #[must_use]
    pub fn delay(&self, attempt: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed => self.interval,
            Backoff::Exponential { cap } => {
                let shift = attempt.saturating_sub(1).min(16);
                self.interval.saturating_mul(1u32 << shift).min(cap)
            }
        }
    }

    /// Drive an operation until it completes, fails fatally, or the
    /// attempt budget runs out.
    ///
    /// The operation receives the 1-based attempt number and is invoked
    /// at most `max_attempts` times. The policy sleeps between attempts
    /// only, never after the last one.
    pub async fn run<T, E, F, Fut>(&self, mut op: F) -> Result<T, RetryError<E>>
    where
        F: FnMut(u32) -> Fut,
        Fut: Future<Output = Attempt<T, E>>,
    {
        let attempts = self.max_attempts.max(1);
        let mut last_reason = String::new();
        for attempt in 1..=attempts {
            match op(attempt).await {
                Attempt::Done(value) => return Ok(value),
                Attempt::Fail(error) => return Err(RetryError::Fatal(error)),
                Attempt::Retry(reason) => {
                    last_reason = reason;
                    if attempt < attempts {
                        tokio::time::sleep(self.delay(attempt)).await;
                    }
                }
            }
        }
        Err(RetryError::Exhausted {
            attempts,
            last_reason,
        })
    }
}

/// Outcome of a single attempt.
#[derive(Debug)]
pub enum Attempt<T, E> {
    /// The operation produced its value; stop.
    Done(T),
    /// Not there yet; try again if budget remains.
    Retry(String),
    /// Unrecoverable; stop immediately without consuming the budget.
    Fail(E),
}

/// Terminal outcome of a retried operation that never completed.
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The attempt budget ran out.
    #[error("gave up after {attempts} attempts: {last_reason}")]
    Exhausted { attempts: u32, last_reason: String },

    /// An attempt failed fatally.
    #[error("{0}")]
    Fatal(E),
}
