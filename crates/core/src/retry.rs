//! Bounded retry with exponential backoff, plus per-call deadlines.

use crate::error::{EmbeddingError, GenerationError};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryPolicy {
    /// Total attempts including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            multiplier: 2.0,
        }
    }
}

impl RetryPolicy {
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    fn next_delay(&self, current: Duration) -> Duration {
        Duration::from_secs_f64(current.as_secs_f64() * self.multiplier.max(1.0)).min(self.max_delay)
    }
}

pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

impl Retryable for EmbeddingError {
    fn is_retryable(&self) -> bool {
        EmbeddingError::is_retryable(self)
    }
}

impl Retryable for GenerationError {
    fn is_retryable(&self) -> bool {
        GenerationError::is_retryable(self)
    }
}

/// Runs `operation` until it succeeds, fails permanently, or runs out of attempts.
pub async fn with_retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    let mut delay = policy.initial_delay;

    loop {
        attempt += 1;
        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < max_attempts && error.is_retryable() => {
                tracing::warn!(attempt, max_attempts, %error, ?delay, "transient provider failure, retrying");
                sleep(delay).await;
                delay = policy.next_delay(delay);
            }
            Err(error) => return Err(error),
        }
    }
}

/// Fails with `on_timeout(limit)` when `future` does not finish within `limit`.
pub async fn with_timeout<T, E, Fut>(
    limit: Duration,
    future: Fut,
    on_timeout: impl FnOnce(Duration) -> E,
) -> Result<T, E>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, future).await {
        Ok(result) => result,
        Err(_elapsed) => Err(on_timeout(limit)),
    }
}
