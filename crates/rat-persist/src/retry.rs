//! Per-tier retry policy.
//!
//! Each tier is attempted up to `max_attempts` times before the chain falls
//! through. Only [`StrategyError::RemoteUnavailable`] (which includes an
//! attempt that ran past `attempt_timeout`) is retried; rejections and
//! expired credentials return immediately.

use std::future::Future;
use std::time::Duration;

use rat_core::StrategyKind;

use crate::error::StrategyError;

/// Attempts per tier, including the first.
pub const DEFAULT_MAX_ATTEMPTS: u32 = 2;

/// Pause between attempts.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 500;

/// Upper bound on a single attempt.
pub const DEFAULT_ATTEMPT_TIMEOUT_SECS: u64 = 15;

/// Delay schedule between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backoff {
    Fixed(Duration),
    /// `base * 2^(n-1)` before retry `n`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub backoff: Backoff,
    pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::fixed(
            DEFAULT_MAX_ATTEMPTS,
            Duration::from_millis(DEFAULT_RETRY_DELAY_MS),
        )
        .with_attempt_timeout(Duration::from_secs(DEFAULT_ATTEMPT_TIMEOUT_SECS))
    }
}

impl RetryPolicy {
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Fixed(delay),
            attempt_timeout: None,
        }
    }

    pub fn exponential(max_attempts: u32, base: Duration, max: Duration) -> Self {
        Self {
            max_attempts,
            backoff: Backoff::Exponential { base, max },
            attempt_timeout: None,
        }
    }

    /// A single attempt.
    pub fn no_retry() -> Self {
        Self::fixed(1, Duration::ZERO)
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        match self.backoff {
            Backoff::Fixed(d) => d,
            Backoff::Exponential { base, max } => {
                let factor = 2u32.saturating_pow(retry.saturating_sub(1));
                base.saturating_mul(factor).min(max)
            }
        }
    }

    /// Run `op` under this policy on behalf of `strategy`.
    pub async fn run<T, F, Fut>(&self, strategy: StrategyKind, mut op: F) -> Result<T, StrategyError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, StrategyError>>,
    {
        let max_attempts = self.max_attempts.max(1);
        let mut attempt = 1;
        loop {
            let result = match self.attempt_timeout {
                Some(limit) => match tokio::time::timeout(limit, op()).await {
                    Ok(r) => r,
                    Err(_) => Err(StrategyError::RemoteUnavailable {
                        strategy,
                        reason: format!("attempt timed out after {limit:?}"),
                    }),
                },
                None => op().await,
            };

            match result {
                Ok(v) => return Ok(v),
                Err(e) if e.is_retryable() && attempt < max_attempts => {
                    let delay = self.delay_for(attempt);
                    tracing::warn!(
                        %strategy,
                        attempt,
                        max_attempts,
                        "persist attempt failed, retrying in {delay:?}: {e}"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}
