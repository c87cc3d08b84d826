use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::DataError;
use crate::retry::classify::{cache_is_retryable, pg_is_retryable};

/// Decides whether a failed attempt's error is worth retrying.
pub type RetryableChecker<E> = fn(&E) -> bool;

/// Decision returned by the retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    /// The error is not retryable.
    NoRetry,
    /// The error is retryable but the attempt budget is spent.
    Exhausted,
    /// Retry after the given delay.
    RetryAfter(Duration),
}

/// Named policy presets available per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RetryPreset {
    /// Few attempts, short total delay. Suits request paths.
    #[default]
    Conservative,
    /// More attempts and a longer ceiling. Suits background work.
    Aggressive,
}

/// Exponential backoff policy with caps.
///
/// Immutable once built; it is `Copy`, so one value built at startup can be
/// handed to every call site.
pub struct RetryPolicy<E> {
    initial_backoff: Duration,
    max_backoff: Duration,
    max_attempts: u32,
    checker: RetryableChecker<E>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<E> Copy for RetryPolicy<E> {}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("initial_backoff", &self.initial_backoff)
            .field("max_backoff", &self.max_backoff)
            .field("max_attempts", &self.max_attempts)
            .finish_non_exhaustive()
    }
}

impl<E> RetryPolicy<E> {
    /// `max_attempts` counts the first attempt and is raised to at least 1.
    pub fn new(
        initial_backoff: Duration,
        max_backoff: Duration,
        max_attempts: u32,
        checker: RetryableChecker<E>,
    ) -> Self {
        Self {
            initial_backoff,
            max_backoff,
            max_attempts: max_attempts.max(1),
            checker,
        }
    }

    pub fn initial_backoff(&self) -> Duration {
        self.initial_backoff
    }

    pub fn max_backoff(&self) -> Duration {
        self.max_backoff
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    pub fn is_retryable(&self, err: &E) -> bool {
        (self.checker)(err)
    }

    /// Copy of this policy with any of the numeric settings replaced.
    pub fn with_overrides(
        self,
        max_attempts: Option<u32>,
        initial_backoff: Option<Duration>,
        max_backoff: Option<Duration>,
    ) -> Self {
        Self::new(
            initial_backoff.unwrap_or(self.initial_backoff),
            max_backoff.unwrap_or(self.max_backoff),
            max_attempts.unwrap_or(self.max_attempts),
            self.checker,
        )
    }

    /// Delay before the attempt following `attempt` (1-based):
    /// `initial_backoff * 2^(attempt-1)`, never above `max_backoff`.
    pub fn backoff(&self, attempt: u32) -> Duration {
        let exp = 1u32 << attempt.saturating_sub(1).min(16);
        self.initial_backoff
            .saturating_mul(exp)
            .min(self.max_backoff)
    }

    /// Decide what to do after `attempt` (1-based) failed with `err`.
    pub fn decide(&self, attempt: u32, err: &E) -> RetryDecision {
        if !self.is_retryable(err) {
            return RetryDecision::NoRetry;
        }
        if attempt >= self.max_attempts {
            return RetryDecision::Exhausted;
        }
        RetryDecision::RetryAfter(self.backoff(attempt))
    }
}

impl RetryPolicy<DataError> {
    /// Relational policy: unknown errors are not retried.
    pub fn postgres(preset: RetryPreset) -> Self {
        match preset {
            RetryPreset::Conservative => Self::new(
                Duration::from_millis(100),
                Duration::from_secs(2),
                3,
                pg_is_retryable,
            ),
            RetryPreset::Aggressive => Self::new(
                Duration::from_millis(50),
                Duration::from_secs(5),
                5,
                pg_is_retryable,
            ),
        }
    }

    /// Cache policy: unknown errors are retried.
    pub fn cache(preset: RetryPreset) -> Self {
        match preset {
            RetryPreset::Conservative => Self::new(
                Duration::from_millis(50),
                Duration::from_secs(1),
                3,
                cache_is_retryable,
            ),
            RetryPreset::Aggressive => Self::new(
                Duration::from_millis(25),
                Duration::from_secs(1),
                5,
                cache_is_retryable,
            ),
        }
    }
}
