//! Circuit-breaker seam.
//!
//! The breaker state machine lives outside this crate. The retry executor
//! only derives a key from the operation name, asks for admission before
//! each attempt, and reports the outcome of every admitted attempt back.

mod key;

use std::sync::Arc;

use crate::config::BreakerConfig;
use crate::error::BreakerOpen;

pub use key::{sanitize_breaker_name, BreakerKey};

/// A keyed circuit breaker supplied by the embedding service.
pub trait CircuitBreaker: Send + Sync {
    /// Admit or reject a call for `key`. Rejections are never retried.
    fn admit(&self, key: &BreakerKey) -> Result<(), BreakerOpen>;

    /// The call for `key` succeeded.
    fn on_success(&self, key: &BreakerKey);

    /// The call for `key` failed with a transient error.
    fn on_failure(&self, key: &BreakerKey);

    /// The admitted call for `key` ended without saying anything about the
    /// dependency's health: a terminal business error or caller cancellation.
    /// Breakers that hand out a limited number of half-open probes release
    /// the slot here.
    fn on_ignored(&self, _key: &BreakerKey) {}
}

/// Breaker that admits everything. Used when breaking is disabled.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopBreaker;

impl CircuitBreaker for NoopBreaker {
    fn admit(&self, _key: &BreakerKey) -> Result<(), BreakerOpen> {
        Ok(())
    }

    fn on_success(&self, _key: &BreakerKey) {}

    fn on_failure(&self, _key: &BreakerKey) {}
}

/// The breaker to use given the config: `external` when enabled and
/// supplied, otherwise a [`NoopBreaker`].
pub fn select_breaker(
    cfg: &BreakerConfig,
    external: Option<Arc<dyn CircuitBreaker>>,
) -> Arc<dyn CircuitBreaker> {
    match external {
        Some(b) if cfg.enabled => b,
        Some(_) => {
            tracing::info!("circuit breaker disabled by config");
            Arc::new(NoopBreaker)
        }
        None => Arc::new(NoopBreaker),
    }
}
