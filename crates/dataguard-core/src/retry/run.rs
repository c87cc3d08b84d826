//! Retry loop: run an async operation until it succeeds, fails terminally,
//! or the policy says stop.

use std::fmt::Display;
use std::future::Future;

use tracing::{debug, warn};

use super::policy::{RetryDecision, RetryPolicy};
use crate::breaker::{BreakerKey, CircuitBreaker, NoopBreaker};
use crate::context::OpContext;
use crate::error::{BreakerOpen, ContextError};

/// Runs `op` under `policy` without a circuit breaker.
///
/// See [`execute_with_breaker`] for the full contract.
pub async fn execute<T, E, F, Fut>(
    ctx: &OpContext,
    op: F,
    name: &str,
    policy: &RetryPolicy<E>,
) -> Result<T, E>
where
    F: FnMut(OpContext) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ContextError> + From<BreakerOpen> + Display,
{
    execute_with_breaker(ctx, op, name, policy, &NoopBreaker).await
}

/// Runs `op` until it succeeds or the retry policy says to stop.
///
/// Attempts are strictly sequential. Each attempt and each backoff sleep
/// races `ctx`; once the context is done its error is returned as-is and
/// nothing is retried. An error the policy rejects is returned unchanged,
/// and when the attempt budget runs out the last error is returned.
///
/// `name` scopes the breaker (through [`BreakerKey`]) and the log events.
/// It never affects retry decisions. `op` must be idempotent.
///
/// Every admitted attempt is reported to the breaker exactly once: success,
/// transient failure, or ignored (terminal error or done context).
pub async fn execute_with_breaker<T, E, F, Fut>(
    ctx: &OpContext,
    mut op: F,
    name: &str,
    policy: &RetryPolicy<E>,
    breaker: &dyn CircuitBreaker,
) -> Result<T, E>
where
    F: FnMut(OpContext) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: From<ContextError> + From<BreakerOpen> + Display,
{
    let key = BreakerKey::new(name);
    let mut attempt = 1u32;
    loop {
        if let Some(e) = ctx.err() {
            return Err(e.into());
        }
        breaker.admit(&key)?;

        let outcome = tokio::select! {
            biased;
            e = ctx.done() => {
                breaker.on_ignored(&key);
                return Err(e.into());
            }
            r = op(ctx.clone()) => r,
        };

        let err = match outcome {
            Ok(value) => {
                breaker.on_success(&key);
                if attempt > 1 {
                    debug!(operation = name, attempts = attempt, "operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) => err,
        };

        if ctx.is_done() {
            breaker.on_ignored(&key);
            return Err(err);
        }

        match policy.decide(attempt, &err) {
            RetryDecision::NoRetry => {
                breaker.on_ignored(&key);
                debug!(operation = name, attempt, error = %err, "non-retryable error");
                return Err(err);
            }
            RetryDecision::Exhausted => {
                breaker.on_failure(&key);
                warn!(operation = name, attempts = attempt, error = %err, "retry budget exhausted");
                return Err(err);
            }
            RetryDecision::RetryAfter(delay) => {
                breaker.on_failure(&key);
                warn!(
                    operation = name,
                    attempt,
                    backoff_ms = delay.as_millis() as u64,
                    error = %err,
                    "transient error, retrying"
                );
                tokio::select! {
                    biased;
                    e = ctx.done() => return Err(e.into()),
                    _ = tokio::time::sleep(delay) => {}
                }
                attempt += 1;
            }
        }
    }
}
