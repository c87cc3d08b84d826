//! Relational store facade: pools, statement timeout, retry policy and
//! breaker wired together.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use sqlx::postgres::PgPool;
use tracing::info;

use crate::breaker::{select_breaker, CircuitBreaker, NoopBreaker};
use crate::config::{BreakerConfig, DatabaseConfig};
use crate::context::OpContext;
use crate::error::DataError;
use crate::pool::{connect_pools, resolve_query_timeout, resolve_query_timeout_or, PoolManager};
use crate::retry::{execute_with_breaker, RetryPolicy};

pub struct Database {
    pools: PoolManager<PgPool>,
    policy: RetryPolicy<DataError>,
    breaker: Arc<dyn CircuitBreaker>,
    query_timeout_secs: u64,
}

impl Database {
    /// Connect the primary and replicas described by `cfg`.
    pub async fn connect(
        cfg: &DatabaseConfig,
        breaker_cfg: &BreakerConfig,
        breaker: Option<Arc<dyn CircuitBreaker>>,
    ) -> Result<Self, DataError> {
        let pools = connect_pools(cfg).await?;
        info!(replicas = pools.replicas().len(), "database ready");
        Ok(Self {
            pools,
            policy: cfg.retry_policy(),
            breaker: select_breaker(breaker_cfg, breaker),
            query_timeout_secs: resolve_query_timeout(&[cfg.query_timeout_secs]),
        })
    }

    /// Wrap pools the caller built. No breaker; use [`Database::with_breaker`].
    pub fn from_pools(pools: PoolManager<PgPool>, policy: RetryPolicy<DataError>) -> Self {
        Self {
            pools,
            policy,
            breaker: Arc::new(NoopBreaker),
            query_timeout_secs: resolve_query_timeout(&[]),
        }
    }

    pub fn with_breaker(mut self, breaker: Arc<dyn CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn with_query_timeout(mut self, secs: u64) -> Self {
        self.query_timeout_secs = resolve_query_timeout(&[secs]);
        self
    }

    /// The primary pool for writes, `None` only for pools built without one.
    pub fn primary(&self) -> Option<&PgPool> {
        self.pools.primary()
    }

    /// A read pool chosen round-robin, or the primary when there are no replicas.
    pub fn replica(&self) -> Option<&PgPool> {
        self.pools.replica()
    }

    pub fn pools(&self) -> &PoolManager<PgPool> {
        &self.pools
    }

    pub fn policy(&self) -> &RetryPolicy<DataError> {
        &self.policy
    }

    pub fn query_timeout(&self) -> Duration {
        Duration::from_secs(self.query_timeout_secs)
    }

    /// Child of `ctx` bounded by the first positive timeout among `overrides`
    /// and the configured query timeout.
    pub fn query_context(&self, ctx: &OpContext, overrides: &[u64]) -> OpContext {
        let secs = resolve_query_timeout_or(overrides, self.query_timeout_secs);
        ctx.with_timeout(Duration::from_secs(secs))
    }

    /// Run `op` under the database retry policy and breaker.
    pub async fn retryable_operation<T, F, Fut>(
        &self,
        ctx: &OpContext,
        name: &str,
        op: F,
    ) -> Result<T, DataError>
    where
        F: FnMut(OpContext) -> Fut,
        Fut: Future<Output = Result<T, DataError>>,
    {
        execute_with_breaker(ctx, op, name, &self.policy, self.breaker.as_ref()).await
    }

    /// `SELECT 1` against the primary and every replica.
    pub async fn ping(&self, ctx: &OpContext) -> Result<(), DataError> {
        let primary = self
            .pools
            .primary()
            .ok_or_else(|| DataError::Config("no primary pool".to_string()))?;
        let targets = std::iter::once(("primary", primary))
            .chain(self.pools.replicas().iter().map(|p| ("replica", p)));
        for (role, pool) in targets {
            self.retryable_operation(ctx, "db ping", |_ctx| async move {
                sqlx::query("SELECT 1").execute(pool).await?;
                Ok(())
            })
            .await
            .map_err(|e| e.wrap(format!("ping {role}")))?;
        }
        Ok(())
    }

    pub async fn close(&self) {
        self.pools.close().await;
    }
}
