//! Redis-backed cache store with per-command timeouts and retried operations.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use redis::aio::ConnectionManager;
use redis::{FromRedisValue, ToRedisArgs};
use tracing::info;

use crate::breaker::{select_breaker, CircuitBreaker, NoopBreaker};
use crate::config::{BreakerConfig, CacheConfig};
use crate::context::OpContext;
use crate::error::DataError;
use crate::retry::{execute_with_breaker, RetryPolicy};

/// Client-side bounds on cache calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheTimeouts {
    pub connect: Duration,
    pub read: Duration,
    pub write: Duration,
    /// Bound on a whole [`CacheStore::retryable_operation`], retries included.
    pub operation: Duration,
}

impl From<&CacheConfig> for CacheTimeouts {
    fn from(cfg: &CacheConfig) -> Self {
        Self {
            connect: cfg.connect_timeout(),
            read: cfg.read_timeout(),
            write: cfg.write_timeout(),
            operation: cfg.operation_timeout(),
        }
    }
}

/// Await `fut`, turning expiry of `after` into [`DataError::Timeout`].
async fn bounded<T, Fut>(op: &'static str, after: Duration, fut: Fut) -> Result<T, DataError>
where
    Fut: Future<Output = Result<T, DataError>>,
{
    tokio::time::timeout(after, fut)
        .await
        .map_err(|_| DataError::Timeout { op, after })?
}

/// Retry loop bounded as a whole by `limit`.
async fn run_bounded<T, F, Fut>(
    ctx: &OpContext,
    limit: Duration,
    name: &str,
    policy: &RetryPolicy<DataError>,
    breaker: &dyn CircuitBreaker,
    op: F,
) -> Result<T, DataError>
where
    F: FnMut(OpContext) -> Fut,
    Fut: Future<Output = Result<T, DataError>>,
{
    let op_ctx = ctx.with_timeout(limit);
    execute_with_breaker(&op_ctx, op, name, policy, breaker).await
}

/// TTL in whole milliseconds for `SET .. PX`: at least 1, saturating at `u64::MAX`.
fn ttl_millis(ttl: Duration) -> u64 {
    u64::try_from(ttl.as_millis()).unwrap_or(u64::MAX).max(1)
}

#[derive(Clone)]
pub struct CacheStore {
    conn: ConnectionManager,
    policy: RetryPolicy<DataError>,
    breaker: Arc<dyn CircuitBreaker>,
    timeouts: CacheTimeouts,
}

impl CacheStore {
    /// Connect to the server in `cfg` within its connect timeout.
    pub async fn connect(
        cfg: &CacheConfig,
        breaker_cfg: &BreakerConfig,
        breaker: Option<Arc<dyn CircuitBreaker>>,
    ) -> Result<Self, DataError> {
        let url = cfg.url()?;
        let timeouts = CacheTimeouts::from(cfg);
        let client = redis::Client::open(url.as_str())?;
        let conn = bounded("cache connect", timeouts.connect, async {
            Ok(ConnectionManager::new(client).await?)
        })
        .await
        .map_err(|e| e.wrap(format!("connecting cache at {}:{}", cfg.host, cfg.port)))?;
        info!(host = %cfg.host, port = cfg.port, db = cfg.db, "connected cache");
        Ok(Self {
            conn,
            policy: cfg.retry_policy(),
            breaker: select_breaker(breaker_cfg, breaker),
            timeouts,
        })
    }

    /// Wrap an existing connection with the conservative cache policy and no breaker.
    pub fn from_connection(conn: ConnectionManager, timeouts: CacheTimeouts) -> Self {
        Self {
            conn,
            policy: RetryPolicy::cache(Default::default()),
            breaker: Arc::new(NoopBreaker),
            timeouts,
        }
    }

    pub fn with_policy(mut self, policy: RetryPolicy<DataError>) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_breaker(mut self, breaker: Arc<dyn CircuitBreaker>) -> Self {
        self.breaker = breaker;
        self
    }

    pub fn timeouts(&self) -> CacheTimeouts {
        self.timeouts
    }

    /// Value at `key`; a missing key is [`DataError::CacheMiss`].
    pub async fn get<T: FromRedisValue>(&self, key: &str) -> Result<T, DataError> {
        let mut conn = self.conn.clone();
        let value: Option<T> = bounded("cache read", self.timeouts.read, async {
            Ok(redis::cmd("GET").arg(key).query_async(&mut conn).await?)
        })
        .await?;
        value.ok_or(DataError::CacheMiss)
    }

    /// Store `value` at `key`, expiring after `ttl` when given.
    pub async fn set<V: ToRedisArgs>(
        &self,
        key: &str,
        value: V,
        ttl: Option<Duration>,
    ) -> Result<(), DataError> {
        let mut cmd = redis::cmd("SET");
        cmd.arg(key).arg(value);
        if let Some(ttl) = ttl {
            cmd.arg("PX").arg(ttl_millis(ttl));
        }
        let mut conn = self.conn.clone();
        bounded("cache write", self.timeouts.write, async {
            let () = cmd.query_async(&mut conn).await?;
            Ok(())
        })
        .await
    }

    /// Remove `key`. Returns whether it existed.
    pub async fn delete(&self, key: &str) -> Result<bool, DataError> {
        let mut conn = self.conn.clone();
        let removed: u64 = bounded("cache write", self.timeouts.write, async {
            Ok(redis::cmd("DEL").arg(key).query_async(&mut conn).await?)
        })
        .await?;
        Ok(removed > 0)
    }

    pub async fn ping(&self) -> Result<(), DataError> {
        let mut conn = self.conn.clone();
        let _: String = bounded("cache read", self.timeouts.read, async {
            Ok(redis::cmd("PING").query_async(&mut conn).await?)
        })
        .await?;
        Ok(())
    }

    /// Run `op` under the cache retry policy and breaker, bounded overall
    /// by the operation timeout.
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
        run_bounded(
            ctx,
            self.timeouts.operation,
            name,
            &self.policy,
            self.breaker.as_ref(),
            op,
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::retry::{cache_is_retryable, RetryPreset};
    use std::cell::Cell;

    #[test]
    fn timeouts_come_from_config() {
        let cfg = CacheConfig {
            read_timeout_secs: 1,
            operation_timeout_secs: 9,
            ..CacheConfig::default()
        };
        let t = CacheTimeouts::from(&cfg);
        assert_eq!(t.connect, Duration::from_secs(5));
        assert_eq!(t.read, Duration::from_secs(1));
        assert_eq!(t.write, Duration::from_secs(3));
        assert_eq!(t.operation, Duration::from_secs(9));
    }

    #[test]
    fn ttl_is_whole_millis_at_least_one() {
        assert_eq!(ttl_millis(Duration::from_secs(2)), 2_000);
        assert_eq!(ttl_millis(Duration::from_micros(10)), 1);
        assert_eq!(ttl_millis(Duration::MAX), u64::MAX);
    }

    #[tokio::test(start_paused = true)]
    async fn slow_command_becomes_retryable_timeout() {
        let err = bounded("cache read", Duration::from_secs(3), async {
            tokio::time::sleep(Duration::from_secs(10)).await;
            Ok::<_, DataError>(())
        })
        .await
        .unwrap_err();
        assert!(matches!(err, DataError::Timeout { op: "cache read", .. }));
        assert!(cache_is_retryable(&err));
    }

    #[tokio::test(start_paused = true)]
    async fn transient_failures_are_retried_until_success() {
        let calls = Cell::new(0);
        let out = run_bounded(
            &OpContext::new(),
            Duration::from_secs(5),
            "get session",
            &RetryPolicy::cache(RetryPreset::Conservative),
            &NoopBreaker,
            |_ctx| {
                calls.set(calls.get() + 1);
                let n = calls.get();
                async move {
                    if n < 3 {
                        Err(DataError::Timeout {
                            op: "cache read",
                            after: Duration::from_secs(3),
                        })
                    } else {
                        Ok("alice")
                    }
                }
            },
        )
        .await
        .unwrap();
        assert_eq!(out, "alice");
        assert_eq!(calls.get(), 3);
    }

    #[tokio::test]
    async fn cache_miss_is_returned_without_retry() {
        let calls = Cell::new(0);
        let err = run_bounded(
            &OpContext::new(),
            Duration::from_secs(5),
            "get session",
            &RetryPolicy::cache(RetryPreset::Aggressive),
            &NoopBreaker,
            |_ctx| {
                calls.set(calls.get() + 1);
                async { Err::<(), _>(DataError::CacheMiss) }
            },
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DataError::CacheMiss));
        assert_eq!(calls.get(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn operation_timeout_bounds_all_retries() {
        let err = run_bounded(
            &OpContext::new(),
            Duration::from_millis(100),
            "hung get",
            &RetryPolicy::cache(RetryPreset::Aggressive),
            &NoopBreaker,
            |_ctx| std::future::pending::<Result<(), DataError>>(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, DataError::DeadlineExceeded));
    }

    #[tokio::test]
    async fn connect_to_closed_port_fails() {
        let cfg = CacheConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
            connect_timeout_secs: 2,
            ..CacheConfig::default()
        };
        let err = CacheStore::connect(&cfg, &BreakerConfig::default(), None)
            .await
            .err()
            .unwrap();
        assert!(err.to_string().starts_with("connecting cache at 127.0.0.1:1"));
    }
}
