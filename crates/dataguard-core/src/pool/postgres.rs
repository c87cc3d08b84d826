//! PostgreSQL pool construction.

use sqlx::postgres::{PgPool, PgPoolOptions};
use std::future::Future;
use tracing::{info, warn};

use super::timeout::{resolve_query_timeout, StatementTimeout};
use super::{PoolHandle, PoolManager};
use crate::config::DatabaseConfig;
use crate::error::DataError;

impl PoolHandle for PgPool {
    fn close(&self) -> impl Future<Output = ()> + Send + '_ {
        sqlx::Pool::close(self)
    }
}

/// Pool options shared by the primary and every replica.
pub fn pool_options(cfg: &DatabaseConfig, timeout: StatementTimeout) -> PgPoolOptions {
    timeout.install(
        PgPoolOptions::new()
            .max_connections(cfg.max_connections.max(1))
            .min_connections(cfg.min_connections.min(cfg.max_connections))
            .acquire_timeout(cfg.connect_timeout()),
    )
}

fn statement_timeout(cfg: &DatabaseConfig) -> StatementTimeout {
    StatementTimeout::from_secs(resolve_query_timeout(&[cfg.query_timeout_secs]))
}

/// Connect the primary and all replicas.
///
/// The primary must connect. A replica that fails is logged and skipped, so
/// reads fall back to the remaining replicas or the primary.
pub async fn connect_pools(cfg: &DatabaseConfig) -> Result<PoolManager<PgPool>, DataError> {
    let timeout = statement_timeout(cfg);
    let primary = pool_options(cfg, timeout)
        .connect_with(cfg.connect_options()?)
        .await
        .map_err(|e| DataError::from(e).wrap("connecting primary database"))?;
    info!(
        dsn = %cfg.dsn_redacted(),
        statement_timeout_ms = timeout.millis(),
        "connected primary pool"
    );

    let mut replicas = Vec::with_capacity(cfg.replicas.len());
    for replica in &cfg.replicas {
        let opts = cfg.replica_connect_options(replica)?;
        match pool_options(cfg, timeout).connect_with(opts).await {
            Ok(pool) => {
                info!(host = %replica.host, port = replica.port, "connected replica pool");
                replicas.push(pool);
            }
            Err(e) => {
                warn!(host = %replica.host, port = replica.port, error = %e, "replica unavailable, skipping");
            }
        }
    }
    Ok(PoolManager::new(Some(primary), replicas))
}

/// Build pools without connecting; connections open on first use.
pub fn lazy_pools(cfg: &DatabaseConfig) -> Result<PoolManager<PgPool>, DataError> {
    let timeout = statement_timeout(cfg);
    let primary = pool_options(cfg, timeout).connect_lazy_with(cfg.connect_options()?);
    let replicas = cfg
        .replicas
        .iter()
        .map(|r| Ok(pool_options(cfg, timeout).connect_lazy_with(cfg.replica_connect_options(r)?)))
        .collect::<Result<Vec<_>, DataError>>()?;
    Ok(PoolManager::new(Some(primary), replicas))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ReplicaConfig;

    fn cfg_with_replicas(n: usize) -> DatabaseConfig {
        DatabaseConfig {
            replicas: (0..n)
                .map(|i| ReplicaConfig {
                    host: format!("replica-{i}"),
                    port: 5432,
                })
                .collect(),
            min_connections: 0,
            ..DatabaseConfig::default()
        }
    }

    #[tokio::test]
    async fn lazy_pools_match_config_topology() {
        let pools = lazy_pools(&cfg_with_replicas(2)).unwrap();
        assert!(pools.primary().is_some());
        assert_eq!(pools.replicas().len(), 2);
        pools.close().await;
        assert!(pools.primary().unwrap().is_closed());
        pools.close().await;
    }

    #[tokio::test]
    async fn lazy_pools_reject_bad_sslmode() {
        let cfg = DatabaseConfig {
            sslmode: "bogus".to_string(),
            ..DatabaseConfig::default()
        };
        assert!(matches!(lazy_pools(&cfg), Err(DataError::Config(_))));
    }

    #[test]
    fn pool_options_clamp_min_to_max() {
        let cfg = DatabaseConfig {
            max_connections: 4,
            min_connections: 10,
            ..DatabaseConfig::default()
        };
        let opts = pool_options(&cfg, StatementTimeout::from_secs(5));
        assert_eq!(opts.get_max_connections(), 4);
        assert_eq!(opts.get_min_connections(), 4);
    }
}
