//! `dataguard ping` – connect to the configured stores and check them.

use std::time::Duration;

use anyhow::{Context, Result};
use dataguard_core::config::DataguardConfig;
use dataguard_core::{CacheStore, Database, OpContext};

pub async fn run_ping(
    cfg: &DataguardConfig,
    timeout_secs: u64,
    database: bool,
    cache: bool,
) -> Result<()> {
    let ctx = OpContext::new().with_timeout(Duration::from_secs(timeout_secs.max(1)));

    if database {
        let db = Database::connect(&cfg.database, &cfg.breaker, None)
            .await
            .context("database connect")?;
        let result = db.ping(&ctx).await;
        db.close().await;
        result.context("database ping")?;
        println!(
            "database: ok (primary + {} replica(s))",
            db.pools().replicas().len()
        );
    }

    if cache {
        let store = CacheStore::connect(&cfg.cache, &cfg.breaker, None)
            .await
            .context("cache connect")?;
        store
            .retryable_operation(&ctx, "cache ping", |_ctx| {
                let store = store.clone();
                async move { store.ping().await }
            })
            .await
            .context("cache ping")?;
        println!("cache: ok ({}:{})", cfg.cache.host, cfg.cache.port);
    }

    Ok(())
}
