//! Primary/replica pool routing.
//!
//! A [`PoolManager`] owns one primary handle and zero or more replica
//! handles. Writes and read-after-write go to [`PoolManager::primary`];
//! read-only queries go to [`PoolManager::replica`], which cycles through the
//! replicas and falls back to the primary when there are none.

mod postgres;
mod timeout;

use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};

pub use postgres::{connect_pools, lazy_pools, pool_options};
pub use timeout::{
    resolve_query_timeout, resolve_query_timeout_or, StatementTimeout,
    DEFAULT_QUERY_TIMEOUT_SECS, MAX_STATEMENT_TIMEOUT_MS,
};

/// A connection pool the manager can shut down.
pub trait PoolHandle: Send + Sync {
    /// Close the pool. Must be safe to call more than once.
    fn close(&self) -> impl Future<Output = ()> + Send + '_;
}

/// Primary pool plus read replicas with a round-robin read cursor.
///
/// The cursor is the only shared mutable state; it is a per-manager atomic,
/// so independently built managers never affect each other.
#[derive(Debug)]
pub struct PoolManager<H> {
    primary: Option<H>,
    replicas: Vec<H>,
    cursor: AtomicUsize,
}

impl<H> PoolManager<H> {
    pub fn new(primary: Option<H>, replicas: Vec<H>) -> Self {
        Self {
            primary,
            replicas,
            cursor: AtomicUsize::new(0),
        }
    }

    /// The primary pool. `None` means the store is unavailable; callers must
    /// handle that rather than assume a pool.
    pub fn primary(&self) -> Option<&H> {
        self.primary.as_ref()
    }

    /// Next replica in round-robin order, or the primary when no replicas
    /// are configured.
    ///
    /// Concurrent callers each get a distinct cursor value, so load spreads
    /// evenly; strict fairness across wraparound is not guaranteed.
    pub fn replica(&self) -> Option<&H> {
        if self.replicas.is_empty() {
            return self.primary();
        }
        let n = self.cursor.fetch_add(1, Ordering::Relaxed);
        self.replicas.get(n % self.replicas.len())
    }

    pub fn replicas(&self) -> &[H] {
        &self.replicas
    }
}

impl<H: PoolHandle> PoolManager<H> {
    /// Close the primary and every replica. Safe with no pools and on
    /// repeated calls.
    pub async fn close(&self) {
        if let Some(primary) = &self.primary {
            primary.close().await;
        }
        for replica in &self.replicas {
            replica.close().await;
        }
        tracing::info!(
            primary = self.primary.is_some(),
            replicas = self.replicas.len(),
            "connection pools closed"
        );
    }
}
