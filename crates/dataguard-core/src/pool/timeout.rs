//! Per-statement timeout applied to every pooled connection.

use sqlx::postgres::{PgConnection, PgPoolOptions};
use sqlx::Executor;

/// Statement timeout used when no positive override is configured.
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

/// Largest `statement_timeout` PostgreSQL accepts (an `int`, in ms).
pub const MAX_STATEMENT_TIMEOUT_MS: u64 = i32::MAX as u64;

/// First strictly positive candidate, else [`DEFAULT_QUERY_TIMEOUT_SECS`].
pub fn resolve_query_timeout(overrides: &[u64]) -> u64 {
    resolve_query_timeout_or(overrides, DEFAULT_QUERY_TIMEOUT_SECS)
}

/// First strictly positive candidate, else `fallback`.
pub fn resolve_query_timeout_or(overrides: &[u64], fallback: u64) -> u64 {
    overrides
        .iter()
        .copied()
        .find(|&secs| secs > 0)
        .unwrap_or(fallback)
}

/// Server-side ceiling on a single statement's execution time.
///
/// Installed as a connect callback so it holds for every connection the pool
/// ever opens, including reconnects, independent of any retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatementTimeout {
    timeout_secs: u64,
}

impl StatementTimeout {
    pub fn from_secs(timeout_secs: u64) -> Self {
        Self { timeout_secs }
    }

    pub fn secs(&self) -> u64 {
        self.timeout_secs
    }

    /// The value PostgreSQL expects, in milliseconds, clamped to
    /// [`MAX_STATEMENT_TIMEOUT_MS`].
    pub fn millis(&self) -> u64 {
        self.timeout_secs
            .saturating_mul(1000)
            .min(MAX_STATEMENT_TIMEOUT_MS)
    }

    pub fn sql(&self) -> String {
        format!("SET statement_timeout = {}", self.millis())
    }

    /// Run the `SET` on a freshly established connection.
    pub async fn apply(self, conn: &mut PgConnection) -> Result<(), sqlx::Error> {
        conn.execute(self.sql().as_str()).await?;
        Ok(())
    }

    /// Register this timeout as the pool's after-connect callback.
    pub fn install(self, options: PgPoolOptions) -> PgPoolOptions {
        options.after_connect(move |conn, _meta| Box::pin(async move { self.apply(conn).await }))
    }
}
