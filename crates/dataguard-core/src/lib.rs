//! Resilient data access for PostgreSQL and Redis: failure classification,
//! cancellable retries with exponential backoff, a circuit-breaker seam,
//! and a primary/replica pool manager.

pub mod breaker;
pub mod cache;
pub mod config;
pub mod context;
pub mod database;
pub mod error;
pub mod logging;
pub mod pool;
pub mod retry;

pub use breaker::{sanitize_breaker_name, BreakerKey, CircuitBreaker, NoopBreaker};
pub use cache::CacheStore;
pub use context::OpContext;
pub use database::Database;
pub use error::{BreakerOpen, ContextError, DataError};
pub use retry::{execute, execute_with_breaker, ErrorClass, RetryPolicy, RetryPreset};
