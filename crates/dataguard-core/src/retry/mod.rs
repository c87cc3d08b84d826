//! Retry and backoff policy.
//!
//! This module encapsulates failure classification for both stores and
//! exponential backoff decisions so that every store call shares one
//! consistent, cancellable retry loop.

pub mod classify;
mod policy;
mod run;

pub use classify::{cache_is_retryable, pg_is_retryable, ErrorClass};
pub use policy::{RetryDecision, RetryPolicy, RetryPreset, RetryableChecker};
pub use run::{execute, execute_with_breaker};
