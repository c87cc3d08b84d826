//! Redis failure classification.

use std::borrow::Cow;

use super::{mentions_any, ErrorClass, CONNECTION_PHRASES};
use crate::error::DataError;

/// Replies that will fail the same way every time. Checked before the
/// transient list so e.g. `ERR unknown command 'ASKING'` stays terminal.
const TERMINAL_MARKERS: &[&str] = &[
    "wrongtype",
    "syntax error",
    "invalid argument",
    "wrong number of arguments",
    "noauth",
    "wrongpass",
    "noperm",
    "authentication",
    "unknown command",
    "execabort",
];

/// Server states that clear up on their own: dataset loading, busy scripts,
/// failover, and cluster resharding.
const TRANSIENT_MARKERS: &[&str] = &[
    "loading",
    "busy",
    "masterdown",
    "readonly",
    "noscript",
    "moved",
    "ask",
    "tryagain",
    "clusterdown",
];

/// What the cache classifier needs to know about a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheFault<'a> {
    /// Caller cancellation or deadline expiry.
    Cancelled,
    /// The key-absent sentinel.
    KeyNotFound,
    /// Refused locally before reaching the server (open breaker).
    Rejected,
    /// Server reply or transport error text, error code included when known.
    Message(Cow<'a, str>),
}

impl<'a> CacheFault<'a> {
    pub fn from_error(err: &'a DataError) -> Self {
        match err {
            DataError::Cancelled | DataError::DeadlineExceeded => CacheFault::Cancelled,
            DataError::CacheMiss => CacheFault::KeyNotFound,
            DataError::BreakerOpen { .. } => CacheFault::Rejected,
            DataError::Wrapped { source, .. } => CacheFault::from_error(source),
            DataError::Cache(e) => CacheFault::from_redis(e),
            other => CacheFault::Message(Cow::Owned(other.to_string())),
        }
    }

    pub fn from_redis(err: &redis::RedisError) -> Self {
        // The reply code (MOVED, LOADING, ...) is not always part of the
        // display text, so keep both.
        let text = match err.code() {
            Some(code) => format!("{code} {err}"),
            None => err.to_string(),
        };
        CacheFault::Message(Cow::Owned(text))
    }
}

/// Classify a cache fault. Unrecognized messages are retryable.
pub fn classify_cache_fault(fault: &CacheFault<'_>) -> ErrorClass {
    match fault {
        CacheFault::Cancelled => ErrorClass::Cancelled,
        CacheFault::KeyNotFound | CacheFault::Rejected => ErrorClass::Terminal,
        CacheFault::Message(msg) => {
            if mentions_any(msg, TERMINAL_MARKERS) {
                ErrorClass::Terminal
            } else if mentions_any(msg, CONNECTION_PHRASES) || mentions_any(msg, TRANSIENT_MARKERS) {
                ErrorClass::Retryable
            } else {
                tracing::trace!(error = %msg, "unrecognized cache error, treating as transient");
                ErrorClass::Retryable
            }
        }
    }
}

pub fn classify_cache(err: &DataError) -> ErrorClass {
    classify_cache_fault(&CacheFault::from_error(err))
}

/// Retry checker for cache operations.
pub fn cache_is_retryable(err: &DataError) -> bool {
    classify_cache(err).is_retryable()
}
