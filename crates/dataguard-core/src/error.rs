//! Error types shared by both stores and the retry executor.

use std::time::Duration;

/// Why an operation context stopped accepting work.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ContextError {
    /// The caller cancelled the context.
    #[error("operation cancelled")]
    Cancelled,
    /// The context deadline passed.
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

/// A circuit breaker refused to admit a call for `key`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("circuit breaker '{key}' is open")]
pub struct BreakerOpen {
    pub key: String,
}

/// Error returned by every store operation routed through this crate.
///
/// Cancellation and terminal errors are propagated unchanged; after a retry
/// budget runs out the last attempt's error is returned as-is, so an
/// exhausted retry looks the same as a failure that was never retried.
#[derive(Debug, thiserror::Error)]
pub enum DataError {
    #[error("operation cancelled")]
    Cancelled,

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error(transparent)]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Cache(#[from] redis::RedisError),

    /// The cache has no value for the key. A normal business outcome.
    #[error("cache: key not found")]
    CacheMiss,

    /// A client-side timeout around a single store command expired.
    #[error("{op} timeout after {after:?}")]
    Timeout { op: &'static str, after: Duration },

    #[error("circuit breaker '{key}' is open")]
    BreakerOpen { key: String },

    #[error("{context}: {source}")]
    Wrapped {
        context: String,
        #[source]
        source: Box<DataError>,
    },

    #[error("configuration: {0}")]
    Config(String),
}

impl DataError {
    /// Attach context while keeping the original error reachable for
    /// classification.
    pub fn wrap(self, context: impl Into<String>) -> Self {
        DataError::Wrapped {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// The innermost error beneath any `Wrapped` layers.
    pub fn root(&self) -> &DataError {
        let mut cur = self;
        while let DataError::Wrapped { source, .. } = cur {
            cur = source;
        }
        cur
    }

    /// True for caller cancellation and deadline expiry, at any wrapping depth.
    pub fn is_cancellation(&self) -> bool {
        matches!(self.root(), DataError::Cancelled | DataError::DeadlineExceeded)
    }
}

impl From<ContextError> for DataError {
    fn from(e: ContextError) -> Self {
        match e {
            ContextError::Cancelled => DataError::Cancelled,
            ContextError::DeadlineExceeded => DataError::DeadlineExceeded,
        }
    }
}

impl From<BreakerOpen> for DataError {
    fn from(e: BreakerOpen) -> Self {
        DataError::BreakerOpen { key: e.key }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrap_keeps_root_reachable() {
        let err = DataError::CacheMiss.wrap("load session").wrap("handler");
        assert!(matches!(err.root(), DataError::CacheMiss));
        assert_eq!(err.to_string(), "handler: load session: cache: key not found");
    }

    #[test]
    fn cancellation_detected_through_wrapping() {
        assert!(DataError::from(ContextError::Cancelled).is_cancellation());
        assert!(DataError::DeadlineExceeded.wrap("query").is_cancellation());
        assert!(!DataError::CacheMiss.is_cancellation());
    }

    #[test]
    fn timeout_display_mentions_timeout() {
        let err = DataError::Timeout {
            op: "cache read",
            after: Duration::from_secs(3),
        };
        assert_eq!(err.to_string(), "cache read timeout after 3s");
    }
}
