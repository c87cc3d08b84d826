//! Map raw store errors into retry verdicts.
//!
//! Each store gets a closed view of its errors (`PgFault`, `CacheFault`),
//! built once from a [`DataError`](crate::DataError) and then matched into an
//! [`ErrorClass`]. The executor only ever sees the resulting boolean.
//!
//! The stores disagree on unknown errors: the relational classifier never
//! retries what it does not recognize, since the failure may hide a
//! half-applied write. The cache classifier retries unknowns; its calls are
//! whole-value reads and writes.

mod cache;
mod postgres;

pub use cache::{cache_is_retryable, classify_cache, classify_cache_fault, CacheFault};
pub use postgres::{classify_pg, classify_pg_fault, pg_is_retryable, PgFault};

/// Outcome of classifying one failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorClass {
    /// Transient; expected to clear up on a later attempt.
    Retryable,
    /// Retrying cannot help (bad input, constraint violation, auth, resource exhaustion).
    Terminal,
    /// The caller gave up. Never retried.
    Cancelled,
}

impl ErrorClass {
    pub fn is_retryable(self) -> bool {
        matches!(self, ErrorClass::Retryable)
    }
}

/// Transport-level phrases shared by both stores.
pub(crate) const CONNECTION_PHRASES: &[&str] = &[
    "connection refused",
    "connection reset",
    "broken pipe",
    "no such host",
    "network is unreachable",
    "timeout",
    "timed out",
    "too many connections",
    "server closed",
    "temporary failure",
];

/// Case-insensitive substring test against a list of lowercase needles.
pub(crate) fn mentions_any(message: &str, needles: &[&str]) -> bool {
    let lower = message.to_lowercase();
    needles.iter().any(|n| lower.contains(n))
}
