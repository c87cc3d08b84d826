//! PostgreSQL failure classification.

use std::borrow::Cow;

use super::{mentions_any, ErrorClass, CONNECTION_PHRASES};
use crate::error::DataError;

/// SQLSTATE codes worth another attempt: contention, capacity, connection
/// loss, server restarts, and internal errors.
///
/// 08007 (transaction_resolution_unknown) and 08P01 (protocol_violation) are
/// left out: the commit may already have applied, or the client is broken.
const RETRYABLE_SQLSTATES: &[&str] = &[
    "40001", // serialization_failure
    "40P01", // deadlock_detected
    "55P03", // lock_not_available
    "53000", // insufficient_resources
    "53300", // too_many_connections
    "53400", // configuration_limit_exceeded
    "08000", // connection_exception
    "08001", // sqlclient_unable_to_establish_sqlconnection
    "08003", // connection_does_not_exist
    "08004", // sqlserver_rejected_establishment_of_sqlconnection
    "08006", // connection_failure
    "57P01", // admin_shutdown
    "57P02", // crash_shutdown
    "57P03", // cannot_connect_now
    "58000", // system_error
    "XX000", // internal_error
];

/// What the relational classifier needs to know about a failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PgFault<'a> {
    /// Caller cancellation or deadline expiry.
    Cancelled,
    /// Refused locally before reaching the server (open breaker).
    Rejected,
    /// Structured SQLSTATE reported by the server.
    Code(Cow<'a, str>),
    /// Anything without a code: transport errors, pool errors, wrappers.
    Message(Cow<'a, str>),
}

impl<'a> PgFault<'a> {
    pub fn from_error(err: &'a DataError) -> Self {
        match err {
            DataError::Cancelled | DataError::DeadlineExceeded => PgFault::Cancelled,
            DataError::BreakerOpen { .. } => PgFault::Rejected,
            DataError::Wrapped { source, .. } => PgFault::from_error(source),
            DataError::Database(e) => PgFault::from_sqlx(e),
            other => PgFault::Message(Cow::Owned(other.to_string())),
        }
    }

    pub fn from_sqlx(err: &'a sqlx::Error) -> Self {
        match err {
            sqlx::Error::Database(db) => match db.code() {
                Some(code) => PgFault::Code(code),
                None => PgFault::Message(Cow::Borrowed(db.message())),
            },
            other => PgFault::Message(Cow::Owned(other.to_string())),
        }
    }
}

/// Classify a relational fault.
///
/// A SQLSTATE is authoritative: codes outside the retryable table are
/// terminal, including disk full (53100), out of memory (53200), and the
/// data (22), integrity (23), and syntax/access (42) classes. Only uncoded
/// failures fall back to message matching, and unmatched messages are
/// terminal.
pub fn classify_pg_fault(fault: &PgFault<'_>) -> ErrorClass {
    match fault {
        PgFault::Cancelled => ErrorClass::Cancelled,
        PgFault::Rejected => ErrorClass::Terminal,
        PgFault::Code(code) => {
            if RETRYABLE_SQLSTATES
                .iter()
                .any(|c| c.eq_ignore_ascii_case(code))
            {
                ErrorClass::Retryable
            } else {
                ErrorClass::Terminal
            }
        }
        PgFault::Message(msg) => {
            if mentions_any(msg, CONNECTION_PHRASES) {
                ErrorClass::Retryable
            } else {
                ErrorClass::Terminal
            }
        }
    }
}

pub fn classify_pg(err: &DataError) -> ErrorClass {
    classify_pg_fault(&PgFault::from_error(err))
}

/// Retry checker for relational operations.
pub fn pg_is_retryable(err: &DataError) -> bool {
    classify_pg(err).is_retryable()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ContextError;
    use std::io;

    fn code(c: &str) -> ErrorClass {
        classify_pg_fault(&PgFault::Code(Cow::Borrowed(c)))
    }

    fn message(m: &str) -> ErrorClass {
        classify_pg_fault(&PgFault::Message(Cow::Borrowed(m)))
    }

    #[test]
    fn transient_sqlstates_are_retryable() {
        for c in [
            "40001", "40P01", "55P03", "53000", "53300", "53400", "08000", "08003", "08006",
            "57P01", "57P02", "57P03", "58000", "XX000",
        ] {
            assert_eq!(code(c), ErrorClass::Retryable, "sqlstate {c}");
        }
    }

    #[test]
    fn business_and_resource_sqlstates_are_terminal() {
        for c in [
            "53100", "53200", "23000", "23001", "23502", "23503", "23505", "23514", "22000",
            "22001", "22003", "22007", "22012", "42000", "42601", "42703", "42804", "42P01",
        ] {
            assert_eq!(code(c), ErrorClass::Terminal, "sqlstate {c}");
        }
    }

    #[test]
    fn unlisted_sqlstate_is_terminal_even_with_transient_looking_text() {
        // 57014 is query_canceled, raised by statement_timeout.
        assert_eq!(code("57014"), ErrorClass::Terminal);
    }

    #[test]
    fn ambiguous_connection_states_are_terminal() {
        assert_eq!(code("08007"), ErrorClass::Terminal);
        assert_eq!(code("08P01"), ErrorClass::Terminal);
        assert_eq!(code("08006"), ErrorClass::Retryable);
    }

    #[test]
    fn sqlstate_match_ignores_case() {
        assert_eq!(code("40p01"), ErrorClass::Retryable);
        assert_eq!(code("xx000"), ErrorClass::Retryable);
    }

    #[test]
    fn network_messages_are_retryable() {
        for m in [
            "dial tcp 10.0.0.5:5432: connection refused",
            "read: connection reset by peer",
            "write: broken pipe",
            "lookup db.internal: no such host",
            "connect: network is unreachable",
            "i/o timeout",
            "FATAL: sorry, too many connections for role",
            "server closed the connection unexpectedly",
            "Temporary failure in name resolution",
        ] {
            assert_eq!(message(m), ErrorClass::Retryable, "message {m:?}");
        }
    }

    #[test]
    fn message_match_ignores_case() {
        assert_eq!(message("CONNECTION REFUSED"), ErrorClass::Retryable);
        assert_eq!(message("Broken Pipe"), ErrorClass::Retryable);
    }

    #[test]
    fn unknown_message_is_not_retried() {
        assert_eq!(message("something odd happened"), ErrorClass::Terminal);
    }

    #[test]
    fn cancellation_is_never_retryable() {
        assert!(!pg_is_retryable(&DataError::from(ContextError::Cancelled)));
        assert!(!pg_is_retryable(&DataError::from(ContextError::DeadlineExceeded)));
        assert!(!pg_is_retryable(&DataError::Cancelled.wrap("insert payment")));
        assert_eq!(classify_pg(&DataError::Cancelled), ErrorClass::Cancelled);
    }

    #[test]
    fn sqlx_transport_errors_use_message_fallback() {
        let refused = DataError::Database(sqlx::Error::Io(io::Error::new(
            io::ErrorKind::ConnectionRefused,
            "connection refused",
        )));
        assert!(pg_is_retryable(&refused));
        assert!(pg_is_retryable(&DataError::Database(sqlx::Error::PoolTimedOut)));
        assert!(!pg_is_retryable(&DataError::Database(sqlx::Error::PoolClosed)));
        assert!(!pg_is_retryable(&DataError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn wrapped_errors_classify_like_their_root() {
        let err = DataError::Database(sqlx::Error::PoolTimedOut).wrap("fetch account");
        assert!(pg_is_retryable(&err));
    }

    #[test]
    fn open_breaker_is_terminal() {
        let err = DataError::BreakerOpen {
            key: "db-query".to_string(),
        };
        assert_eq!(classify_pg(&err), ErrorClass::Terminal);
    }
}
