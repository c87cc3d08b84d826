//! `dataguard classify` – classify a SQLSTATE code or error message.

use std::borrow::Cow;

use anyhow::Result;
use dataguard_core::retry::classify::{
    classify_cache_fault, classify_pg_fault, CacheFault, PgFault,
};
use dataguard_core::ErrorClass;

use crate::cli::Store;

/// Five ASCII digits or uppercase letters, e.g. `40001` or `08P01`.
fn looks_like_sqlstate(input: &str) -> bool {
    input.len() == 5
        && input
            .bytes()
            .all(|b| b.is_ascii_digit() || b.is_ascii_uppercase())
}

fn classify(store: Store, input: &str, force_message: bool) -> ErrorClass {
    match store {
        Store::Pg if !force_message && looks_like_sqlstate(input) => {
            classify_pg_fault(&PgFault::Code(Cow::Borrowed(input)))
        }
        Store::Pg => classify_pg_fault(&PgFault::Message(Cow::Borrowed(input))),
        Store::Cache => classify_cache_fault(&CacheFault::Message(Cow::Borrowed(input))),
    }
}

pub fn run_classify(store: Store, input: &str, force_message: bool) -> Result<()> {
    let label = match classify(store, input, force_message) {
        ErrorClass::Retryable => "retryable",
        ErrorClass::Terminal => "terminal",
        ErrorClass::Cancelled => "cancelled",
    };
    println!("{label}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sqlstate_detection() {
        assert!(looks_like_sqlstate("40001"));
        assert!(looks_like_sqlstate("08P01"));
        assert!(!looks_like_sqlstate("4000"));
        assert!(!looks_like_sqlstate("too many connections"));
    }

    #[test]
    fn pg_codes_and_messages() {
        assert_eq!(classify(Store::Pg, "40001", false), ErrorClass::Retryable);
        assert_eq!(classify(Store::Pg, "23505", false), ErrorClass::Terminal);
        assert_eq!(
            classify(Store::Pg, "connection refused", false),
            ErrorClass::Retryable
        );
    }

    #[test]
    fn cache_messages() {
        assert_eq!(
            classify(Store::Cache, "WRONGTYPE Operation against a key", false),
            ErrorClass::Terminal
        );
        assert_eq!(classify(Store::Cache, "LOADING", false), ErrorClass::Retryable);
    }
}
