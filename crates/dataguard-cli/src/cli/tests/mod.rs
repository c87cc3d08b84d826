//! CLI parse tests.

use super::{Cli, CliCommand, Store};
use clap::Parser;

fn parse(args: &[&str]) -> CliCommand {
    let cli = Cli::try_parse_from(args).unwrap();
    cli.command
}

#[test]
fn cli_parse_config() {
    match parse(&["dataguard", "config"]) {
        CliCommand::Config => {}
        _ => panic!("expected Config"),
    }
}

#[test]
fn cli_parse_classify_pg() {
    match parse(&["dataguard", "classify", "pg", "40001"]) {
        CliCommand::Classify {
            store,
            input,
            message,
        } => {
            assert_eq!(store, Store::Pg);
            assert_eq!(input, "40001");
            assert!(!message);
        }
        _ => panic!("expected Classify"),
    }
}

#[test]
fn cli_parse_classify_cache_message() {
    match parse(&["dataguard", "classify", "cache", "--message", "LOADING dataset"]) {
        CliCommand::Classify {
            store,
            input,
            message,
        } => {
            assert_eq!(store, Store::Cache);
            assert_eq!(input, "LOADING dataset");
            assert!(message);
        }
        _ => panic!("expected Classify"),
    }
}

#[test]
fn cli_parse_classify_rejects_unknown_store() {
    assert!(Cli::try_parse_from(["dataguard", "classify", "mysql", "x"]).is_err());
}

#[test]
fn cli_parse_breaker_key() {
    match parse(&["dataguard", "breaker-key", "Load User"]) {
        CliCommand::BreakerKey { name } => assert_eq!(name, "Load User"),
        _ => panic!("expected BreakerKey"),
    }
}

#[test]
fn cli_parse_ping_defaults() {
    match parse(&["dataguard", "ping"]) {
        CliCommand::Ping {
            timeout,
            no_database,
            no_cache,
        } => {
            assert_eq!(timeout, 10);
            assert!(!no_database);
            assert!(!no_cache);
        }
        _ => panic!("expected Ping"),
    }
}

#[test]
fn cli_parse_ping_flags() {
    match parse(&["dataguard", "ping", "--timeout", "3", "--no-cache"]) {
        CliCommand::Ping {
            timeout, no_cache, ..
        } => {
            assert_eq!(timeout, 3);
            assert!(no_cache);
        }
        _ => panic!("expected Ping"),
    }
}
