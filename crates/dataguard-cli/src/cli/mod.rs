//! CLI for operating and inspecting the dataguard data-access core.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use dataguard_core::config;

use commands::{run_breaker_key, run_classify, run_config, run_ping};

/// Top-level CLI.
#[derive(Debug, Parser)]
#[command(name = "dataguard")]
#[command(about = "dataguard: resilient PostgreSQL and Redis access", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: CliCommand,
}

/// Which store's classifier to consult.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Store {
    Pg,
    Cache,
}

#[derive(Debug, Subcommand)]
pub enum CliCommand {
    /// Print the effective configuration with secrets masked.
    Config,

    /// Show how a store error would be classified by the retry executor.
    Classify {
        /// Store whose rules apply.
        #[arg(value_enum)]
        store: Store,
        /// SQLSTATE code (pg) or error message.
        input: String,
        /// Treat the input as a message even if it looks like a SQLSTATE code.
        #[arg(long)]
        message: bool,
    },

    /// Print the circuit-breaker key derived from an operation name.
    BreakerKey {
        /// Operation name, e.g. "Load User Profile".
        name: String,
    },

    /// Connect to the configured stores and ping them through the retry executor.
    Ping {
        /// Overall deadline in seconds.
        #[arg(long, default_value = "10", value_name = "SECS")]
        timeout: u64,
        /// Skip the database check.
        #[arg(long)]
        no_database: bool,
        /// Skip the cache check.
        #[arg(long)]
        no_cache: bool,
    },
}

impl CliCommand {
    pub async fn run_from_args() -> Result<()> {
        let cli = Cli::parse();

        match cli.command {
            CliCommand::Classify {
                store,
                input,
                message,
            } => run_classify(store, &input, message),
            CliCommand::BreakerKey { name } => run_breaker_key(&name),
            CliCommand::Config => {
                let cfg = config::load_or_init()?;
                run_config(&cfg)
            }
            CliCommand::Ping {
                timeout,
                no_database,
                no_cache,
            } => {
                let cfg = config::load_or_init()?;
                tracing::debug!("loaded config: {:?}", cfg);
                run_ping(&cfg, timeout, !no_database, !no_cache).await
            }
        }
    }
}

#[cfg(test)]
mod tests;
