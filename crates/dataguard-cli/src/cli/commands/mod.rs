//! CLI command handlers, one per file.

mod breaker_key;
mod classify;
mod config;
mod ping;

pub use breaker_key::run_breaker_key;
pub use classify::run_classify;
pub use config::run_config;
pub use ping::run_ping;
