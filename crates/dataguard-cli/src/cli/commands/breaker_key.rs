//! `dataguard breaker-key` – show the breaker key for an operation name.

use anyhow::Result;
use dataguard_core::sanitize_breaker_name;

pub fn run_breaker_key(name: &str) -> Result<()> {
    println!("{}", sanitize_breaker_name(name));
    Ok(())
}
