//! Circuit-breaker key derivation.

use std::fmt;

/// Normalizes a free-form operation name into a breaker key.
///
/// - Lowercases
/// - Trims leading/trailing whitespace
/// - Replaces each interior whitespace character with `-`, so a run of
///   three spaces becomes `---`
pub fn sanitize_breaker_name(name: &str) -> String {
    name.trim()
        .chars()
        .flat_map(char::to_lowercase)
        .map(|c| if c.is_whitespace() { '-' } else { c })
        .collect()
}

/// Key scoping one breaker to one logical operation or dependency.
///
/// Names that normalize identically share a key, and therefore a breaker.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BreakerKey(String);

impl BreakerKey {
    pub fn new(name: &str) -> Self {
        Self(sanitize_breaker_name(name))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for BreakerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
