//! Counting circuit breaker for integration tests.
//!
//! Opens after `trip_after` reported failures for a key and stays open.

use std::collections::HashMap;
use std::sync::Mutex;

use dataguard_core::{BreakerKey, BreakerOpen, CircuitBreaker};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct KeyStats {
    pub admitted: u32,
    pub rejected: u32,
    pub successes: u32,
    pub failures: u32,
    pub ignored: u32,
}

impl KeyStats {
    /// Outcomes reported back for admitted calls.
    pub fn reported(&self) -> u32 {
        self.successes + self.failures + self.ignored
    }
}

pub struct RecordingBreaker {
    trip_after: u32,
    stats: Mutex<HashMap<String, KeyStats>>,
}

impl RecordingBreaker {
    pub fn new(trip_after: u32) -> Self {
        Self {
            trip_after,
            stats: Mutex::new(HashMap::new()),
        }
    }

    /// A breaker that never opens.
    pub fn counting() -> Self {
        Self::new(u32::MAX)
    }

    pub fn stats(&self, key: &str) -> KeyStats {
        self.stats
            .lock()
            .unwrap()
            .get(key)
            .cloned()
            .unwrap_or_default()
    }

    pub fn keys(&self) -> Vec<String> {
        let mut keys: Vec<String> = self.stats.lock().unwrap().keys().cloned().collect();
        keys.sort();
        keys
    }
}

impl CircuitBreaker for RecordingBreaker {
    fn admit(&self, key: &BreakerKey) -> Result<(), BreakerOpen> {
        let mut stats = self.stats.lock().unwrap();
        let entry = stats.entry(key.to_string()).or_default();
        if entry.failures >= self.trip_after {
            entry.rejected += 1;
            return Err(BreakerOpen {
                key: key.to_string(),
            });
        }
        entry.admitted += 1;
        Ok(())
    }

    fn on_success(&self, key: &BreakerKey) {
        let mut stats = self.stats.lock().unwrap();
        stats.entry(key.to_string()).or_default().successes += 1;
    }

    fn on_failure(&self, key: &BreakerKey) {
        let mut stats = self.stats.lock().unwrap();
        stats.entry(key.to_string()).or_default().failures += 1;
    }

    fn on_ignored(&self, key: &BreakerKey) {
        let mut stats = self.stats.lock().unwrap();
        stats.entry(key.to_string()).or_default().ignored += 1;
    }
}
