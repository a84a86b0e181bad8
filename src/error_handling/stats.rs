//! Probe failure statistics.
//!
//! Thread-safe counters for probe failures within one diagnostic run. Sibling
//! probes increment concurrently; the orchestrator reads a snapshot when it
//! assembles the report.

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicUsize, Ordering};
use strum::IntoEnumIterator;

use super::types::ErrorType;

/// Thread-safe probe failure tracker.
///
/// Every `ErrorType` is initialized to zero on creation, so increments never
/// allocate and can be shared across tasks behind an `Arc`.
pub struct ProbeStats {
    errors: HashMap<ErrorType, AtomicUsize>,
}

impl Default for ProbeStats {
    fn default() -> Self {
        Self::new()
    }
}

impl ProbeStats {
    /// Creates a tracker with every counter at zero.
    pub fn new() -> Self {
        let errors = ErrorType::iter()
            .map(|error| (error, AtomicUsize::new(0)))
            .collect();
        ProbeStats { errors }
    }

    /// Increment an error counter.
    pub fn increment_error(&self, error: ErrorType) {
        if let Some(counter) = self.errors.get(&error) {
            counter.fetch_add(1, Ordering::Relaxed);
        } else {
            log::error!(
                "Attempted to increment error counter for {:?} which is not in the map",
                error
            );
        }
    }

    /// Get the count for an error type.
    pub fn get_error_count(&self, error: ErrorType) -> usize {
        self.errors
            .get(&error)
            .map(|c| c.load(Ordering::SeqCst))
            .unwrap_or(0)
    }

    /// Get total error count across all error types.
    pub fn total_errors(&self) -> usize {
        ErrorType::iter().map(|e| self.get_error_count(e)).sum()
    }

    /// Non-zero counters keyed by their display name, in a stable order.
    pub fn snapshot(&self) -> BTreeMap<String, usize> {
        ErrorType::iter()
            .filter_map(|e| {
                let count = self.get_error_count(e);
                (count > 0).then(|| (e.as_str().to_string(), count))
            })
            .collect()
    }
}
