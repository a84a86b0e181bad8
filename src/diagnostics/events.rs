//! Append-only event log of one diagnostic run.
//!
//! Sibling probes append concurrently; entries keep insertion order, which
//! is completion order rather than a causal order. Every entry is also
//! written to the process log.

use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

/// Kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    /// Progress.
    Info,
    /// A check completed.
    Success,
    /// A check completed with findings or partial failures.
    Warning,
    /// A check failed.
    Error,
}

impl EventKind {
    fn level(self) -> log::Level {
        match self {
            EventKind::Info | EventKind::Success => log::Level::Info,
            EventKind::Warning => log::Level::Warn,
            EventKind::Error => log::Level::Error,
        }
    }
}

/// One entry of the event log.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    /// When the event was appended.
    pub timestamp: DateTime<Utc>,
    /// Event kind.
    #[serde(rename = "type")]
    pub kind: EventKind,
    /// Human-readable message.
    pub message: String,
    /// Structured context, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Thread-safe append-only log.
#[derive(Debug, Default)]
pub struct EventLog {
    events: Mutex<Vec<LogEvent>>,
}

impl EventLog {
    /// Creates an empty log.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an event and mirrors it to the process log.
    pub fn record(&self, kind: EventKind, message: impl Into<String>, details: Option<Value>) {
        let message = message.into();
        log::log!(kind.level(), "{message}");
        // A poisoned lock still holds a consistent Vec; keep appending
        let mut events = self.events.lock().unwrap_or_else(|e| e.into_inner());
        // Stamped under the lock so timestamps follow insertion order
        events.push(LogEvent {
            timestamp: Utc::now(),
            kind,
            message,
            details,
        });
    }

    /// Appends an info event without details.
    pub fn info(&self, message: impl Into<String>) {
        self.record(EventKind::Info, message, None);
    }

    /// Copy of every event so far, in insertion order.
    pub fn snapshot(&self) -> Vec<LogEvent> {
        self.events
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    /// Number of events so far.
    pub fn len(&self) -> usize {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    /// Whether nothing has been logged.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
