//! Diagnostics orchestration.
//!
//! This module provides:
//! - `DiagnosticEngine`, the entry points for each category and the full report
//! - The append-only event log attached to every report
//! - The report envelope with timing and probe failure counts

mod engine;
mod events;
mod report;
mod tally;

pub use engine::DiagnosticEngine;
pub use events::{EventKind, EventLog, LogEvent};
pub use report::{CategoryFailure, CategoryOutcome, DiagnosticReport, FullDiagnostics, QueryMetrics};
