//! Report envelope shared by every diagnostic category.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;

use super::events::LogEvent;
use crate::blacklist::BlacklistDiagnostics;
use crate::dns::DnsDiagnostics;
use crate::error_handling::DiagnosticError;
use crate::smtp::SmtpDiagnostics;
use crate::tls::SslDiagnostics;

/// Timing of a whole report.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct QueryMetrics {
    /// Wall time from start to assembly.
    pub total_time_ms: f64,
    /// When the run started.
    pub started_at: DateTime<Utc>,
    /// When the report was assembled.
    pub completed_at: DateTime<Utc>,
}

/// One category's result with its run metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticReport<T> {
    /// Target as given.
    pub target: String,
    /// Category name (`dns`, `smtp`, `ssl`, `blacklist`, `full`).
    pub category: &'static str,
    /// Category payload.
    pub results: T,
    /// Timing.
    pub query_metrics: QueryMetrics,
    /// Events in insertion order.
    pub logs: Vec<LogEvent>,
    /// Probe failures by kind; kinds with no failures are omitted.
    pub stats: BTreeMap<String, usize>,
}

/// A category that failed as a whole inside a full report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryFailure {
    /// Failure message.
    pub error: String,
    /// HTTP-style status code.
    pub status_code: u16,
}

impl From<&DiagnosticError> for CategoryFailure {
    fn from(e: &DiagnosticError) -> Self {
        CategoryFailure {
            error: e.to_string(),
            status_code: e.status_code(),
        }
    }
}

/// Category payload or its failure.
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum CategoryOutcome<T> {
    /// The category completed.
    Completed(T),
    /// The category failed as a whole.
    Failed(CategoryFailure),
}

impl<T> CategoryOutcome<T> {
    /// Payload, when the category completed.
    pub fn completed(&self) -> Option<&T> {
        match self {
            CategoryOutcome::Completed(data) => Some(data),
            CategoryOutcome::Failed(_) => None,
        }
    }

    /// Failure, when the category did not complete.
    pub fn failure(&self) -> Option<&CategoryFailure> {
        match self {
            CategoryOutcome::Completed(_) => None,
            CategoryOutcome::Failed(failure) => Some(failure),
        }
    }
}

impl<T> From<Result<T, DiagnosticError>> for CategoryOutcome<T> {
    fn from(result: Result<T, DiagnosticError>) -> Self {
        match result {
            Ok(data) => CategoryOutcome::Completed(data),
            Err(e) => CategoryOutcome::Failed(CategoryFailure::from(&e)),
        }
    }
}

/// Every category for one target.
#[derive(Debug, Clone, Serialize)]
pub struct FullDiagnostics {
    /// DNS category.
    pub dns: CategoryOutcome<DnsDiagnostics>,
    /// SMTP category.
    pub smtp: CategoryOutcome<SmtpDiagnostics>,
    /// SSL category.
    pub ssl: CategoryOutcome<SslDiagnostics>,
    /// Blacklist category.
    pub blacklist: CategoryOutcome<BlacklistDiagnostics>,
}
