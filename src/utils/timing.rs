//! Timed probe results and the deadline wrapper.
//!
//! Every probe in the engine returns a [`TimedResult`]: the payload or an
//! error string, plus how long the probe took and when it finished.

use std::fmt::Display;
use std::future::Future;
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error_handling::ProbeError;

/// Converts a duration to fractional milliseconds.
pub fn duration_to_ms(duration: Duration) -> f64 {
    duration.as_secs_f64() * 1000.0
}

/// Payload of a probe annotated with timing, or the reason it is missing.
///
/// Exactly one of `data` and `error` is set.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TimedResult<T> {
    /// Probe payload on success.
    pub data: Option<T>,
    /// Failure description when `data` is absent.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Wall time spent in the probe, in milliseconds.
    pub query_time_ms: f64,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
}

impl<T> TimedResult<T> {
    /// A successful result.
    pub fn success(data: T, elapsed: Duration) -> Self {
        TimedResult {
            data: Some(data),
            error: None,
            query_time_ms: duration_to_ms(elapsed),
            timestamp: Utc::now(),
        }
    }

    /// A failed result.
    pub fn failure(error: impl Display, elapsed: Duration) -> Self {
        TimedResult {
            data: None,
            error: Some(error.to_string()),
            query_time_ms: duration_to_ms(elapsed),
            timestamp: Utc::now(),
        }
    }

    /// Whether the probe produced a payload.
    pub fn is_success(&self) -> bool {
        self.data.is_some()
    }

    /// Transforms the payload, keeping timing and error untouched.
    pub fn map<U>(self, f: impl FnOnce(T) -> U) -> TimedResult<U> {
        TimedResult {
            data: self.data.map(f),
            error: self.error,
            query_time_ms: self.query_time_ms,
            timestamp: self.timestamp,
        }
    }
}

/// Races `operation` against `budget`.
///
/// On expiry the operation future is dropped, which closes any socket or
/// timer it owns, and a `ProbeError::Timeout` naming `operation_name` is
/// returned.
pub async fn with_timeout<T, F>(
    operation_name: &str,
    budget: Duration,
    operation: F,
) -> Result<T, ProbeError>
where
    F: Future<Output = Result<T, ProbeError>>,
{
    match tokio::time::timeout(budget, operation).await {
        Ok(result) => result,
        Err(_) => {
            log::debug!("{operation_name} abandoned after {}ms", budget.as_millis());
            Err(ProbeError::Timeout {
                operation: operation_name.to_string(),
                after_ms: budget.as_millis() as u64,
            })
        }
    }
}

/// Runs `operation` under `budget` and packages the outcome as a `TimedResult`.
pub async fn timed<T, E, F>(operation_name: &str, budget: Duration, operation: F) -> TimedResult<T>
where
    E: Into<ProbeError>,
    F: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let result = with_timeout(operation_name, budget, async { operation.await.map_err(Into::into) })
        .await;
    match result {
        Ok(data) => TimedResult::success(data, start.elapsed()),
        Err(e) => TimedResult::failure(e, start.elapsed()),
    }
}
