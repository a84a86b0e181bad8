//! Error handling and probe statistics.
//!
//! This module provides:
//! - Error type definitions for every seam of the engine
//! - HTTP-style status codes for category failures
//! - Per-run probe failure counters
//!
//! Failures are split by how far they may travel:
//! - **`ProbeError`**: captured into a probe result, never propagated
//! - **`DiagnosticError`**: aborts one diagnostic category
//! - **`InitializationError`**: aborts process start-up

mod stats;
mod types;

// Re-export public API
pub use stats::ProbeStats;
pub use types::{
    DiagnosticError, DnsblError, ErrorType, InitializationError, ProbeError, SmtpError,
    TlsProbeError,
};

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use strum::IntoEnumIterator;

    #[test]
    fn test_probe_stats_initialization() {
        let stats = ProbeStats::new();
        for error_type in ErrorType::iter() {
            assert_eq!(stats.get_error_count(error_type), 0);
        }
        assert!(stats.snapshot().is_empty());
    }

    #[test]
    fn test_probe_stats_increment() {
        let stats = ProbeStats::new();
        stats.increment_error(ErrorType::SmtpConnectError);
        stats.increment_error(ErrorType::SmtpConnectError);
        stats.increment_error(ErrorType::ProbeTimeout);

        assert_eq!(stats.get_error_count(ErrorType::SmtpConnectError), 2);
        assert_eq!(stats.total_errors(), 3);

        let snapshot = stats.snapshot();
        assert_eq!(snapshot.get("SMTP connect error"), Some(&2));
        assert_eq!(snapshot.get("Probe timeout"), Some(&1));
        assert_eq!(snapshot.len(), 2);
    }

    #[tokio::test]
    async fn test_probe_stats_concurrent_increments() {
        let stats = Arc::new(ProbeStats::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let stats = Arc::clone(&stats);
            handles.push(tokio::spawn(async move {
                for _ in 0..100 {
                    stats.increment_error(ErrorType::DnsblLookupError);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }
        assert_eq!(stats.get_error_count(ErrorType::DnsblLookupError), 1600);
    }
}
