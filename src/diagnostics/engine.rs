//! Diagnostic entry points.
//!
//! Each entry point owns one run: an event log, probe failure counters and
//! the start time. Categories are bounded by `category_timeout`; the full
//! report runs all four concurrently and records a failed category in place
//! without touching its siblings.

use std::future::Future;
use std::sync::Arc;
use std::time::Instant;

use chrono::{DateTime, Utc};
use serde_json::{json, Value};
use trust_dns_resolver::TokioAsyncResolver;

use super::events::{EventKind, EventLog};
use super::report::{DiagnosticReport, FullDiagnostics, QueryMetrics};
use super::tally::{tally_blacklist, tally_dns, tally_smtp, tally_ssl, Tally};
use crate::blacklist::{run_blacklist_diagnostics, BlacklistDiagnostics};
use crate::config::DiagnosticsConfig;
use crate::dns::{run_dns_diagnostics, DnsDiagnostics};
use crate::error_handling::{DiagnosticError, InitializationError, ProbeStats};
use crate::initialization::{init_crypto_provider, init_resolver};
use crate::smtp::{run_smtp_diagnostics, SmtpDiagnostics};
use crate::target::ProbeTarget;
use crate::tls::{run_ssl_diagnostics, SslDiagnostics};
use crate::utils::duration_to_ms;

/// State owned by one diagnostic run.
struct Run {
    category: &'static str,
    target: String,
    started: Instant,
    started_at: DateTime<Utc>,
    events: EventLog,
    stats: ProbeStats,
}

impl Run {
    fn start(category: &'static str, target: &ProbeTarget) -> Self {
        Run {
            category,
            target: target.host(),
            started: Instant::now(),
            started_at: Utc::now(),
            events: EventLog::new(),
            stats: ProbeStats::new(),
        }
    }

    fn finish<T>(self, results: T) -> DiagnosticReport<T> {
        let total_time_ms = duration_to_ms(self.started.elapsed());
        self.events.record(
            EventKind::Info,
            format!(
                "{} diagnostics for {} finished in {:.0}ms",
                self.category, self.target, total_time_ms
            ),
            None,
        );
        DiagnosticReport {
            target: self.target,
            category: self.category,
            results,
            query_metrics: QueryMetrics {
                total_time_ms,
                started_at: self.started_at,
                completed_at: Utc::now(),
            },
            logs: self.events.snapshot(),
            stats: self.stats.snapshot(),
        }
    }
}

/// Runs diagnostics against validated targets.
///
/// Holds the shared resolver and the timeout budgets; cheap to share behind
/// an `Arc` across concurrent requests.
pub struct DiagnosticEngine {
    resolver: Arc<TokioAsyncResolver>,
    config: DiagnosticsConfig,
}

impl DiagnosticEngine {
    /// Creates an engine with the system resolver configuration.
    ///
    /// # Errors
    ///
    /// Returns `InitializationError` if the resolver cannot be built.
    pub fn new(config: DiagnosticsConfig) -> Result<Self, InitializationError> {
        init_crypto_provider();
        let resolver = init_resolver(config.dns_timeout)?;
        Ok(DiagnosticEngine { resolver, config })
    }

    /// Creates an engine around an existing resolver.
    pub fn with_resolver(resolver: Arc<TokioAsyncResolver>, config: DiagnosticsConfig) -> Self {
        init_crypto_provider();
        DiagnosticEngine { resolver, config }
    }

    /// Budgets in use.
    pub fn config(&self) -> &DiagnosticsConfig {
        &self.config
    }

    /// Runs one category under the category budget and records its outcome.
    ///
    /// Failed probes inside a completed category are logged one by one
    /// before the category's own completion event.
    async fn category<T, F>(
        &self,
        run: &Run,
        label: &str,
        operation: F,
        tally: fn(&T, &Tally<'_>),
        summary: fn(&T) -> Option<Value>,
    ) -> Result<T, DiagnosticError>
    where
        F: Future<Output = Result<T, DiagnosticError>>,
    {
        run.events.info(format!("{label} started for {}", run.target));
        let start = Instant::now();
        let budget = self.config.category_timeout;
        let result = match tokio::time::timeout(budget, operation).await {
            Ok(result) => result,
            Err(_) => Err(DiagnosticError::Timeout {
                operation: label.to_string(),
                after_ms: budget.as_millis() as u64,
            }),
        };
        let elapsed_ms = duration_to_ms(start.elapsed());

        match &result {
            Ok(data) => {
                let before = run.stats.total_errors();
                tally(data, &Tally::new(&run.stats, &run.events));
                let failures = run.stats.total_errors() - before;
                let (kind, message) = if failures == 0 {
                    (
                        EventKind::Success,
                        format!("{label} completed in {elapsed_ms:.0}ms"),
                    )
                } else {
                    (
                        EventKind::Warning,
                        format!("{label} completed in {elapsed_ms:.0}ms with {failures} failed probe(s)"),
                    )
                };
                run.events.record(kind, message, summary(data));
            }
            Err(e) => run.events.record(
                EventKind::Error,
                format!("{label} failed: {e}"),
                Some(json!({ "statusCode": e.status_code() })),
            ),
        }
        result
    }

    async fn dns(&self, run: &Run, target: &ProbeTarget) -> Result<DnsDiagnostics, DiagnosticError> {
        self.category(
            run,
            "DNS diagnostics",
            run_dns_diagnostics(&self.resolver, &self.config, target),
            tally_dns,
            |report: &DnsDiagnostics| {
                Some(json!({
                    "recordTypes": report.records.len(),
                    "failedLookups": report.records.iter().filter(|r| !r.is_success()).count(),
                    "dnssecEnabled": report.dnssec.as_ref().map(|d| d.enabled),
                }))
            },
        )
        .await
    }

    async fn smtp(&self, run: &Run, target: &ProbeTarget) -> Result<SmtpDiagnostics, DiagnosticError> {
        self.category(
            run,
            "SMTP diagnostics",
            run_smtp_diagnostics(&self.resolver, &self.config, target),
            tally_smtp,
            |report: &SmtpDiagnostics| serde_json::to_value(&report.summary).ok(),
        )
        .await
    }

    async fn ssl(
        &self,
        run: &Run,
        target: &ProbeTarget,
        port: u16,
    ) -> Result<SslDiagnostics, DiagnosticError> {
        self.category(
            run,
            "SSL diagnostics",
            run_ssl_diagnostics(&self.resolver, &self.config, target, port),
            tally_ssl,
            |report: &SslDiagnostics| {
                Some(json!({
                    "port": report.port,
                    "score": report.security.score,
                    "grade": report.security.grade,
                }))
            },
        )
        .await
    }

    async fn blacklist(
        &self,
        run: &Run,
        target: &ProbeTarget,
    ) -> Result<BlacklistDiagnostics, DiagnosticError> {
        self.category(
            run,
            "Blacklist diagnostics",
            run_blacklist_diagnostics(&self.resolver, &self.config, target),
            tally_blacklist,
            |report: &BlacklistDiagnostics| serde_json::to_value(&report.overall).ok(),
        )
        .await
    }

    /// DNS records, nameservers, propagation, DNSSEC and mail policy.
    ///
    /// # Errors
    ///
    /// Returns the category failure with its status code.
    pub async fn dns_report(
        &self,
        target: &ProbeTarget,
    ) -> Result<DiagnosticReport<DnsDiagnostics>, DiagnosticError> {
        let run = Run::start("dns", target);
        let results = self.dns(&run, target).await?;
        Ok(run.finish(results))
    }

    /// SMTP handshake, SMTPS and port checks for every MX host.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` (404) when a domain has no MX records.
    pub async fn smtp_report(
        &self,
        target: &ProbeTarget,
    ) -> Result<DiagnosticReport<SmtpDiagnostics>, DiagnosticError> {
        let run = Run::start("smtp", target);
        let results = self.smtp(&run, target).await?;
        Ok(run.finish(results))
    }

    /// Certificate, protocol and cipher support, and score for `port`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` (404) when no certificate is presented.
    pub async fn ssl_report(
        &self,
        target: &ProbeTarget,
        port: u16,
    ) -> Result<DiagnosticReport<SslDiagnostics>, DiagnosticError> {
        let run = Run::start("ssl", target);
        let results = self.ssl(&run, target, port).await?;
        Ok(run.finish(results))
    }

    /// DNSBL listings for the target's addresses.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` (404) when a domain has no A records.
    pub async fn blacklist_report(
        &self,
        target: &ProbeTarget,
    ) -> Result<DiagnosticReport<BlacklistDiagnostics>, DiagnosticError> {
        let run = Run::start("blacklist", target);
        let results = self.blacklist(&run, target).await?;
        Ok(run.finish(results))
    }

    /// Every category concurrently; TLS is inspected on `ssl_port`.
    ///
    /// Never fails as a whole: a failed category becomes an
    /// `{error, statusCode}` entry.
    pub async fn full_report(
        &self,
        target: &ProbeTarget,
        ssl_port: u16,
    ) -> DiagnosticReport<FullDiagnostics> {
        let run = Run::start("full", target);
        let (dns, smtp, ssl, blacklist) = tokio::join!(
            self.dns(&run, target),
            self.smtp(&run, target),
            self.ssl(&run, target, ssl_port),
            self.blacklist(&run, target),
        );
        run.finish(FullDiagnostics {
            dns: dns.into(),
            smtp: smtp.into(),
            ssl: ssl.into(),
            blacklist: blacklist.into(),
        })
    }
}
