//! SMTP diagnostics for mail exchangers.
//!
//! This module provides:
//! - An incremental EHLO reply parser, testable without sockets
//! - The greeting → EHLO → QUIT session driver
//! - Direct TLS inspection on the SMTPS port
//! - Bare connectivity checks on the mail ports
//! - The per-MX-host composite and the domain-wide run over every MX host

mod host;
mod parser;
mod ports;
mod session;
mod tls;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::time::Instant;

use serde::Serialize;
use trust_dns_resolver::TokioAsyncResolver;

use crate::config::DiagnosticsConfig;
use crate::dns::{lookup_mx_records, MxRecord};
use crate::error_handling::DiagnosticError;
use crate::target::ProbeTarget;
use crate::utils::{duration_to_ms, join_all_within};

pub use host::{diagnose_mx_host, probe_mail_host, HostResolution, MXServerDiagnostic};
pub use parser::{
    parse_reply_line, EhloParser, FeatureValue, ParserState, ReplyLine, SmtpHandshake,
};
pub use ports::{test_port, test_ports, PortTest};
pub use session::{probe_smtp, run_ehlo};
pub use tls::{probe_smtps, SmtpTlsDetails};

/// Counts across every MX host tested.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpSummary {
    /// Hosts tested.
    pub total_servers: usize,
    /// Hosts that completed the EHLO handshake.
    pub responsive_servers: usize,
    /// Hosts advertising STARTTLS.
    pub starttls_servers: usize,
    /// Hosts accepting a direct TLS session on the SMTPS port.
    pub smtps_servers: usize,
    /// Mean of the per-host average response times, over responsive hosts.
    pub average_response_time: f64,
}

impl SmtpSummary {
    fn from_servers(servers: &[MXServerDiagnostic]) -> Self {
        let responsive: Vec<&MXServerDiagnostic> = servers
            .iter()
            .filter(|s| s.smtp_features.is_success())
            .collect();
        let starttls_servers = responsive
            .iter()
            .filter(|s| {
                s.smtp_features
                    .data
                    .as_ref()
                    .is_some_and(|h| h.tls_supported)
            })
            .count();
        let smtps_servers = servers.iter().filter(|s| s.tls_details.is_success()).count();
        let average_response_time = if responsive.is_empty() {
            0.0
        } else {
            responsive.iter().map(|s| s.average_response_time).sum::<f64>()
                / responsive.len() as f64
        };
        SmtpSummary {
            total_servers: servers.len(),
            responsive_servers: responsive.len(),
            starttls_servers,
            smtps_servers,
            average_response_time,
        }
    }
}

/// SMTP diagnostics for a domain's mail exchangers or a single mail IP.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpDiagnostics {
    /// Target as given.
    pub target: String,
    /// MX records found, by preference; empty for IP targets.
    pub mx_records: Vec<MxRecord>,
    /// One entry per host, in MX preference order.
    pub servers: Vec<MXServerDiagnostic>,
    /// Aggregate counts.
    pub summary: SmtpSummary,
    /// Wall time of the whole run.
    pub response_time_ms: f64,
}

/// Tests every MX host of a domain, or the single host of an IP target.
///
/// Hosts run concurrently under `smtp_group_timeout`; a host still running
/// when it expires is reported as timed out, and hosts that finished keep
/// their results.
///
/// # Errors
///
/// Returns `DiagnosticError::NotFound` when the domain has no MX records,
/// and the resolver failure when the MX lookup itself fails.
pub async fn run_smtp_diagnostics(
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
    target: &ProbeTarget,
) -> Result<SmtpDiagnostics, DiagnosticError> {
    let start = Instant::now();
    let (mx_records, servers) = match target {
        ProbeTarget::Ip(ip) => {
            log::info!("Running SMTP diagnostics for mail host {ip}");
            let server = probe_mail_host(&ip.to_string(), 0, *ip, resolver, config).await;
            (Vec::new(), vec![server])
        }
        ProbeTarget::Domain(domain) => {
            let mx_records =
                lookup_mx_records(resolver, domain.as_str(), config.dns_timeout).await?;
            if mx_records.is_empty() {
                return Err(DiagnosticError::NotFound(format!(
                    "No MX records found for {}",
                    domain.as_str()
                )));
            }
            log::info!(
                "Running SMTP diagnostics for {} across {} MX hosts",
                domain.as_str(),
                mx_records.len()
            );
            let probes = mx_records
                .iter()
                .map(|mx| diagnose_mx_host(&mx.exchange, mx.priority, resolver, config))
                .collect();
            let servers = join_all_within(probes, config.smtp_group_timeout, |index| {
                let mx = &mx_records[index];
                MXServerDiagnostic::timed_out(&mx.exchange, mx.priority, config.smtp_group_timeout)
            })
            .await;
            (mx_records, servers)
        }
    };

    let summary = SmtpSummary::from_servers(&servers);
    log::info!(
        "SMTP diagnostics for {}: {}/{} hosts responsive",
        target.host(),
        summary.responsive_servers,
        summary.total_servers
    );
    Ok(SmtpDiagnostics {
        target: target.host(),
        mx_records,
        servers,
        summary,
        response_time_ms: duration_to_ms(start.elapsed()),
    })
}
