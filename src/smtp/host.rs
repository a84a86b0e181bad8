//! Per-MX-host composite diagnostic.
//!
//! Four independent sub-probes run concurrently against one host: address
//! and reverse DNS, the plaintext EHLO handshake, the SMTPS session and the
//! mail port checks. None of them gates another.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use serde::Serialize;
use trust_dns_resolver::TokioAsyncResolver;

use super::parser::SmtpHandshake;
use super::ports::{test_ports, PortTest};
use super::session::probe_smtp;
use super::tls::{probe_smtps, SmtpTlsDetails};
use crate::config::DiagnosticsConfig;
use crate::dns::{forward_confirmed, resolve_host_to_ip, reverse_dns_lookup};
use crate::utils::{duration_to_ms, timed, TimedResult};

/// Address and reverse DNS of an MX host.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HostResolution {
    /// Address probed.
    pub ip: IpAddr,
    /// PTR name of `ip`, when one exists.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reverse_dns: Option<String>,
    /// The PTR name resolves back to `ip`.
    pub forward_confirmed: bool,
}

/// Everything learned about one MX host.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MXServerDiagnostic {
    /// MX exchange host name.
    pub host: String,
    /// MX preference; lower is preferred.
    pub priority: u16,
    /// Wall time for the whole host.
    pub response_time_ms: f64,
    /// Mean time of the sub-probes that succeeded.
    pub average_response_time: f64,
    /// Address and reverse DNS.
    pub dns: TimedResult<HostResolution>,
    /// EHLO handshake on the SMTP port.
    pub smtp_features: TimedResult<SmtpHandshake>,
    /// Direct TLS on the SMTPS port.
    pub tls_details: TimedResult<SmtpTlsDetails>,
    /// Bare connectivity on each mail port.
    pub port_tests: Vec<PortTest>,
    /// Why the host could not be diagnosed, if it could not.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl MXServerDiagnostic {
    /// Entry for a host that did not finish inside the group budget.
    pub fn timed_out(host: &str, priority: u16, budget: Duration) -> Self {
        let message = format!("SMTP tests timed out after {}ms", budget.as_millis());
        MXServerDiagnostic {
            host: host.to_string(),
            priority,
            response_time_ms: duration_to_ms(budget),
            average_response_time: 0.0,
            dns: TimedResult::failure(&message, budget),
            smtp_features: TimedResult::failure(&message, budget),
            tls_details: TimedResult::failure(&message, budget),
            port_tests: Vec::new(),
            error: Some(message),
        }
    }
}

/// Mean over the sub-probes that succeeded; 0 when none did.
fn average_response_time(
    dns: &TimedResult<HostResolution>,
    smtp: &TimedResult<SmtpHandshake>,
    tls: &TimedResult<SmtpTlsDetails>,
    ports: &[PortTest],
) -> f64 {
    let mut times = Vec::with_capacity(3 + ports.len());
    if dns.is_success() {
        times.push(dns.query_time_ms);
    }
    if smtp.is_success() {
        times.push(smtp.query_time_ms);
    }
    if tls.is_success() {
        times.push(tls.query_time_ms);
    }
    times.extend(ports.iter().filter(|p| p.open).map(|p| p.response_time_ms));
    if times.is_empty() {
        0.0
    } else {
        times.iter().sum::<f64>() / times.len() as f64
    }
}

async fn resolve_reverse(
    ip: IpAddr,
    resolver: &TokioAsyncResolver,
    timeout: Duration,
) -> HostResolution {
    let reverse_dns = match reverse_dns_lookup(ip, resolver, timeout).await {
        Ok(name) => name,
        Err(e) => {
            log::debug!("Reverse lookup for {ip} failed: {e}");
            None
        }
    };
    let forward_confirmed = match &reverse_dns {
        Some(name) => forward_confirmed(name, ip, resolver, timeout).await,
        None => false,
    };
    HostResolution {
        ip,
        reverse_dns,
        forward_confirmed,
    }
}

/// Runs the sub-probes against a host whose address is already known.
pub async fn probe_mail_host(
    host: &str,
    priority: u16,
    ip: IpAddr,
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
) -> MXServerDiagnostic {
    let start = Instant::now();
    let smtp_addr = SocketAddr::new(ip, config.mail_ports.smtp);
    let ports = config.mail_ports.all();

    let (dns, smtp_features, tls_details, port_tests) = tokio::join!(
        async {
            let begin = Instant::now();
            let resolution = resolve_reverse(ip, resolver, config.dns_timeout).await;
            TimedResult::success(resolution, begin.elapsed())
        },
        timed(
            "SMTP handshake",
            config.smtp_host_timeout,
            probe_smtp(smtp_addr, &config.ehlo_name, config.connect_timeout),
        ),
        timed(
            "SMTPS connection",
            config.smtp_host_timeout,
            probe_smtps(host, ip, config),
        ),
        test_ports(ip, &ports, config.connect_timeout),
    );

    if let Some(e) = &smtp_features.error {
        log::info!("SMTP handshake with {host} ({ip}) failed: {e}");
    }
    let average = average_response_time(&dns, &smtp_features, &tls_details, &port_tests);
    let error = smtp_features
        .error
        .as_ref()
        .map(|e| format!("SMTP handshake failed: {e}"));

    MXServerDiagnostic {
        host: host.to_string(),
        priority,
        response_time_ms: duration_to_ms(start.elapsed()),
        average_response_time: average,
        dns,
        smtp_features,
        tls_details,
        port_tests,
        error,
    }
}

/// Resolves an MX host and runs every sub-probe against it.
///
/// A host that does not resolve yields a diagnostic with the DNS failure
/// and no network probes.
pub async fn diagnose_mx_host(
    host: &str,
    priority: u16,
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
) -> MXServerDiagnostic {
    let start = Instant::now();
    let ip = match resolve_host_to_ip(host, resolver, config.dns_timeout).await {
        Ok(ip) => ip,
        Err(e) => {
            log::warn!("MX host {host} does not resolve: {e}");
            let elapsed = start.elapsed();
            let skipped = format!("skipped: {e}");
            return MXServerDiagnostic {
                host: host.to_string(),
                priority,
                response_time_ms: duration_to_ms(elapsed),
                average_response_time: 0.0,
                dns: TimedResult::failure(&e, elapsed),
                smtp_features: TimedResult::failure(&skipped, Duration::ZERO),
                tls_details: TimedResult::failure(&skipped, Duration::ZERO),
                port_tests: Vec::new(),
                error: Some(e.to_string()),
            };
        }
    };
    let mut diagnostic = probe_mail_host(host, priority, ip, resolver, config).await;
    diagnostic.response_time_ms = duration_to_ms(start.elapsed());
    diagnostic
}
