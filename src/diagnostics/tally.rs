//! Counts the probe failures recorded inside category payloads.
//!
//! Each failed or timed-out probe bumps the run's counters and appends a
//! warning to the run's event log naming the probe.

use serde_json::json;

use super::events::{EventKind, EventLog};
use crate::blacklist::BlacklistDiagnostics;
use crate::dns::{DnsDiagnostics, RecordKind};
use crate::error_handling::{ErrorType, ProbeStats};
use crate::smtp::SmtpDiagnostics;
use crate::tls::SslDiagnostics;

/// Deadline expiries are counted as timeouts whatever the probe.
fn classify(message: &str, otherwise: ErrorType) -> ErrorType {
    if message.contains("timed out") {
        ErrorType::ProbeTimeout
    } else {
        otherwise
    }
}

/// Counters and event log of the run being tallied.
pub(crate) struct Tally<'a> {
    stats: &'a ProbeStats,
    events: &'a EventLog,
}

impl<'a> Tally<'a> {
    pub(crate) fn new(stats: &'a ProbeStats, events: &'a EventLog) -> Self {
        Tally { stats, events }
    }

    fn failure(&self, probe: &str, message: &str, otherwise: ErrorType) {
        let error_type = classify(message, otherwise);
        self.stats.increment_error(error_type);
        let verb = if error_type == ErrorType::ProbeTimeout {
            "timed out"
        } else {
            "failed"
        };
        self.events.record(
            EventKind::Warning,
            format!("{probe} {verb}: {message}"),
            Some(json!({ "probe": probe, "errorType": error_type.as_str() })),
        );
    }

    fn count(&self, probe: &str, error: Option<&String>, otherwise: ErrorType) {
        if let Some(message) = error {
            self.failure(probe, message, otherwise);
        }
    }
}

pub(crate) fn tally_dns(report: &DnsDiagnostics, tally: &Tally<'_>) {
    // Lookups are stored in STANDARD order
    for (kind, lookup) in RecordKind::STANDARD.iter().zip(&report.records) {
        tally.count(
            &format!("{kind} lookup"),
            lookup.error.as_ref(),
            ErrorType::DnsLookupError,
        );
    }
    if let Some(nameservers) = &report.nameservers {
        tally.count("Nameserver lookup", nameservers.error.as_ref(), ErrorType::DnsLookupError);
        for ns in nameservers.data.iter().flatten() {
            tally.count(
                &format!("Nameserver {}", ns.nameserver),
                ns.error.as_ref(),
                ErrorType::DnsNameserverError,
            );
        }
    }
    if let Some(propagation) = &report.propagation {
        for answer in &propagation.resolvers {
            tally.count(
                &format!("Propagation check via {}", answer.resolver),
                answer.error.as_ref(),
                ErrorType::DnsPropagationError,
            );
        }
    }
    if let Some(dnssec) = &report.dnssec {
        for error in &dnssec.errors {
            tally.failure("DNSSEC query", error, ErrorType::DnsRawQueryError);
        }
    }
    if let Some(dmarc) = &report.dmarc {
        tally.count("DMARC lookup", dmarc.error.as_ref(), ErrorType::DnsLookupError);
    }
    if let Some(reverse) = &report.reverse_dns {
        tally.count("Reverse DNS lookup", reverse.error.as_ref(), ErrorType::DnsLookupError);
    }
}

pub(crate) fn tally_smtp(report: &SmtpDiagnostics, tally: &Tally<'_>) {
    for server in &report.servers {
        let host = &server.host;
        tally.count(
            &format!("Address lookup for {host}"),
            server.dns.error.as_ref(),
            ErrorType::DnsLookupError,
        );
        if let Some(message) = &server.smtp_features.error {
            let kind = if message.starts_with("connection") {
                ErrorType::SmtpConnectError
            } else {
                ErrorType::SmtpProtocolError
            };
            tally.failure(&format!("SMTP handshake with {host}"), message, kind);
        }
        tally.count(
            &format!("SMTPS check on {host}"),
            server.tls_details.error.as_ref(),
            ErrorType::SmtpTlsError,
        );
    }
}

pub(crate) fn tally_ssl(report: &SslDiagnostics, tally: &Tally<'_>) {
    if let Some(message) = &report.certificate.error {
        let kind = if message.to_ascii_lowercase().contains("certificate") {
            ErrorType::TlsCertificateError
        } else {
            ErrorType::TlsHandshakeError
        };
        tally.failure("Certificate fetch", message, kind);
    }
}

pub(crate) fn tally_blacklist(report: &BlacklistDiagnostics, tally: &Tally<'_>) {
    for address in &report.addresses {
        for result in &address.results {
            tally.count(
                &format!("{} lookup for {}", result.provider, address.ip),
                result.error.as_ref(),
                ErrorType::DnsblLookupError,
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timeouts_are_classified_first() {
        assert_eq!(
            classify("DNSBL lookup timed out after 50ms", ErrorType::DnsblLookupError),
            ErrorType::ProbeTimeout
        );
        assert_eq!(
            classify("DNSBL lookup failed: SERVFAIL", ErrorType::DnsblLookupError),
            ErrorType::DnsblLookupError
        );
    }

    #[test]
    fn test_each_failure_is_counted_and_logged() {
        let stats = ProbeStats::new();
        let events = EventLog::new();
        let tally = Tally::new(&stats, &events);

        tally.failure(
            "SMTPS check on mx.example.com",
            "connection timed out after 5000ms",
            ErrorType::SmtpTlsError,
        );
        let servfail = "server answered SERVFAIL".to_string();
        tally.count("DMARC lookup", Some(&servfail), ErrorType::DnsLookupError);
        tally.count("MX lookup", None, ErrorType::DnsLookupError);

        assert_eq!(stats.total_errors(), 2);
        let logged = events.snapshot();
        assert_eq!(logged.len(), 2);
        assert!(logged.iter().all(|e| e.kind == EventKind::Warning));
        assert_eq!(
            logged[0].message,
            "SMTPS check on mx.example.com timed out: connection timed out after 5000ms"
        );
        assert_eq!(logged[0].details.as_ref().unwrap()["errorType"], "Probe timeout");
        assert_eq!(logged[1].message, "DMARC lookup failed: server answered SERVFAIL");
        assert_eq!(logged[1].details.as_ref().unwrap()["probe"], "DMARC lookup");
    }
}
