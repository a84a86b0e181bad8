//! Full DNS report for one target.

use std::net::IpAddr;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use trust_dns_resolver::TokioAsyncResolver;

use super::dnssec::{check_dnssec, DnssecStatus};
use super::extract::{categorize_txt, lookup_dmarc, spf_report, DmarcReport, SpfReport, TxtCategories};
use super::nameservers::{test_nameservers, NameserverResult};
use super::propagation::{check_propagation, PropagationReport};
use super::records::{lookup_with_ttl, RecordKind, RecordLookup, RecordValue};
use super::resolution::{forward_confirmed, reverse_dns_lookup};
use crate::config::DiagnosticsConfig;
use crate::error_handling::{DiagnosticError, ProbeError};
use crate::target::ProbeTarget;
use crate::utils::{duration_to_ms, timed, TimedResult};

/// PTR lookup of an IP target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReverseDns {
    /// Address looked up.
    pub ip: IpAddr,
    /// PTR name, when one exists.
    pub hostname: Option<String>,
    /// The PTR name resolves back to `ip`.
    pub forward_confirmed: bool,
}

/// Everything the DNS category reports.
///
/// Domain targets fill the record, nameserver, propagation, DNSSEC and
/// mail-policy sections; IP targets fill only `reverseDns`. Sections that
/// do not apply are `null`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsDiagnostics {
    /// Target as given.
    pub target: String,
    /// One lookup per standard record type.
    pub records: Vec<TimedResult<RecordLookup>>,
    /// Direct queries to each authoritative nameserver.
    pub nameservers: Option<TimedResult<Vec<NameserverResult>>>,
    /// A record presence across public resolvers.
    pub propagation: Option<PropagationReport>,
    /// DNSKEY/DS presence.
    pub dnssec: Option<DnssecStatus>,
    /// SPF records parsed from the TXT lookup.
    pub spf: Option<TimedResult<SpfReport>>,
    /// DMARC records at `_dmarc.<domain>`.
    pub dmarc: Option<TimedResult<DmarcReport>>,
    /// TXT records by purpose.
    pub txt_categories: Option<TxtCategories>,
    /// PTR lookup for IP targets.
    pub reverse_dns: Option<TimedResult<ReverseDns>>,
    /// Wall time of the whole category.
    pub response_time_ms: f64,
}

impl DnsDiagnostics {
    fn empty(target: String) -> Self {
        DnsDiagnostics {
            target,
            records: Vec::new(),
            nameservers: None,
            propagation: None,
            dnssec: None,
            spf: None,
            dmarc: None,
            txt_categories: None,
            reverse_dns: None,
            response_time_ms: 0.0,
        }
    }

    /// Record lookup of `kind`, if it was part of the report.
    pub fn lookup(&self, kind: RecordKind) -> Option<&TimedResult<RecordLookup>> {
        self.records
            .iter()
            .find(|r| r.data.as_ref().is_some_and(|l| l.record_type == kind))
    }
}

fn txt_strings(lookup: &RecordLookup) -> Vec<String> {
    lookup
        .records
        .iter()
        .filter_map(|value| match value {
            RecordValue::Txt(txt) => Some(txt.clone()),
            _ => None,
        })
        .collect()
}

async fn reverse_dns(
    ip: IpAddr,
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
) -> Result<ReverseDns, ProbeError> {
    let hostname = reverse_dns_lookup(ip, resolver, config.dns_timeout).await?;
    let confirmed = match &hostname {
        Some(name) => forward_confirmed(name, ip, resolver, config.dns_timeout).await,
        None => false,
    };
    Ok(ReverseDns {
        ip,
        hostname,
        forward_confirmed: confirmed,
    })
}

/// Runs every DNS check for `target` concurrently.
///
/// # Errors
///
/// Returns `DiagnosticError::Resolver` when every record lookup of a domain
/// failed, which means the resolver itself is unusable. Individual failures
/// are kept inside the report.
pub async fn run_dns_diagnostics(
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
    target: &ProbeTarget,
) -> Result<DnsDiagnostics, DiagnosticError> {
    let start = Instant::now();
    let mut report = DnsDiagnostics::empty(target.host());

    let domain = match target {
        ProbeTarget::Ip(ip) => {
            log::info!("Running reverse DNS for {ip}");
            report.reverse_dns = Some(
                timed(
                    "Reverse DNS lookup",
                    config.dns_timeout * 2,
                    reverse_dns(*ip, resolver, config),
                )
                .await,
            );
            report.response_time_ms = duration_to_ms(start.elapsed());
            return Ok(report);
        }
        ProbeTarget::Domain(domain) => domain.as_str(),
    };
    log::info!("Running DNS diagnostics for {domain}");

    let record_lookups = join_all(
        RecordKind::STANDARD
            .iter()
            .map(|kind| lookup_with_ttl(resolver, config, domain, *kind)),
    );
    let nameservers = async {
        let begin = Instant::now();
        match test_nameservers(resolver, config, domain).await {
            Ok(results) => TimedResult::success(results, begin.elapsed()),
            Err(e) => TimedResult::failure(e, begin.elapsed()),
        }
    };
    let (records, nameservers, propagation, dnssec, dmarc) = tokio::join!(
        record_lookups,
        nameservers,
        check_propagation(config, domain),
        check_dnssec(config.raw_query_resolver, domain, config.raw_dns_timeout),
        timed(
            "DMARC lookup",
            config.dns_timeout,
            lookup_dmarc(resolver, domain, config.dns_timeout)
        ),
    );

    if records.iter().all(|r| !r.is_success()) {
        let reason = records
            .iter()
            .find_map(|r| r.error.clone())
            .unwrap_or_else(|| "no lookups ran".to_string());
        log::error!("Every record lookup for {domain} failed: {reason}");
        return Err(DiagnosticError::Resolver(reason));
    }

    // SPF and TXT categories are read from the TXT lookup already made
    let txt = RecordKind::STANDARD
        .iter()
        .position(|k| *k == RecordKind::Txt)
        .and_then(|i| records.get(i))
        .cloned();
    if let Some(txt) = txt {
        report.txt_categories = txt.data.as_ref().map(|l| categorize_txt(&txt_strings(l)));
        report.spf = Some(txt.map(|l| spf_report(&txt_strings(&l))));
    }

    report.records = records;
    report.nameservers = Some(nameservers);
    report.propagation = Some(propagation);
    report.dnssec = Some(dnssec);
    report.dmarc = Some(dmarc);
    report.response_time_ms = duration_to_ms(start.elapsed());
    Ok(report)
}
