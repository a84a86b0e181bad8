//! Authoritative nameserver testing.
//!
//! Each NS host of a domain is resolved to an address and then asked for the
//! domain's SOA directly, without recursion, to measure its latency and
//! check that it answers authoritatively. Nameservers are tested
//! independently; one failing never hides the others' results.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use serde::Serialize;
use trust_dns_resolver::proto::rr::RecordType;
use trust_dns_resolver::TokioAsyncResolver;

use super::raw::raw_query;
use super::records::lookup_ns_records;
use super::resolution::resolve_host_to_ip;
use super::wire::rcode_name;
use crate::config::{DiagnosticsConfig, DNS_PORT};
use crate::error_handling::ProbeError;
use crate::utils::{duration_to_ms, join_all_within};

/// Operator of a nameserver, inferred from its hostname.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DnsProvider {
    /// Google Cloud DNS / Google Domains
    Google,
    /// Cloudflare
    Cloudflare,
    /// Amazon Route 53
    Route53,
    /// GoDaddy
    GoDaddy,
    /// Namecheap
    Namecheap,
    /// No known fragment matched
    Unknown,
}

/// Hostname fragments identifying each provider, matched case-insensitively.
static PROVIDER_FRAGMENTS: &[(&str, DnsProvider)] = &[
    ("googledomains.com", DnsProvider::Google),
    ("google.com", DnsProvider::Google),
    ("cloudflare.com", DnsProvider::Cloudflare),
    ("awsdns", DnsProvider::Route53),
    ("domaincontrol.com", DnsProvider::GoDaddy),
    ("registrar-servers.com", DnsProvider::Namecheap),
    ("namecheaphosting.com", DnsProvider::Namecheap),
];

/// Classifies a nameserver hostname by substring match.
pub fn classify_provider(nameserver: &str) -> DnsProvider {
    let lowered = nameserver.to_ascii_lowercase();
    PROVIDER_FRAGMENTS
        .iter()
        .find(|(fragment, _)| lowered.contains(fragment))
        .map(|(_, provider)| *provider)
        .unwrap_or(DnsProvider::Unknown)
}

/// Result of querying one nameserver directly.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NameserverResult {
    /// NS hostname.
    pub nameserver: String,
    /// Address the query was sent to.
    pub ip: Option<IpAddr>,
    /// Inferred operator.
    pub provider: DnsProvider,
    /// Whether the answer carried the AA flag.
    pub authoritative: bool,
    /// Response code name (`NOERROR`, `REFUSED`, ...).
    pub response_code: Option<String>,
    /// Number of answer records.
    pub answer_count: usize,
    /// Time spent resolving and querying this nameserver.
    pub response_time_ms: f64,
    /// Failure, if the nameserver could not be resolved or queried.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl NameserverResult {
    fn failed(nameserver: &str, ip: Option<IpAddr>, error: ProbeError, elapsed: Duration) -> Self {
        NameserverResult {
            nameserver: nameserver.to_string(),
            ip,
            provider: classify_provider(nameserver),
            authoritative: false,
            response_code: None,
            answer_count: 0,
            response_time_ms: duration_to_ms(elapsed),
            error: Some(error.to_string()),
        }
    }
}

/// Sends a non-recursive SOA query for `domain` to `server`.
pub async fn query_nameserver(
    nameserver: &str,
    server: SocketAddr,
    domain: &str,
    timeout: Duration,
) -> NameserverResult {
    let start = Instant::now();
    match raw_query(server, domain, RecordType::SOA, false, timeout).await {
        Ok(message) => NameserverResult {
            nameserver: nameserver.to_string(),
            ip: Some(server.ip()),
            provider: classify_provider(nameserver),
            authoritative: message.authoritative(),
            response_code: Some(rcode_name(message.response_code()).to_string()),
            answer_count: message.answers().len(),
            response_time_ms: duration_to_ms(start.elapsed()),
            error: None,
        },
        Err(e) => NameserverResult::failed(nameserver, Some(server.ip()), e.into(), start.elapsed()),
    }
}

async fn test_one(
    nameserver: String,
    domain: &str,
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
) -> NameserverResult {
    let start = Instant::now();
    let ip = match resolve_host_to_ip(&nameserver, resolver, config.dns_timeout).await {
        Ok(ip) => ip,
        Err(e) => {
            log::warn!("Could not resolve nameserver {nameserver}: {e}");
            return NameserverResult::failed(&nameserver, None, e, start.elapsed());
        }
    };
    let mut result = query_nameserver(
        &nameserver,
        SocketAddr::new(ip, DNS_PORT),
        domain,
        config.raw_dns_timeout,
    )
    .await;
    // Report the full cost, resolution included
    result.response_time_ms = duration_to_ms(start.elapsed());
    result
}

/// Tests every authoritative nameserver of `domain`.
///
/// # Errors
///
/// Fails only when the NS lookup itself fails or returns nothing; per-server
/// failures are recorded in the returned results.
pub async fn test_nameservers(
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
    domain: &str,
) -> Result<Vec<NameserverResult>, ProbeError> {
    let nameservers = lookup_ns_records(resolver, domain, config.dns_timeout).await?;
    if nameservers.is_empty() {
        return Err(ProbeError::NotFound(format!("No NS records found for {domain}")));
    }

    let budget = config.dns_timeout + config.raw_dns_timeout;
    let probes: Vec<_> = nameservers
        .iter()
        .cloned()
        .map(|ns| test_one(ns, domain, resolver, config))
        .collect();
    let results = join_all_within(probes, budget, |i| {
        NameserverResult::failed(
            &nameservers[i],
            None,
            ProbeError::Timeout {
                operation: format!("Nameserver test for {}", nameservers[i]),
                after_ms: budget.as_millis() as u64,
            },
            budget,
        )
    })
    .await;
    Ok(results)
}
