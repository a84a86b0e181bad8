//! DNSBL reputation checks.
//!
//! This module provides:
//! - The static provider table with per-provider response-code meanings
//! - Reverse-address lookups against each provider
//! - A reliability-weighted score and risk band
//!
//! Domain targets are resolved to their IPv4 addresses first; every address
//! is checked against every provider and reported on its own, with an
//! aggregate across all of them.

mod lookup;
mod providers;
mod scoring;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::net::IpAddr;
use std::time::Instant;

use futures::future::join_all;
use serde::Serialize;
use trust_dns_resolver::TokioAsyncResolver;

use crate::config::DiagnosticsConfig;
use crate::dns::lookup_ipv4_records;
use crate::error_handling::DiagnosticError;
use crate::target::ProbeTarget;
use crate::utils::{duration_to_ms, join_all_within};

pub use lookup::{check_provider, lookup_name, reversed_address, DnsblResolver, ProviderCheckResult};
pub use providers::{DnsblProvider, DNSBL_PROVIDERS, UNKNOWN_LISTING};
pub use scoring::{reliability_score, risk_level, BlacklistSummary, RiskBand, RiskLevel};

/// Every provider's verdict on one address.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AddressReport {
    /// Address checked.
    pub ip: IpAddr,
    /// One entry per provider, in table order.
    pub results: Vec<ProviderCheckResult>,
    /// Score and risk for this address.
    pub summary: BlacklistSummary,
}

/// Reputation of a target across all of its addresses.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BlacklistDiagnostics {
    /// Target as given.
    pub target: String,
    /// Per-address detail.
    pub addresses: Vec<AddressReport>,
    /// Aggregate across every address and provider.
    pub overall: BlacklistSummary,
    /// Wall time of the whole run.
    pub response_time_ms: f64,
}

/// Checks one address against every provider concurrently.
pub async fn check_address<R: DnsblResolver>(
    resolver: &R,
    providers: &[DnsblProvider],
    ip: IpAddr,
    config: &DiagnosticsConfig,
) -> AddressReport {
    let probes = providers
        .iter()
        .map(|provider| check_provider(resolver, provider, ip, config.dnsbl_timeout))
        .collect();
    let results = join_all_within(probes, config.dnsbl_group_timeout, |index| {
        ProviderCheckResult::timed_out(&providers[index], ip, config.dnsbl_group_timeout)
    })
    .await;
    let summary = BlacklistSummary::from_results(&results);
    log::info!(
        "{ip}: listed by {} of {} providers, score {}",
        summary.listed_count,
        summary.total_checks,
        summary.reliability_score
    );
    AddressReport {
        ip,
        results,
        summary,
    }
}

/// Checks a set of addresses and aggregates them.
pub async fn check_addresses<R: DnsblResolver>(
    resolver: &R,
    providers: &[DnsblProvider],
    target: &str,
    ips: &[IpAddr],
    config: &DiagnosticsConfig,
) -> BlacklistDiagnostics {
    let start = Instant::now();
    let addresses = join_all(
        ips.iter()
            .map(|&ip| check_address(resolver, providers, ip, config)),
    )
    .await;
    let overall = BlacklistSummary::from_results(addresses.iter().flat_map(|a| a.results.iter()));
    BlacklistDiagnostics {
        target: target.to_string(),
        addresses,
        overall,
        response_time_ms: duration_to_ms(start.elapsed()),
    }
}

/// Checks an IP, or every A record of a domain, against the provider table.
///
/// # Errors
///
/// Returns `DiagnosticError::NotFound` when a domain has no A records, and
/// the resolver failure when the A lookup itself fails.
pub async fn run_blacklist_diagnostics(
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
    target: &ProbeTarget,
) -> Result<BlacklistDiagnostics, DiagnosticError> {
    let ips: Vec<IpAddr> = match target {
        ProbeTarget::Ip(ip) => vec![*ip],
        ProbeTarget::Domain(domain) => {
            let addresses =
                lookup_ipv4_records(resolver, domain.as_str(), config.dns_timeout).await?;
            if addresses.is_empty() {
                return Err(DiagnosticError::NotFound(format!(
                    "No A records found for {}",
                    domain.as_str()
                )));
            }
            addresses.into_iter().map(IpAddr::V4).collect()
        }
    };
    log::info!(
        "Checking {} address(es) of {} against {} DNSBL providers",
        ips.len(),
        target.host(),
        DNSBL_PROVIDERS.len()
    );
    Ok(check_addresses(resolver, DNSBL_PROVIDERS, &target.host(), &ips, config).await)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error_handling::DnsblError;
    use std::net::Ipv4Addr;
    use std::time::Duration;
    use super::test_helpers::{MockDnsbl, TEST_PROVIDER};

    #[tokio::test]
    async fn test_single_listing_is_not_low_risk() {
        let resolver = MockDnsbl::answering(Ok(vec![Ipv4Addr::new(127, 0, 0, 2)]));
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        let report = check_addresses(
            &resolver,
            std::slice::from_ref(&TEST_PROVIDER),
            "192.0.2.1",
            &[ip],
            &DiagnosticsConfig::default(),
        )
        .await;

        let result = &report.addresses[0].results[0];
        assert!(result.listed);
        assert_eq!(result.listing_details, Some("Listed in Test"));
        assert_eq!(result.response_code.as_deref(), Some("127.0.0.2"));
        assert_eq!(report.overall.reliability_score, 50);
        assert_ne!(report.overall.risk_level.level, RiskBand::Low);
    }

    #[tokio::test]
    async fn test_clean_address_against_full_table() {
        let resolver = MockDnsbl::answering(Err(DnsblError::NotListed));
        let ip: IpAddr = "198.51.100.7".parse().unwrap();
        let report = check_address(&resolver, DNSBL_PROVIDERS, ip, &DiagnosticsConfig::default()).await;
        assert_eq!(report.results.len(), DNSBL_PROVIDERS.len());
        assert!(report.results.iter().all(|r| !r.listed && r.error.is_none()));
        assert_eq!(report.summary.reliability_score, 100);
        assert_eq!(report.summary.risk_level.level, RiskBand::Low);
        assert_eq!(report.results[0].provider, "Spamhaus ZEN");
    }

    #[tokio::test]
    async fn test_group_budget_synthesizes_timeouts() {
        let resolver = MockDnsbl::stalling();
        let config = DiagnosticsConfig {
            dnsbl_timeout: Duration::from_secs(30),
            dnsbl_group_timeout: Duration::from_millis(100),
            ..DiagnosticsConfig::default()
        };
        let ip: IpAddr = "192.0.2.1".parse().unwrap();
        let report = check_address(&resolver, DNSBL_PROVIDERS, ip, &config).await;
        assert_eq!(report.results.len(), DNSBL_PROVIDERS.len());
        assert_eq!(report.summary.error_count, DNSBL_PROVIDERS.len());
        assert_eq!(
            report.results[3].error.as_deref(),
            Some("DNSBL lookup timed out after 100ms")
        );
    }

    #[tokio::test]
    async fn test_overall_spans_addresses() {
        let resolver = MockDnsbl::answering(Ok(vec![Ipv4Addr::new(127, 0, 0, 2)]));
        let ips: Vec<IpAddr> = vec!["192.0.2.1".parse().unwrap(), "192.0.2.2".parse().unwrap()];
        let report = check_addresses(
            &resolver,
            std::slice::from_ref(&TEST_PROVIDER),
            "example.test",
            &ips,
            &DiagnosticsConfig::default(),
        )
        .await;
        assert_eq!(report.addresses.len(), 2);
        assert_eq!(report.overall.total_checks, 2);
        assert_eq!(report.overall.listed_count, 2);
        assert_eq!(report.overall.reliability_score, 0);
    }
}
