//! Per-provider DNSBL lookups.
//!
//! A listed address resolves under the provider's zone; NXDOMAIN means not
//! listed. Resolution failure is therefore the usual outcome and is not an
//! error unless it is something other than "no such name".

use std::future::Future;
use std::net::{IpAddr, Ipv4Addr};
use std::time::{Duration, Instant};

use chrono::{DateTime, Utc};
use serde::Serialize;
use trust_dns_resolver::error::ResolveErrorKind;
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::TokioAsyncResolver;

use super::providers::DnsblProvider;
use crate::dns::wire::rcode_name;
use crate::error_handling::DnsblError;
use crate::utils::duration_to_ms;

/// Resolves DNSBL query names to their A records.
///
/// Implemented for the shared resolver; tests substitute a scripted one.
pub trait DnsblResolver: Sync {
    /// A records of `name`, or why there are none.
    fn lookup_ipv4(
        &self,
        name: &str,
    ) -> impl Future<Output = Result<Vec<Ipv4Addr>, DnsblError>> + Send;
}

impl DnsblResolver for TokioAsyncResolver {
    async fn lookup_ipv4(&self, name: &str) -> Result<Vec<Ipv4Addr>, DnsblError> {
        // Fully qualified so no search domain is appended
        let fqdn = format!("{name}.");
        match self.ipv4_lookup(fqdn.as_str()).await {
            Ok(lookup) => Ok(lookup.iter().map(|a| a.0).collect()),
            Err(e) => match e.kind() {
                // NXDOMAIN, or NOERROR with no A record, is the "not listed" answer
                ResolveErrorKind::NoRecordsFound {
                    response_code: ResponseCode::NXDomain | ResponseCode::NoError,
                    ..
                } => Err(DnsblError::NotListed),
                ResolveErrorKind::NoRecordsFound { response_code, .. } => {
                    Err(DnsblError::Lookup(format!("{name}: {}", rcode_name(*response_code))))
                }
                _ => Err(DnsblError::Lookup(e.to_string())),
            },
        }
    }
}

/// Reversed-address label sequence for DNSBL queries.
///
/// IPv4 reverses the octets (`192.0.2.1` → `1.2.0.192`); IPv6 reverses the
/// 32 nibbles of the expanded address.
pub fn reversed_address(ip: IpAddr) -> String {
    match ip {
        IpAddr::V4(v4) => {
            let [a, b, c, d] = v4.octets();
            format!("{d}.{c}.{b}.{a}")
        }
        IpAddr::V6(v6) => v6
            .octets()
            .iter()
            .rev()
            .flat_map(|byte| [byte & 0x0f, byte >> 4])
            .map(|nibble| format!("{nibble:x}"))
            .collect::<Vec<String>>()
            .join("."),
    }
}

/// Name queried for `ip` in `zone`.
pub fn lookup_name(ip: IpAddr, zone: &str) -> String {
    format!("{}.{}", reversed_address(ip), zone)
}

/// Outcome of checking one address against one provider.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProviderCheckResult {
    /// Provider display name.
    pub provider: &'static str,
    /// Provider zone.
    pub host: &'static str,
    /// What the provider lists.
    pub description: &'static str,
    /// Provider reliability, 0 to 10.
    pub reliability: u8,
    /// The address is listed.
    pub listed: bool,
    /// Lookup time.
    pub response_time_ms: f64,
    /// Name that was queried.
    pub lookup_name: String,
    /// Listing reason from the provider's code table.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub listing_details: Option<&'static str>,
    /// Returned address, e.g. `127.0.0.2`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_code: Option<String>,
    /// Lookup failure other than "not listed".
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
}

impl ProviderCheckResult {
    /// Entry for a provider that did not answer inside the group budget.
    pub fn timed_out(provider: &DnsblProvider, ip: IpAddr, budget: Duration) -> Self {
        ProviderCheckResult {
            provider: provider.name,
            host: provider.host,
            description: provider.description,
            reliability: provider.reliability,
            listed: false,
            response_time_ms: duration_to_ms(budget),
            lookup_name: lookup_name(ip, provider.host),
            listing_details: None,
            response_code: None,
            error: Some(
                DnsblError::Timeout {
                    after_ms: budget.as_millis() as u64,
                }
                .to_string(),
            ),
            timestamp: Utc::now(),
        }
    }
}

/// Checks `ip` against one provider.
///
/// Never fails: NXDOMAIN gives `listed: false` with no error; a timeout or
/// any other resolver failure gives `listed: false` with the error kept.
pub async fn check_provider<R: DnsblResolver>(
    resolver: &R,
    provider: &DnsblProvider,
    ip: IpAddr,
    timeout: Duration,
) -> ProviderCheckResult {
    let name = lookup_name(ip, provider.host);
    let start = Instant::now();
    let outcome = match tokio::time::timeout(timeout, resolver.lookup_ipv4(&name)).await {
        Ok(result) => result,
        Err(_) => Err(DnsblError::Timeout {
            after_ms: timeout.as_millis() as u64,
        }),
    };
    let response_time_ms = duration_to_ms(start.elapsed());

    let (listed, listing_details, response_code, error) = match outcome {
        Ok(addresses) => match addresses.first() {
            Some(&code) => {
                log::info!("{ip} is listed by {} ({code})", provider.name);
                (
                    true,
                    Some(provider.listing_reason(code)),
                    Some(code.to_string()),
                    None,
                )
            }
            None => (false, None, None, None),
        },
        Err(DnsblError::NotListed) => (false, None, None, None),
        Err(e) => {
            log::debug!("DNSBL lookup {name} failed: {e}");
            (false, None, None, Some(e.to_string()))
        }
    };

    ProviderCheckResult {
        provider: provider.name,
        host: provider.host,
        description: provider.description,
        reliability: provider.reliability,
        listed,
        response_time_ms,
        lookup_name: name,
        listing_details,
        response_code,
        error,
        timestamp: Utc::now(),
    }
}
