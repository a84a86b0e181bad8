//! IP address resolution and reverse DNS lookup.
//!
//! This module provides functions to resolve hostnames to IP addresses,
//! perform reverse DNS lookups (PTR records), and check that a PTR name
//! resolves back to the address it came from.

use std::net::IpAddr;
use std::time::Duration;

use trust_dns_resolver::TokioAsyncResolver;

use super::records::{is_no_records, resolve_failure};
use crate::error_handling::ProbeError;

/// Resolves a hostname to all of its addresses (A and AAAA).
///
/// # Errors
///
/// Returns `ProbeError::NotFound` when the name has no addresses, or a
/// transport/timeout error when resolution fails.
pub async fn resolve_host(
    host: &str,
    resolver: &TokioAsyncResolver,
    timeout: Duration,
) -> Result<Vec<IpAddr>, ProbeError> {
    let response = resolver
        .lookup_ip(host)
        .await
        .map_err(|e| resolve_failure(&format!("Resolving {host}"), e, timeout))?;
    let ips: Vec<IpAddr> = response.iter().collect();
    if ips.is_empty() {
        return Err(ProbeError::NotFound(format!("No IP addresses found for {host}")));
    }
    Ok(ips)
}

/// Resolves a hostname and prefers an IPv4 address when there is one.
pub async fn resolve_host_to_ip(
    host: &str,
    resolver: &TokioAsyncResolver,
    timeout: Duration,
) -> Result<IpAddr, ProbeError> {
    let ips = resolve_host(host, resolver, timeout).await?;
    let preferred = ips.iter().find(|ip| ip.is_ipv4()).unwrap_or(&ips[0]);
    Ok(*preferred)
}

/// Performs a reverse DNS lookup (PTR record) for an IP address.
///
/// Returns `Ok(None)` when the address has no PTR record.
pub async fn reverse_dns_lookup(
    ip: IpAddr,
    resolver: &TokioAsyncResolver,
    timeout: Duration,
) -> Result<Option<String>, ProbeError> {
    match resolver.reverse_lookup(ip).await {
        Ok(response) => Ok(response
            .iter()
            .next()
            .map(|ptr| ptr.to_utf8().trim_end_matches('.').to_string())),
        Err(e) if is_no_records(&e) => Ok(None),
        Err(e) => {
            log::warn!("Failed to perform reverse DNS lookup for {ip}: {e}");
            Err(resolve_failure(&format!("Reverse lookup for {ip}"), e, timeout))
        }
    }
}

/// Whether `ptr_name` resolves forward to `ip` (forward-confirmed reverse DNS).
pub async fn forward_confirmed(
    ptr_name: &str,
    ip: IpAddr,
    resolver: &TokioAsyncResolver,
    timeout: Duration,
) -> bool {
    match resolve_host(ptr_name, resolver, timeout).await {
        Ok(ips) => ips.contains(&ip),
        Err(e) => {
            log::debug!("Forward confirmation of {ptr_name} for {ip} failed: {e}");
            false
        }
    }
}
