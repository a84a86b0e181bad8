//! DNS resolver initialization.
//!
//! This module builds the shared system resolver and the single-server
//! resolvers used to query one public recursive resolver directly.

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use trust_dns_resolver::config::{NameServerConfigGroup, ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

use crate::config::DNS_PORT;
use crate::error_handling::InitializationError;

fn resolver_opts(timeout: Duration) -> ResolverOpts {
    let mut opts = ResolverOpts::default();
    opts.timeout = timeout;
    opts.attempts = 1; // failed probes are reported, never retried
    // Prevent search domain appending; every name we query is fully qualified
    opts.ndots = 0;
    opts
}

/// Initializes the shared DNS resolver for record lookups.
///
/// Uses the default configuration (Google Public DNS) with one attempt per
/// query so a dead resolver surfaces as a per-probe error rather than a
/// long stall.
///
/// # Errors
///
/// Returns `InitializationError::DnsResolverError` if `timeout` is zero.
pub fn init_resolver(timeout: Duration) -> Result<Arc<TokioAsyncResolver>, InitializationError> {
    if timeout.is_zero() {
        return Err(InitializationError::DnsResolverError(
            "resolver timeout must be non-zero".to_string(),
        ));
    }
    Ok(Arc::new(TokioAsyncResolver::tokio(
        ResolverConfig::default(),
        resolver_opts(timeout),
    )))
}

/// Builds a resolver that talks to exactly one recursive server over UDP/TCP.
///
/// Used by the propagation check so each public resolver is measured on its
/// own, without the shared resolver's cache in between.
pub fn resolver_for_server(ip: IpAddr, timeout: Duration) -> TokioAsyncResolver {
    resolver_for_addr(SocketAddr::new(ip, DNS_PORT), timeout)
}

/// Same as [`resolver_for_server`] for a server on a non-standard port.
///
/// Every answer comes from that server; the local hosts file is not consulted.
pub fn resolver_for_addr(addr: SocketAddr, timeout: Duration) -> TokioAsyncResolver {
    let group = NameServerConfigGroup::from_ips_clear(&[addr.ip()], addr.port(), true);
    let config = ResolverConfig::from_parts(None, Vec::new(), group);
    let mut opts = resolver_opts(timeout);
    opts.cache_size = 0;
    opts.use_hosts_file = false;
    TokioAsyncResolver::tokio(config, opts)
}
