//! Propagation check across public recursive resolvers.
//!
//! Each public resolver is queried directly for the domain's A records and
//! timed on its own. A resolver counts as propagated when its query
//! succeeded with at least one address; answers are not compared across
//! resolvers.

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::time::{Duration, Instant};

use serde::Serialize;
use trust_dns_resolver::TokioAsyncResolver;

use super::records::lookup_ipv4_records;
use crate::config::{DiagnosticsConfig, DNS_PORT, PUBLIC_RESOLVERS};
use crate::initialization::resolver_for_addr;
use crate::utils::{duration_to_ms, join_all_within};

/// Answer from one public resolver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolverAnswer {
    /// Resolver operator name.
    pub resolver: String,
    /// Resolver address.
    pub address: IpAddr,
    /// Whether the resolver returned the record.
    pub propagated: bool,
    /// A records returned.
    pub records: Vec<Ipv4Addr>,
    /// Query time.
    pub response_time_ms: f64,
    /// Failure, if the query did not succeed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Propagation across every public resolver.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PropagationReport {
    /// One entry per resolver, in resolver-list order.
    pub resolvers: Vec<ResolverAnswer>,
    /// Resolvers that returned the record.
    pub propagated_count: usize,
    /// Resolvers queried.
    pub total_resolvers: usize,
    /// True when every resolver returned the record.
    pub fully_propagated: bool,
}

impl PropagationReport {
    fn from_answers(resolvers: Vec<ResolverAnswer>) -> Self {
        let propagated_count = resolvers.iter().filter(|r| r.propagated).count();
        let total_resolvers = resolvers.len();
        PropagationReport {
            fully_propagated: total_resolvers > 0 && propagated_count == total_resolvers,
            resolvers,
            propagated_count,
            total_resolvers,
        }
    }
}

/// Queries one resolver for `domain`'s A records.
pub async fn query_resolver(
    name: &str,
    address: SocketAddr,
    resolver: &TokioAsyncResolver,
    domain: &str,
    timeout: Duration,
) -> ResolverAnswer {
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, lookup_ipv4_records(resolver, domain, timeout)).await;
    let elapsed = duration_to_ms(start.elapsed());
    let (records, error) = match result {
        Ok(Ok(records)) if records.is_empty() => {
            (Vec::new(), Some(format!("No A records for {domain}")))
        }
        Ok(Ok(records)) => (records, None),
        Ok(Err(e)) => (Vec::new(), Some(e.to_string())),
        Err(_) => (
            Vec::new(),
            Some(format!("{name} timed out after {}ms", timeout.as_millis())),
        ),
    };
    ResolverAnswer {
        resolver: name.to_string(),
        address: address.ip(),
        propagated: error.is_none(),
        records,
        response_time_ms: elapsed,
        error,
    }
}

/// Checks `domain` against every resolver in `targets` concurrently.
pub async fn check_propagation_with(
    targets: &[(&str, SocketAddr)],
    domain: &str,
    timeout: Duration,
) -> PropagationReport {
    let resolvers: Vec<TokioAsyncResolver> = targets
        .iter()
        .map(|(_, addr)| resolver_for_addr(*addr, timeout))
        .collect();
    let probes: Vec<_> = targets
        .iter()
        .zip(resolvers.iter())
        .map(|((name, addr), resolver)| query_resolver(name, *addr, resolver, domain, timeout))
        .collect();

    // Each query carries its own timeout; the group budget leaves headroom
    let budget = timeout + Duration::from_secs(1);
    let answers = join_all_within(probes, budget, |i| ResolverAnswer {
        resolver: targets[i].0.to_string(),
        address: targets[i].1.ip(),
        propagated: false,
        records: Vec::new(),
        response_time_ms: duration_to_ms(budget),
        error: Some(format!("{} timed out after {}ms", targets[i].0, budget.as_millis())),
    })
    .await;
    PropagationReport::from_answers(answers)
}

/// Checks `domain` against the public resolver list (Google, Cloudflare, Quad9, OpenDNS).
pub async fn check_propagation(config: &DiagnosticsConfig, domain: &str) -> PropagationReport {
    let targets: Vec<(&str, SocketAddr)> = PUBLIC_RESOLVERS
        .iter()
        .map(|(name, ip)| (*name, SocketAddr::new(*ip, DNS_PORT)))
        .collect();
    check_propagation_with(&targets, domain, config.dns_timeout).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::test_helpers::spawn_udp_responder;

    #[tokio::test]
    async fn test_unresponsive_resolvers_are_not_propagated() {
        let silent = spawn_udp_responder(|_| Vec::new()).await;
        let also_silent = spawn_udp_responder(|_| Vec::new()).await;
        let targets = [("Silent", silent), ("AlsoSilent", also_silent)];

        let report = check_propagation_with(&targets, "example.com", Duration::from_millis(200)).await;
        assert_eq!(report.total_resolvers, 2);
        assert_eq!(report.propagated_count, 0);
        assert!(!report.fully_propagated);
        assert_eq!(report.resolvers[0].resolver, "Silent");
        assert_eq!(report.resolvers[1].resolver, "AlsoSilent");
        for answer in &report.resolvers {
            assert!(!answer.propagated);
            assert!(answer.error.is_some());
        }
    }

    #[test]
    fn test_report_counts() {
        let answer = |propagated: bool| ResolverAnswer {
            resolver: "r".into(),
            address: IpAddr::V4(Ipv4Addr::LOCALHOST),
            propagated,
            records: Vec::new(),
            response_time_ms: 1.0,
            error: None,
        };
        let report = PropagationReport::from_answers(vec![answer(true), answer(true)]);
        assert!(report.fully_propagated);
        let report = PropagationReport::from_answers(vec![answer(true), answer(false)]);
        assert_eq!(report.propagated_count, 1);
        assert!(!report.fully_propagated);
        assert!(!PropagationReport::from_answers(Vec::new()).fully_propagated);
    }

    #[tokio::test]
    #[ignore] // requires network access
    async fn test_live_propagation() {
        let report = check_propagation(&DiagnosticsConfig::default(), "example.com").await;
        assert_eq!(report.total_resolvers, 4);
        assert!(report.propagated_count > 0);
    }
}
