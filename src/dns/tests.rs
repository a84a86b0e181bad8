//! DNS module tests against live resolvers.
//!
//! These need network access and are ignored by default:
//! `cargo test -- --ignored` runs them.

use super::*;
use std::time::Duration;
use trust_dns_resolver::config::{ResolverConfig, ResolverOpts};
use trust_dns_resolver::TokioAsyncResolver;

use crate::config::DiagnosticsConfig;

/// Creates a test DNS resolver with short timeouts for faster test execution.
fn create_test_resolver() -> TokioAsyncResolver {
    let mut opts = ResolverOpts::default();
    opts.timeout = Duration::from_secs(5);
    opts.attempts = 1; // Single attempt for faster failures in tests
    opts.ndots = 0;

    TokioAsyncResolver::tokio(ResolverConfig::default(), opts)
}

const TIMEOUT: Duration = Duration::from_secs(5);

#[tokio::test]
#[ignore]
async fn test_lookup_ns_records_success() {
    let resolver = create_test_resolver();
    let nameservers = lookup_ns_records(&resolver, "google.com", TIMEOUT)
        .await
        .expect("NS lookup should succeed for google.com");
    assert!(!nameservers.is_empty(), "google.com should have nameservers");
    for ns in &nameservers {
        assert!(ns.contains('.'));
        assert!(!ns.ends_with('.'), "trailing root dot should be stripped");
    }
}

#[tokio::test]
#[ignore]
async fn test_lookup_nonexistent_domain_is_empty_not_error() {
    let resolver = create_test_resolver();
    let txt = lookup_txt_records(&resolver, "definitely-does-not-exist-12345.invalid", TIMEOUT)
        .await
        .expect("NXDOMAIN is an empty result");
    assert!(txt.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_lookup_mx_sorted_by_priority() {
    let resolver = create_test_resolver();
    let mx = lookup_mx_records(&resolver, "gmail.com", TIMEOUT).await.unwrap();
    assert!(!mx.is_empty());
    assert!(mx.windows(2).all(|w| w[0].priority <= w[1].priority));
}

#[tokio::test]
#[ignore]
async fn test_lookup_with_ttl_reads_ttl() {
    let resolver = create_test_resolver();
    let config = DiagnosticsConfig::default();
    let result = lookup_with_ttl(&resolver, &config, "example.com", RecordKind::A).await;
    let lookup = result.data.expect("A lookup for example.com");
    assert!(!lookup.records.is_empty());
    assert!(lookup.ttl.is_some());
}

#[tokio::test]
#[ignore]
async fn test_example_com_has_no_dmarc() {
    let resolver = create_test_resolver();
    let dmarc = lookup_dmarc(&resolver, "example.com", TIMEOUT).await.unwrap();
    assert_eq!(dmarc.count, 0);
    assert!(!dmarc.valid);
    assert!(dmarc.dmarc_records.is_empty());
}

#[tokio::test]
#[ignore]
async fn test_reverse_lookup_google_dns() {
    let resolver = create_test_resolver();
    let name = reverse_dns_lookup("8.8.8.8".parse().unwrap(), &resolver, TIMEOUT)
        .await
        .unwrap();
    assert_eq!(name.as_deref(), Some("dns.google"));
    assert!(forward_confirmed("dns.google", "8.8.8.8".parse().unwrap(), &resolver, TIMEOUT).await);
}

#[tokio::test]
#[ignore]
async fn test_nameservers_answer_authoritatively() {
    let resolver = create_test_resolver();
    let config = DiagnosticsConfig::default();
    let results = test_nameservers(&resolver, &config, "cloudflare.com").await.unwrap();
    assert!(!results.is_empty());
    assert!(results.iter().any(|r| r.authoritative));
    assert!(results.iter().all(|r| r.provider == DnsProvider::Cloudflare));
}

#[tokio::test]
#[ignore]
async fn test_dnssec_enabled_for_signed_zone() {
    let config = DiagnosticsConfig::default();
    let status = check_dnssec(config.raw_query_resolver, "cloudflare.com", TIMEOUT).await;
    assert!(status.enabled, "{status:?}");
}
