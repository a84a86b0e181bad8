//! Diagnostics against the public internet.
//!
//! These need working DNS and outbound ports 25, 443 and 53, so they are
//! ignored by default. Run with `cargo test -- --ignored`.

use domain_diagnostics::{DiagnosticEngine, DiagnosticsConfig, ProbeTarget};

fn engine() -> DiagnosticEngine {
    DiagnosticEngine::new(DiagnosticsConfig::default()).expect("engine should initialize")
}

#[tokio::test]
#[ignore]
async fn live_dns_report_for_example_com() {
    let target = ProbeTarget::parse("example.com").unwrap();
    let report = engine().dns_report(&target).await.unwrap();

    assert_eq!(report.category, "dns");
    assert!(report.results.records.iter().any(|r| r.is_success()));

    let dmarc = report.results.dmarc.as_ref().unwrap();
    if let Some(dmarc) = &dmarc.data {
        assert_eq!(dmarc.count, dmarc.dmarc_records.len());
        assert_eq!(dmarc.valid, dmarc.count == 1);
    }
}

#[tokio::test]
#[ignore]
async fn live_ssl_report_for_example_com() {
    let target = ProbeTarget::parse("example.com").unwrap();
    let report = engine().ssl_report(&target, 443).await.unwrap();

    assert!(report.results.certificate.is_success());
    assert!(report.results.security.score <= 100);
}

#[tokio::test]
#[ignore]
async fn live_blacklist_report_for_documentation_address() {
    let target = ProbeTarget::parse("192.0.2.1").unwrap();
    let report = engine().blacklist_report(&target).await.unwrap();

    let address = &report.results.addresses[0];
    assert_eq!(
        address.results.len(),
        domain_diagnostics::blacklist::DNSBL_PROVIDERS.len()
    );
}

#[tokio::test]
#[ignore]
async fn live_full_report_keeps_every_category() {
    let target = ProbeTarget::parse("gmail.com").unwrap();
    let report = engine().full_report(&target, 443).await;

    let json = serde_json::to_value(&report).unwrap();
    for category in ["dns", "smtp", "ssl", "blacklist"] {
        assert!(json["results"].get(category).is_some(), "{category} missing");
    }
    assert!(!report.logs.is_empty());
}
