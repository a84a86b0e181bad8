//! Scripted DNSBL resolver for unit tests.

use std::net::Ipv4Addr;
use std::time::Duration;

use super::lookup::DnsblResolver;
use super::providers::DnsblProvider;
use crate::error_handling::DnsblError;

/// Single provider whose code 2 means "Listed in Test".
pub(crate) static TEST_PROVIDER: DnsblProvider = DnsblProvider {
    name: "Test",
    host: "dnsbl.example.test",
    description: "Test blocklist",
    reliability: 5,
    codes: &[(2, "Listed in Test")],
};

/// Answers every query with the same scripted outcome.
pub(crate) struct MockDnsbl {
    outcome: Option<Result<Vec<Ipv4Addr>, DnsblError>>,
}

impl MockDnsbl {
    pub(crate) fn answering(outcome: Result<Vec<Ipv4Addr>, DnsblError>) -> Self {
        MockDnsbl {
            outcome: Some(outcome),
        }
    }

    /// Never answers.
    pub(crate) fn stalling() -> Self {
        MockDnsbl { outcome: None }
    }
}

impl DnsblResolver for MockDnsbl {
    async fn lookup_ipv4(&self, _name: &str) -> Result<Vec<Ipv4Addr>, DnsblError> {
        match &self.outcome {
            Some(outcome) => outcome.clone(),
            None => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Err(DnsblError::NotListed)
            }
        }
    }
}
