//! DNS resolution, record querying and DNS health checks.
//!
//! This module provides async DNS operations using `trust-dns-resolver`
//! and a small raw codec for what the resolver does not expose:
//! - Typed record lookups (A, AAAA, MX, TXT, NS, SOA, CNAME, DNSKEY, DS)
//! - Answer TTLs read from a raw query
//! - Direct, non-recursive queries to each authoritative nameserver
//! - Propagation across public resolvers
//! - DNSSEC presence
//! - SPF/DMARC parsing and TXT categorization
//! - The combined DNS report for a domain or IP target

mod dnssec;
mod extract;
mod nameservers;
mod propagation;
mod raw;
mod records;
mod report;
mod resolution;
pub mod wire;

#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export public API
pub use dnssec::{check_dnssec, DnskeyRecord, DnssecStatus, DsRecord};
pub use extract::{
    categorize_txt, dmarc_report, lookup_dmarc, lookup_spf, parse_dmarc, parse_spf, spf_report,
    DmarcRecord, DmarcReport, SpfMechanism, SpfRecord, SpfReport, TxtCategories,
    VerificationRecord,
};
pub use nameservers::{classify_provider, query_nameserver, test_nameservers, DnsProvider, NameserverResult};
pub use propagation::{
    check_propagation, check_propagation_with, query_resolver, PropagationReport, ResolverAnswer,
};
pub use raw::{fetch_ttl, raw_query, RawQueryError};
pub use records::{
    lookup_ipv4_records, lookup_mx_records, lookup_ns_records, lookup_records, lookup_txt_records,
    lookup_with_ttl, MxRecord, RecordKind, RecordLookup, RecordValue, SoaRecord,
};
pub use report::{run_dns_diagnostics, DnsDiagnostics, ReverseDns};
pub use resolution::{forward_confirmed, resolve_host, resolve_host_to_ip, reverse_dns_lookup};

#[cfg(test)]
mod tests;
