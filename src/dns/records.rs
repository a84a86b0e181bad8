//! DNS record queries.
//!
//! This module maps each supported record type to the query that serves it:
//! - A, AAAA, MX, TXT, NS, SOA and CNAME go through the shared resolver
//! - DNSKEY and DS go through a raw query to one server, since the
//!   resolver only hands them out through its validating path
//!
//! Answer TTLs come from a separate best-effort raw query.

use std::net::{Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::{Duration, Instant};

use serde::Serialize;
use strum_macros::EnumIter;
use trust_dns_resolver::error::{ResolveError, ResolveErrorKind};
use trust_dns_resolver::proto::op::ResponseCode;
use trust_dns_resolver::proto::rr::{Name, RData, RecordType};
use trust_dns_resolver::TokioAsyncResolver;

use super::dnssec::{dnskeys, ds_records, DnskeyRecord, DsRecord};
use super::raw::{fetch_ttl, raw_query};
use super::wire::rcode_name;
use crate::config::DiagnosticsConfig;
use crate::error_handling::ProbeError;
use crate::utils::{with_timeout, TimedResult};

/// Record types the engine can query.
///
/// The set is closed: a type without a query mapping cannot be named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecordKind {
    /// IPv4 address
    A,
    /// IPv6 address
    Aaaa,
    /// Mail exchange
    Mx,
    /// Text
    Txt,
    /// Nameserver
    Ns,
    /// Start of authority
    Soa,
    /// Canonical name
    Cname,
    /// DNSSEC public key
    Dnskey,
    /// Delegation signer
    Ds,
}

impl RecordKind {
    /// Record types included in a standard DNS report.
    pub const STANDARD: [RecordKind; 7] = [
        RecordKind::A,
        RecordKind::Aaaa,
        RecordKind::Mx,
        RecordKind::Txt,
        RecordKind::Ns,
        RecordKind::Soa,
        RecordKind::Cname,
    ];

    /// Presentation name (`"AAAA"`, `"MX"`, ...).
    pub fn as_str(&self) -> &'static str {
        match self {
            RecordKind::A => "A",
            RecordKind::Aaaa => "AAAA",
            RecordKind::Mx => "MX",
            RecordKind::Txt => "TXT",
            RecordKind::Ns => "NS",
            RecordKind::Soa => "SOA",
            RecordKind::Cname => "CNAME",
            RecordKind::Dnskey => "DNSKEY",
            RecordKind::Ds => "DS",
        }
    }

    /// Wire record type.
    pub fn record_type(&self) -> RecordType {
        match self {
            RecordKind::A => RecordType::A,
            RecordKind::Aaaa => RecordType::AAAA,
            RecordKind::Mx => RecordType::MX,
            RecordKind::Txt => RecordType::TXT,
            RecordKind::Ns => RecordType::NS,
            RecordKind::Soa => RecordType::SOA,
            RecordKind::Cname => RecordType::CNAME,
            RecordKind::Dnskey => RecordType::DNSKEY,
            RecordKind::Ds => RecordType::DS,
        }
    }

    fn resolver_type(&self) -> Option<RecordType> {
        match self {
            RecordKind::Dnskey | RecordKind::Ds => None,
            kind => Some(kind.record_type()),
        }
    }
}

impl std::fmt::Display for RecordKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for RecordKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        use strum::IntoEnumIterator;
        RecordKind::iter()
            .find(|kind| kind.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| format!("Unsupported record type: {s}"))
    }
}

/// A mail exchanger.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MxRecord {
    /// Preference value; lower is preferred.
    pub priority: u16,
    /// Exchange hostname without trailing dot.
    pub exchange: String,
}

/// Start-of-authority fields.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SoaRecord {
    /// Primary nameserver.
    pub mname: String,
    /// Responsible mailbox.
    pub rname: String,
    /// Zone serial.
    pub serial: u32,
    /// Refresh interval in seconds.
    pub refresh: i32,
    /// Retry interval in seconds.
    pub retry: i32,
    /// Expire limit in seconds.
    pub expire: i32,
    /// Negative caching TTL.
    pub minimum: u32,
}

/// One decoded record value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum RecordValue {
    /// A
    A(Ipv4Addr),
    /// AAAA
    Aaaa(Ipv6Addr),
    /// MX
    Mx(MxRecord),
    /// TXT, character strings concatenated
    Txt(String),
    /// NS or CNAME target
    Name(String),
    /// SOA
    Soa(SoaRecord),
    /// DNSKEY
    Dnskey(DnskeyRecord),
    /// DS
    Ds(DsRecord),
}

/// Records of one type with the answer TTL when it could be read.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordLookup {
    /// Queried type.
    pub record_type: RecordKind,
    /// Decoded answers; empty when the name has none of this type.
    pub records: Vec<RecordValue>,
    /// TTL of the first answer, from the raw query.
    pub ttl: Option<u32>,
}

/// Hostname form of a resolver `Name`, without the trailing root dot.
pub(crate) fn name_to_string(name: &Name) -> String {
    let name = name.to_utf8();
    name.strip_suffix('.').map(str::to_string).unwrap_or(name)
}

/// Whether a resolver error is the "no such name / no such record" outcome.
///
/// Only NXDOMAIN and an empty NOERROR answer qualify. The resolver reports
/// SERVFAIL, REFUSED and other failure codes through the same error kind.
pub(crate) fn is_no_records(error: &ResolveError) -> bool {
    matches!(
        error.kind(),
        ResolveErrorKind::NoRecordsFound {
            response_code: ResponseCode::NXDomain | ResponseCode::NoError,
            ..
        }
    )
}

/// Maps a resolver failure to a probe error.
pub(crate) fn resolve_failure(operation: &str, error: ResolveError, timeout: Duration) -> ProbeError {
    match error.kind() {
        ResolveErrorKind::Timeout => ProbeError::Timeout {
            operation: operation.to_string(),
            after_ms: timeout.as_millis() as u64,
        },
        _ if is_no_records(&error) => ProbeError::NotFound(format!("{operation}: no records found")),
        ResolveErrorKind::NoRecordsFound { response_code, .. } => {
            ProbeError::Protocol(format!("{operation}: server answered {}", rcode_name(*response_code)))
        }
        _ => ProbeError::Transport(format!("{operation}: {error}")),
    }
}

fn record_value(rdata: &RData) -> Option<RecordValue> {
    match rdata {
        RData::A(a) => Some(RecordValue::A(a.0)),
        RData::AAAA(aaaa) => Some(RecordValue::Aaaa(aaaa.0)),
        RData::MX(mx) => Some(RecordValue::Mx(MxRecord {
            priority: mx.preference(),
            exchange: name_to_string(mx.exchange()),
        })),
        RData::TXT(txt) => Some(RecordValue::Txt(
            // A TXT record may hold several character strings; join them
            txt.iter()
                .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
                .collect::<Vec<String>>()
                .join(""),
        )),
        RData::NS(ns) => Some(RecordValue::Name(name_to_string(&ns.0))),
        RData::CNAME(cname) => Some(RecordValue::Name(name_to_string(&cname.0))),
        RData::SOA(soa) => Some(RecordValue::Soa(SoaRecord {
            mname: name_to_string(soa.mname()),
            rname: name_to_string(soa.rname()),
            serial: soa.serial(),
            refresh: soa.refresh(),
            retry: soa.retry(),
            expire: soa.expire(),
            minimum: soa.minimum(),
        })),
        _ => None,
    }
}

/// Queries one record type through the resolver.
///
/// "No records" is an empty result, not an error.
async fn lookup_rdata(
    resolver: &TokioAsyncResolver,
    name: &str,
    record_type: RecordType,
    timeout: Duration,
) -> Result<Vec<RData>, ProbeError> {
    match resolver.lookup(name, record_type).await {
        Ok(lookup) => Ok(lookup.iter().cloned().collect()),
        Err(e) if is_no_records(&e) => Ok(Vec::new()),
        Err(e) => {
            log::warn!("{record_type} lookup for {name} failed: {e}");
            Err(resolve_failure(&format!("{record_type} lookup"), e, timeout))
        }
    }
}

/// Looks up `kind` records for `name`.
///
/// # Errors
///
/// Returns `ProbeError` when the query itself fails; an absent record set is
/// `Ok(vec![])`.
pub async fn lookup_records(
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
    name: &str,
    kind: RecordKind,
) -> Result<Vec<RecordValue>, ProbeError> {
    match kind.resolver_type() {
        Some(record_type) => {
            let rdata = lookup_rdata(resolver, name, record_type, config.dns_timeout).await?;
            Ok(rdata
                .iter()
                .filter(|rdata| rdata.record_type() == record_type)
                .filter_map(record_value)
                .collect())
        }
        None => lookup_raw(config.raw_query_resolver, name, kind, config.raw_dns_timeout).await,
    }
}

async fn lookup_raw(
    server: SocketAddr,
    name: &str,
    kind: RecordKind,
    timeout: Duration,
) -> Result<Vec<RecordValue>, ProbeError> {
    let message = raw_query(server, name, kind.record_type(), true, timeout).await?;
    let values = match kind {
        RecordKind::Dnskey => dnskeys(&message).into_iter().map(RecordValue::Dnskey).collect(),
        RecordKind::Ds => ds_records(&message).into_iter().map(RecordValue::Ds).collect(),
        _ => Vec::new(),
    };
    Ok(values)
}

/// Looks up `kind` for `name` with its TTL, timed and bounded by the lookup timeout.
pub async fn lookup_with_ttl(
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
    name: &str,
    kind: RecordKind,
) -> TimedResult<RecordLookup> {
    let start = Instant::now();
    let operation = format!("{kind} lookup for {name}");
    let (records, ttl) = tokio::join!(
        with_timeout(
            &operation,
            config.dns_timeout,
            lookup_records(resolver, config, name, kind)
        ),
        fetch_ttl(config.raw_query_resolver, name, kind.record_type(), config.raw_dns_timeout),
    );
    match records {
        Ok(records) => TimedResult::success(
            RecordLookup {
                record_type: kind,
                // TTL is meaningless without answers
                ttl: if records.is_empty() { None } else { ttl },
                records,
            },
            start.elapsed(),
        ),
        Err(e) => TimedResult::failure(e, start.elapsed()),
    }
}

/// Queries MX records, sorted by priority (lower = preferred).
pub async fn lookup_mx_records(
    resolver: &TokioAsyncResolver,
    domain: &str,
    timeout: Duration,
) -> Result<Vec<MxRecord>, ProbeError> {
    let mut records: Vec<MxRecord> = lookup_rdata(resolver, domain, RecordType::MX, timeout)
        .await?
        .iter()
        .filter_map(|rdata| match record_value(rdata) {
            Some(RecordValue::Mx(mx)) => Some(mx),
            _ => None,
        })
        .collect();
    records.sort_by_key(|mx| mx.priority);
    Ok(records)
}

/// Queries TXT records, each record's strings concatenated.
pub async fn lookup_txt_records(
    resolver: &TokioAsyncResolver,
    name: &str,
    timeout: Duration,
) -> Result<Vec<String>, ProbeError> {
    Ok(lookup_rdata(resolver, name, RecordType::TXT, timeout)
        .await?
        .iter()
        .filter_map(|rdata| match record_value(rdata) {
            Some(RecordValue::Txt(txt)) => Some(txt),
            _ => None,
        })
        .collect())
}

/// Queries NS records.
pub async fn lookup_ns_records(
    resolver: &TokioAsyncResolver,
    domain: &str,
    timeout: Duration,
) -> Result<Vec<String>, ProbeError> {
    Ok(lookup_rdata(resolver, domain, RecordType::NS, timeout)
        .await?
        .iter()
        .filter_map(|rdata| match rdata {
            RData::NS(ns) => Some(name_to_string(&ns.0)),
            _ => None,
        })
        .collect())
}

/// Queries A records.
pub async fn lookup_ipv4_records(
    resolver: &TokioAsyncResolver,
    name: &str,
    timeout: Duration,
) -> Result<Vec<Ipv4Addr>, ProbeError> {
    Ok(lookup_rdata(resolver, name, RecordType::A, timeout)
        .await?
        .iter()
        .filter_map(|rdata| match rdata {
            RData::A(a) => Some(a.0),
            _ => None,
        })
        .collect())
}
