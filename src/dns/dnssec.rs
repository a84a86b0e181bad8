//! DNSSEC presence check.
//!
//! DNSSEC is reported as enabled when the zone publishes at least one DNSKEY
//! and its parent publishes at least one DS record. Signatures are not
//! validated; this is a presence check.

use std::net::SocketAddr;
use std::time::Duration;

use serde::Serialize;
use trust_dns_resolver::proto::op::Message;
use trust_dns_resolver::proto::rr::dnssec::rdata::{DNSSECRData, DNSKEY, DS};
use trust_dns_resolver::proto::rr::{RData, RecordType};

use super::raw::raw_query;
use super::wire::answers_of;
use crate::error_handling::ProbeError;

/// DNSKEY protocol field; RFC 4034 fixes it at 3 and the decoder rejects anything else.
const DNSKEY_PROTOCOL: u8 = 3;

/// A DNSKEY record summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnskeyRecord {
    /// Raw flags field (256 = ZSK, 257 = KSK).
    pub flags: u16,
    /// Protocol field, always 3.
    pub protocol: u8,
    /// Signing algorithm number.
    pub algorithm: u8,
    /// Whether the SEP bit is set.
    pub key_signing_key: bool,
    /// Public key length in bytes.
    pub key_length: usize,
}

impl From<&DNSKEY> for DnskeyRecord {
    fn from(key: &DNSKEY) -> Self {
        DnskeyRecord {
            flags: key.flags(),
            protocol: DNSKEY_PROTOCOL,
            algorithm: u8::from(key.algorithm()),
            key_signing_key: key.secure_entry_point(),
            key_length: key.public_key().len(),
        }
    }
}

/// A DS record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DsRecord {
    /// Tag of the referenced DNSKEY.
    pub key_tag: u16,
    /// Algorithm of the referenced DNSKEY.
    pub algorithm: u8,
    /// Digest algorithm (1 = SHA-1, 2 = SHA-256, 4 = SHA-384).
    pub digest_type: u8,
    /// Digest as lowercase hex.
    pub digest: String,
}

impl From<&DS> for DsRecord {
    fn from(ds: &DS) -> Self {
        DsRecord {
            key_tag: ds.key_tag(),
            algorithm: u8::from(ds.algorithm()),
            digest_type: u8::from(ds.digest_type()),
            digest: hex::encode(ds.digest()),
        }
    }
}

/// Outcome of the DNSSEC presence check.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DnssecStatus {
    /// True when both DNSKEY and DS answers are present.
    pub enabled: bool,
    /// DNSKEY records found at the zone apex.
    pub dnskey_records: Vec<DnskeyRecord>,
    /// DS records found at the parent.
    pub ds_records: Vec<DsRecord>,
    /// Query failures, if either lookup failed.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

pub(crate) fn dnskeys(message: &Message) -> Vec<DnskeyRecord> {
    answers_of(message, RecordType::DNSKEY)
        .filter_map(|record| match record.data() {
            Some(RData::DNSSEC(DNSSECRData::DNSKEY(key))) => Some(DnskeyRecord::from(key)),
            _ => None,
        })
        .collect()
}

pub(crate) fn ds_records(message: &Message) -> Vec<DsRecord> {
    answers_of(message, RecordType::DS)
        .filter_map(|record| match record.data() {
            Some(RData::DNSSEC(DNSSECRData::DS(ds))) => Some(DsRecord::from(ds)),
            _ => None,
        })
        .collect()
}

/// Queries DNSKEY and DS for `domain` through `server` concurrently.
///
/// A failed lookup counts as "no records" for the `enabled` decision and its
/// error is kept in `errors`.
pub async fn check_dnssec(server: SocketAddr, domain: &str, timeout: Duration) -> DnssecStatus {
    let (dnskey_result, ds_result) = tokio::join!(
        raw_query(server, domain, RecordType::DNSKEY, true, timeout),
        raw_query(server, domain, RecordType::DS, true, timeout),
    );

    let mut errors = Vec::new();
    let dnskey_records = match dnskey_result {
        Ok(message) => dnskeys(&message),
        Err(e) => {
            errors.push(format!("DNSKEY: {}", ProbeError::from(e)));
            Vec::new()
        }
    };
    let ds_records = match ds_result {
        Ok(message) => ds_records(&message),
        Err(e) => {
            errors.push(format!("DS: {}", ProbeError::from(e)));
            Vec::new()
        }
    };

    let enabled = !dnskey_records.is_empty() && !ds_records.is_empty();
    log::debug!(
        "DNSSEC for {domain}: {} DNSKEY, {} DS, enabled={enabled}",
        dnskey_records.len(),
        ds_records.len()
    );
    DnssecStatus {
        enabled,
        dnskey_records,
        ds_records,
        errors,
    }
}
