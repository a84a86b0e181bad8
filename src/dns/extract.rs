//! Email-authentication record parsing and TXT categorization.
//!
//! SPF records start with `v=spf1` and hold space-separated mechanisms.
//! DMARC records start with `v=DMARC1` and hold semicolon-separated tags.
//! Exactly one of each is the conformant state; several are reported as
//! invalid without merging their policies.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::Serialize;
use trust_dns_resolver::TokioAsyncResolver;

use super::records::lookup_txt_records;
use crate::error_handling::ProbeError;

const SPF_PREFIX: &str = "v=spf1";
const DMARC_PREFIX: &str = "v=DMARC1";
const DKIM_PREFIX: &str = "v=DKIM1";

/// Known site-verification token prefixes and their services.
static VERIFICATION_PREFIXES: &[(&str, &str)] = &[
    ("google-site-verification=", "Google"),
    ("MS=", "Microsoft"),
    ("facebook-domain-verification=", "Facebook"),
    ("apple-domain-verification=", "Apple"),
    ("atlassian-domain-verification=", "Atlassian"),
    ("docusign=", "DocuSign"),
    ("adobe-idp-site-verification=", "Adobe"),
    ("stripe-verification=", "Stripe"),
    ("globalsign-domain-verification=", "GlobalSign"),
    ("zoom-domain-verification=", "Zoom"),
];

/// One SPF term.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SpfMechanism {
    /// Qualifier: `+`, `-`, `~` or `?`.
    pub qualifier: char,
    /// Mechanism or modifier name (`ip4`, `include`, `all`, `redirect`, ...).
    pub mechanism: String,
    /// Argument after `:` or `=`, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
}

/// A parsed SPF record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpfRecord {
    /// Record text as published.
    pub record: String,
    /// Terms after the version tag, in order.
    pub mechanisms: Vec<SpfMechanism>,
    /// Outcome of the terminal `all` (`pass`, `fail`, `softfail`, `neutral`).
    pub all_policy: Option<String>,
}

/// SPF records found for a domain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpfReport {
    /// Every record starting with `v=spf1`.
    pub spf_records: Vec<SpfRecord>,
    /// Number of SPF records.
    pub count: usize,
    /// True when exactly one record exists.
    pub valid: bool,
}

/// A parsed DMARC record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DmarcRecord {
    /// Record text as published.
    pub record: String,
    /// Every `tag=value` pair.
    pub tags: BTreeMap<String, String>,
    /// Domain policy (`p`).
    pub policy: Option<String>,
    /// Subdomain policy (`sp`).
    pub subdomain_policy: Option<String>,
    /// Sampling percentage (`pct`), 100 when absent or unparseable.
    pub percentage: u8,
    /// Aggregate report URIs (`rua`).
    pub aggregate_reports: Vec<String>,
    /// Forensic report URIs (`ruf`).
    pub forensic_reports: Vec<String>,
}

/// DMARC records found for a domain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DmarcReport {
    /// Every record starting with `v=DMARC1`.
    pub dmarc_records: Vec<DmarcRecord>,
    /// Number of DMARC records.
    pub count: usize,
    /// True when exactly one record exists.
    pub valid: bool,
}

/// A site-verification token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VerificationRecord {
    /// Service that issued the token.
    pub service: String,
    /// Record text.
    pub record: String,
}

/// TXT records grouped by purpose.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TxtCategories {
    /// SPF policies.
    pub spf: Vec<String>,
    /// DMARC policies.
    pub dmarc: Vec<String>,
    /// DKIM keys.
    pub dkim: Vec<String>,
    /// Site-verification tokens.
    pub verification: Vec<VerificationRecord>,
    /// Everything else.
    pub other: Vec<String>,
}

fn qualifier_outcome(qualifier: char) -> &'static str {
    match qualifier {
        '-' => "fail",
        '~' => "softfail",
        '?' => "neutral",
        _ => "pass",
    }
}

/// Parses one SPF record; `None` if it does not carry the SPF version tag.
pub fn parse_spf(record: &str) -> Option<SpfRecord> {
    let record = record.trim();
    let rest = record.strip_prefix(SPF_PREFIX)?;
    // "v=spf10" is not SPF
    if !(rest.is_empty() || rest.starts_with(char::is_whitespace)) {
        return None;
    }

    let mechanisms: Vec<SpfMechanism> = rest
        .split_whitespace()
        .map(|term| {
            let (qualifier, body) = match term.chars().next() {
                Some(q @ ('+' | '-' | '~' | '?')) => (q, &term[1..]),
                _ => ('+', term),
            };
            let split_at = body.find([':', '=']);
            let (mechanism, value) = match split_at {
                Some(i) => (&body[..i], Some(body[i + 1..].to_string())),
                None => (body, None),
            };
            SpfMechanism {
                qualifier,
                mechanism: mechanism.to_ascii_lowercase(),
                value,
            }
        })
        .collect();

    let all_policy = mechanisms
        .iter()
        .find(|m| m.mechanism == "all")
        .map(|m| qualifier_outcome(m.qualifier).to_string());

    Some(SpfRecord {
        record: record.to_string(),
        mechanisms,
        all_policy,
    })
}

/// Parses one DMARC record; `None` if it does not carry the DMARC version tag.
pub fn parse_dmarc(record: &str) -> Option<DmarcRecord> {
    let record = record.trim();
    if !record.starts_with(DMARC_PREFIX) {
        return None;
    }

    let tags: BTreeMap<String, String> = record
        .split(';')
        .filter_map(|part| {
            let (tag, value) = part.split_once('=')?;
            let tag = tag.trim();
            if tag.is_empty() {
                return None;
            }
            Some((tag.to_ascii_lowercase(), value.trim().to_string()))
        })
        .collect();

    let uri_list = |tag: &str| -> Vec<String> {
        tags.get(tag)
            .map(|v| {
                v.split(',')
                    .map(str::trim)
                    .filter(|s| !s.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    Some(DmarcRecord {
        record: record.to_string(),
        policy: tags.get("p").cloned(),
        subdomain_policy: tags.get("sp").cloned(),
        percentage: tags
            .get("pct")
            .and_then(|v| v.parse::<u8>().ok())
            .filter(|pct| *pct <= 100)
            .unwrap_or(100),
        aggregate_reports: uri_list("rua"),
        forensic_reports: uri_list("ruf"),
        tags,
    })
}

/// Collects the SPF records among `txt_records`.
pub fn spf_report(txt_records: &[String]) -> SpfReport {
    let spf_records: Vec<SpfRecord> = txt_records.iter().filter_map(|txt| parse_spf(txt)).collect();
    let count = spf_records.len();
    SpfReport {
        spf_records,
        count,
        valid: count == 1,
    }
}

/// Collects the DMARC records among `txt_records`.
pub fn dmarc_report(txt_records: &[String]) -> DmarcReport {
    let dmarc_records: Vec<DmarcRecord> =
        txt_records.iter().filter_map(|txt| parse_dmarc(txt)).collect();
    let count = dmarc_records.len();
    DmarcReport {
        dmarc_records,
        count,
        valid: count == 1,
    }
}

/// Sorts TXT records by purpose.
pub fn categorize_txt(txt_records: &[String]) -> TxtCategories {
    let mut categories = TxtCategories::default();
    for txt in txt_records {
        let trimmed = txt.trim();
        if parse_spf(trimmed).is_some() {
            categories.spf.push(trimmed.to_string());
        } else if trimmed.starts_with(DMARC_PREFIX) {
            categories.dmarc.push(trimmed.to_string());
        } else if trimmed.starts_with(DKIM_PREFIX) {
            categories.dkim.push(trimmed.to_string());
        } else if let Some((_, service)) = VERIFICATION_PREFIXES
            .iter()
            .find(|(prefix, _)| trimmed.starts_with(prefix))
        {
            categories.verification.push(VerificationRecord {
                service: service.to_string(),
                record: trimmed.to_string(),
            });
        } else {
            categories.other.push(trimmed.to_string());
        }
    }
    categories
}

/// Looks up and parses the SPF records published at `domain`.
pub async fn lookup_spf(
    resolver: &TokioAsyncResolver,
    domain: &str,
    timeout: Duration,
) -> Result<SpfReport, ProbeError> {
    let txt_records = lookup_txt_records(resolver, domain, timeout).await?;
    Ok(spf_report(&txt_records))
}

/// Looks up and parses the DMARC records published at `_dmarc.<domain>`.
pub async fn lookup_dmarc(
    resolver: &TokioAsyncResolver,
    domain: &str,
    timeout: Duration,
) -> Result<DmarcReport, ProbeError> {
    let txt_records = lookup_txt_records(resolver, &format!("_dmarc.{domain}"), timeout).await?;
    Ok(dmarc_report(&txt_records))
}
