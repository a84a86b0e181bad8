//! Certificate information extraction.
//!
//! Turns the DER chain presented in a handshake into a `CertificateInfo`:
//! names, validity, serial, fingerprints, SANs, key and signature
//! algorithms, and the issuer chain walked from leaf to root.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use rustls::pki_types::CertificateDer;
use serde::Serialize;
use sha1::Sha1;
use sha2::{Digest, Sha256, Sha512};
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::{GeneralName, ParsedExtension};
use x509_parser::prelude::FromDer;
use x509_parser::public_key::PublicKey;
use x509_parser::time::ASN1Time;
use x509_parser::x509::X509Name;

use crate::error_handling::TlsProbeError;

/// Certificate digests, colon-separated upper-case hex.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Fingerprints {
    /// SHA-1 digest of the DER encoding.
    pub sha1: String,
    /// SHA-256 digest of the DER encoding.
    pub sha256: String,
    /// SHA-512 digest of the DER encoding.
    pub sha512: String,
}

impl Fingerprints {
    /// Computes all three digests of `der`.
    pub fn of(der: &[u8]) -> Self {
        Fingerprints {
            sha1: colon_hex(&Sha1::digest(der)),
            sha256: colon_hex(&Sha256::digest(der)),
            sha512: colon_hex(&Sha512::digest(der)),
        }
    }
}

/// One certificate of the issuer chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainCertificate {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// End of validity.
    pub valid_to: Option<DateTime<Utc>>,
    /// Subject equals issuer.
    pub self_issued: bool,
}

/// Everything extracted from the leaf certificate and its chain.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateInfo {
    /// Subject distinguished name.
    pub subject: String,
    /// Subject common name, if present.
    pub common_name: Option<String>,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Issuer organization, if present.
    pub issuer_organization: Option<String>,
    /// Start of validity.
    pub valid_from: DateTime<Utc>,
    /// End of validity.
    pub valid_to: DateTime<Utc>,
    /// Whole days until `valid_to`; negative once expired.
    pub days_remaining: i64,
    /// Serial number, colon-separated hex.
    pub serial_number: String,
    /// X.509 version (3 for v3).
    pub version: u32,
    /// Digests of the leaf.
    pub fingerprints: Fingerprints,
    /// DNS names and IP addresses from the SAN extension.
    pub subject_alt_names: Vec<String>,
    /// Signature algorithm name (`SHA256withRSA`, ...).
    pub signature_algorithm: String,
    /// Public key algorithm (`RSA`, `EC`, `Ed25519`, ...).
    pub public_key_algorithm: String,
    /// Public key size in bits, when it can be determined.
    pub public_key_bits: Option<usize>,
    /// Leaf subject equals issuer.
    pub self_signed: bool,
    /// Certificate policy OIDs.
    pub policy_oids: Vec<String>,
    /// CA/Browser Forum validation level (`DV`, `OV`, `IV`, `EV`), if declared.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub validation_level: Option<&'static str>,
    /// Issuer chain from leaf to root, as presented.
    pub issuer_chain: Vec<ChainCertificate>,
}

/// The fields shown for a certificate inside another probe's result.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSummary {
    /// Subject distinguished name.
    pub subject: String,
    /// Issuer distinguished name.
    pub issuer: String,
    /// Start of validity.
    pub valid_from: DateTime<Utc>,
    /// End of validity.
    pub valid_to: DateTime<Utc>,
    /// Whole days until expiry.
    pub days_remaining: i64,
    /// SHA-256 fingerprint.
    pub fingerprint_sha256: String,
}

impl From<&CertificateInfo> for CertificateSummary {
    fn from(info: &CertificateInfo) -> Self {
        CertificateSummary {
            subject: info.subject.clone(),
            issuer: info.issuer.clone(),
            valid_from: info.valid_from,
            valid_to: info.valid_to,
            days_remaining: info.days_remaining,
            fingerprint_sha256: info.fingerprints.sha256.clone(),
        }
    }
}

fn colon_hex(bytes: &[u8]) -> String {
    bytes
        .iter()
        .map(|b| format!("{b:02X}"))
        .collect::<Vec<String>>()
        .join(":")
}

fn asn1_to_utc(time: ASN1Time) -> Result<DateTime<Utc>, TlsProbeError> {
    DateTime::from_timestamp(time.timestamp(), 0)
        .ok_or_else(|| TlsProbeError::Certificate("validity timestamp out of range".to_string()))
}

fn common_name(name: &X509Name<'_>) -> Option<String> {
    name.iter_common_name()
        .find_map(|cn| cn.as_str().ok().map(str::to_string))
}

fn organization(name: &X509Name<'_>) -> Option<String> {
    name.iter_organization()
        .find_map(|o| o.as_str().ok().map(str::to_string))
}

/// Maps signature algorithm OIDs to conventional names.
fn signature_name(oid: &str) -> String {
    match oid {
        "1.2.840.113549.1.1.2" => "MD2withRSA".to_string(),
        "1.2.840.113549.1.1.4" => "MD5withRSA".to_string(),
        "1.2.840.113549.1.1.5" => "SHA1withRSA".to_string(),
        "1.2.840.113549.1.1.11" => "SHA256withRSA".to_string(),
        "1.2.840.113549.1.1.12" => "SHA384withRSA".to_string(),
        "1.2.840.113549.1.1.13" => "SHA512withRSA".to_string(),
        "1.2.840.113549.1.1.10" => "RSASSA-PSS".to_string(),
        "1.2.840.10040.4.3" => "SHA1withDSA".to_string(),
        "1.2.840.10045.4.1" => "SHA1withECDSA".to_string(),
        "1.2.840.10045.4.3.2" => "SHA256withECDSA".to_string(),
        "1.2.840.10045.4.3.3" => "SHA384withECDSA".to_string(),
        "1.2.840.10045.4.3.4" => "SHA512withECDSA".to_string(),
        "1.3.101.112" => "Ed25519".to_string(),
        "1.3.101.113" => "Ed448".to_string(),
        // Return OID if unknown
        other => other.to_string(),
    }
}

fn public_key_details(cert: &X509Certificate<'_>) -> (String, Option<usize>) {
    let spki = cert.public_key();
    match spki.parsed() {
        Ok(PublicKey::RSA(rsa)) => ("RSA".to_string(), Some(rsa.key_size())),
        Ok(PublicKey::EC(point)) => ("EC".to_string(), Some(point.key_size())),
        Ok(PublicKey::DSA(y)) => ("DSA".to_string(), Some(y.len() * 8)),
        _ => {
            let oid = spki.algorithm.algorithm.to_id_string();
            let name = match oid.as_str() {
                "1.3.101.112" => "Ed25519".to_string(),
                "1.3.101.113" => "Ed448".to_string(),
                _ => oid,
            };
            (name, None)
        }
    }
}

fn subject_alt_names(cert: &X509Certificate<'_>) -> Vec<String> {
    let mut sans = Vec::new();
    if let Ok(Some(san)) = cert.subject_alternative_name() {
        for name in &san.value.general_names {
            match name {
                GeneralName::DNSName(dns) => sans.push(dns.to_string()),
                GeneralName::IPAddress(bytes) => {
                    if let Ok(octets) = <[u8; 4]>::try_from(*bytes) {
                        sans.push(std::net::Ipv4Addr::from(octets).to_string());
                    } else if let Ok(octets) = <[u8; 16]>::try_from(*bytes) {
                        sans.push(std::net::Ipv6Addr::from(octets).to_string());
                    }
                }
                _ => {}
            }
        }
    }
    sans
}

fn certificate_policies(cert: &X509Certificate<'_>) -> Vec<String> {
    cert.extensions()
        .iter()
        .filter_map(|ext| match ext.parsed_extension() {
            ParsedExtension::CertificatePolicies(policies) => Some(
                policies
                    .iter()
                    .map(|policy| policy.policy_id.to_id_string())
                    .collect::<Vec<_>>(),
            ),
            _ => None,
        })
        .flatten()
        .collect()
}

fn validation_level(policy_oids: &[String]) -> Option<&'static str> {
    // Strongest declared level wins
    [
        ("2.23.140.1.1", "EV"),
        ("2.23.140.1.2.2", "OV"),
        ("2.23.140.1.2.3", "IV"),
        ("2.23.140.1.2.1", "DV"),
    ]
    .into_iter()
    .find(|(oid, _)| policy_oids.iter().any(|p| p == oid))
    .map(|(_, level)| level)
}

fn is_self_issued(cert: &X509Certificate<'_>) -> bool {
    cert.subject().as_raw() == cert.issuer().as_raw()
}

/// Walks issuer links through the presented certificates, starting at the leaf.
///
/// Stops at a self-issued certificate, at an issuer that was not presented,
/// or when a certificate would be visited twice.
fn issuer_chain(parsed: &[X509Certificate<'_>]) -> Result<Vec<ChainCertificate>, TlsProbeError> {
    let mut chain = Vec::new();
    let mut visited: HashSet<usize> = HashSet::new();
    let mut current = 0usize;

    while let Some(cert) = parsed.get(current) {
        if !visited.insert(current) {
            log::debug!("Certificate chain loops back to position {current}");
            break;
        }
        let self_issued = is_self_issued(cert);
        chain.push(ChainCertificate {
            subject: cert.subject().to_string(),
            issuer: cert.issuer().to_string(),
            valid_to: Some(asn1_to_utc(cert.validity().not_after)?),
            self_issued,
        });
        if self_issued {
            break;
        }
        match parsed
            .iter()
            .position(|candidate| candidate.subject().as_raw() == cert.issuer().as_raw())
        {
            Some(next) => current = next,
            None => break,
        }
    }
    Ok(chain)
}

/// Builds `CertificateInfo` from a presented chain, leaf first.
///
/// # Errors
///
/// Returns `TlsProbeError::NoCertificate` for an empty chain and
/// `TlsProbeError::Certificate` if the leaf cannot be parsed.
pub fn certificate_info(
    chain: &[CertificateDer<'_>],
    now: DateTime<Utc>,
) -> Result<CertificateInfo, TlsProbeError> {
    let leaf_der = chain.first().ok_or(TlsProbeError::NoCertificate)?;
    let (_, leaf) = X509Certificate::from_der(leaf_der.as_ref())
        .map_err(|e| TlsProbeError::Certificate(e.to_string()))?;

    // Intermediates that fail to parse are left out of the issuer walk
    let mut parsed = vec![leaf];
    for der in chain.iter().skip(1) {
        match X509Certificate::from_der(der.as_ref()) {
            Ok((_, cert)) => parsed.push(cert),
            Err(e) => log::debug!("Skipping unparseable chain certificate: {e}"),
        }
    }

    let leaf = &parsed[0];
    let valid_from = asn1_to_utc(leaf.validity().not_before)?;
    let valid_to = asn1_to_utc(leaf.validity().not_after)?;
    let (public_key_algorithm, public_key_bits) = public_key_details(leaf);
    let policy_oids = certificate_policies(leaf);

    Ok(CertificateInfo {
        subject: leaf.subject().to_string(),
        common_name: common_name(leaf.subject()),
        issuer: leaf.issuer().to_string(),
        issuer_organization: organization(leaf.issuer()),
        valid_from,
        valid_to,
        days_remaining: (valid_to - now).num_days(),
        serial_number: leaf.raw_serial_as_string(),
        version: leaf.version().0 + 1,
        fingerprints: Fingerprints::of(leaf_der.as_ref()),
        subject_alt_names: subject_alt_names(leaf),
        signature_algorithm: signature_name(&leaf.signature_algorithm.algorithm.to_id_string()),
        public_key_algorithm,
        public_key_bits,
        self_signed: is_self_issued(leaf),
        validation_level: validation_level(&policy_oids),
        policy_oids,
        issuer_chain: issuer_chain(&parsed)?,
    })
}
