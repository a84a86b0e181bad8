//! Certificate security score, letter grade and expiry risk.
//!
//! The score depends on the certificate alone. Protocol and cipher findings
//! are added as issues and recommendations without changing the score.

use serde::Serialize;

use super::catalog::{CipherStrength, TlsVersion};
use super::certificate::CertificateInfo;
use super::matrix::{CipherSupportMatrix, ProtocolSupportMatrix};
use crate::config::{CERT_EXPIRY_WARNING_DAYS, MIN_RSA_KEY_BITS};

const WEAK_SIGNATURE_PENALTY: u32 = 30;
const WEAK_KEY_PENALTY: u32 = 30;
const SHORT_VALIDITY_PENALTY: u32 = 20;
const WILDCARD_PENALTY: u32 = 5;


/// Digest names that make a signature algorithm weak.
const WEAK_DIGESTS: [&str; 3] = ["md2", "md5", "sha1"];

/// Score, grade and the findings behind them.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SecurityAssessment {
    /// 0 to 100.
    pub score: u32,
    /// Letter grade for `score`.
    pub grade: String,
    /// What is wrong.
    pub issues: Vec<String>,
    /// What to do about it.
    pub recommendations: Vec<String>,
}

impl SecurityAssessment {
    /// Assessment used when no certificate could be retrieved.
    pub fn unavailable() -> Self {
        SecurityAssessment {
            score: 0,
            grade: grade_for(0).to_string(),
            issues: vec!["Unable to retrieve SSL certificate".to_string()],
            recommendations: vec!["Ensure the server presents a valid SSL certificate".to_string()],
        }
    }

    fn finding(&mut self, issue: String, recommendation: &str) {
        self.issues.push(issue);
        self.recommendations.push(recommendation.to_string());
    }
}

/// Maps a score to a letter grade in 5-point bands.
pub fn grade_for(score: u32) -> &'static str {
    match score {
        95.. => "A+",
        90..=94 => "A",
        85..=89 => "A-",
        80..=84 => "B+",
        75..=79 => "B",
        70..=74 => "B-",
        65..=69 => "C+",
        60..=64 => "C",
        55..=59 => "C-",
        50..=54 => "D+",
        45..=49 => "D",
        40..=44 => "D-",
        _ => "F",
    }
}

fn has_weak_digest(signature_algorithm: &str) -> bool {
    let lower = signature_algorithm.to_lowercase();
    WEAK_DIGESTS.iter().any(|d| lower.contains(d))
}

/// RSA and DSA keys below 2048 bits are weak; EC keys are sized differently
/// and never trip this rule.
fn has_weak_key(info: &CertificateInfo) -> bool {
    matches!(info.public_key_algorithm.as_str(), "RSA" | "DSA")
        && info.public_key_bits.is_some_and(|bits| bits < MIN_RSA_KEY_BITS)
}

/// Scores a certificate and annotates protocol and cipher findings.
pub fn assess(
    info: &CertificateInfo,
    protocols: Option<&ProtocolSupportMatrix>,
    ciphers: Option<&CipherSupportMatrix>,
) -> SecurityAssessment {
    let mut penalty = 0u32;
    let mut assessment = SecurityAssessment {
        score: 0,
        grade: String::new(),
        issues: Vec::new(),
        recommendations: Vec::new(),
    };

    if has_weak_digest(&info.signature_algorithm) {
        penalty += WEAK_SIGNATURE_PENALTY;
        assessment.finding(
            format!("Weak signature algorithm: {}", info.signature_algorithm),
            "Reissue the certificate with a SHA-256 or stronger signature",
        );
    }
    if has_weak_key(info) {
        penalty += WEAK_KEY_PENALTY;
        assessment.finding(
            format!(
                "Weak public key: {} {} bits",
                info.public_key_algorithm,
                info.public_key_bits.unwrap_or_default()
            ),
            "Use an RSA key of at least 2048 bits",
        );
    }
    if info.days_remaining < CERT_EXPIRY_WARNING_DAYS {
        penalty += SHORT_VALIDITY_PENALTY;
        let issue = if info.days_remaining < 0 {
            format!("Certificate expired {} days ago", -info.days_remaining)
        } else {
            format!("Certificate expires in {} days", info.days_remaining)
        };
        assessment.finding(issue, "Renew the certificate before it expires");
    }
    if info
        .common_name
        .as_deref()
        .is_some_and(|cn| cn.starts_with("*."))
    {
        penalty += WILDCARD_PENALTY;
        assessment.finding(
            "Wildcard certificate in use".to_string(),
            "Prefer dedicated certificates for sensitive hosts",
        );
    }

    if let Some(matrix) = protocols {
        let legacy: Vec<&str> = matrix
            .supported_versions()
            .into_iter()
            .filter(TlsVersion::is_legacy)
            .map(|v| v.as_str())
            .collect();
        if !legacy.is_empty() {
            assessment.finding(
                format!("Legacy protocols enabled: {}", legacy.join(", ")),
                "Disable TLS 1.0 and TLS 1.1",
            );
        }
        if !matrix.supports(TlsVersion::Tls13) {
            assessment.finding("TLS 1.3 not supported".to_string(), "Enable TLS 1.3");
        }
    }
    if let Some(matrix) = ciphers {
        let weak = matrix.supported_with_strength(CipherStrength::Weak);
        if !weak.is_empty() {
            assessment.finding(
                format!("Weak cipher suites accepted: {}", weak.join(", ")),
                "Disable RC4, 3DES and non-forward-secret CBC suites",
            );
        }
    }

    assessment.score = 100u32.saturating_sub(penalty);
    assessment.grade = grade_for(assessment.score).to_string();
    assessment
}

/// Expiry risk bands, independent of the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ExpiryLevel {
    /// Already expired.
    Critical,
    /// 7 days or fewer.
    High,
    /// 30 days or fewer.
    Medium,
    /// 90 days or fewer.
    Low,
    /// More than 90 days.
    Info,
}

/// Expiry classification with its fixed message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ExpiryRisk {
    /// Band.
    pub level: ExpiryLevel,
    /// Days until expiry; negative once expired.
    pub days_remaining: i64,
    /// Human-readable message for the band.
    pub message: &'static str,
}

/// Classifies days-until-expiry into a risk band.
pub fn expiry_risk(days_remaining: i64) -> ExpiryRisk {
    let (level, message) = match days_remaining {
        d if d < 0 => (ExpiryLevel::Critical, "Certificate has expired"),
        0..=7 => (ExpiryLevel::High, "Certificate expires within 7 days"),
        8..=30 => (ExpiryLevel::Medium, "Certificate expires within 30 days"),
        31..=90 => (ExpiryLevel::Low, "Certificate expires within 90 days"),
        _ => (ExpiryLevel::Info, "Certificate validity is healthy"),
    };
    ExpiryRisk {
        level,
        days_remaining,
        message,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::certificate::Fingerprints;
    use crate::tls::matrix::ProtocolSupport;
    use chrono::Utc;

    fn cert(signature: &str, key_alg: &str, bits: usize, days: i64, cn: &str) -> CertificateInfo {
        let now = Utc::now();
        CertificateInfo {
            subject: format!("CN={cn}"),
            common_name: Some(cn.to_string()),
            issuer: "CN=Test CA".to_string(),
            issuer_organization: None,
            valid_from: now,
            valid_to: now + chrono::Duration::days(days),
            days_remaining: days,
            serial_number: "01".to_string(),
            version: 3,
            fingerprints: Fingerprints::of(b"cert"),
            subject_alt_names: vec![cn.to_string()],
            signature_algorithm: signature.to_string(),
            public_key_algorithm: key_alg.to_string(),
            public_key_bits: Some(bits),
            self_signed: false,
            policy_oids: Vec::new(),
            validation_level: None,
            issuer_chain: Vec::new(),
        }
    }

    fn protocols(supported: &[TlsVersion]) -> ProtocolSupportMatrix {
        ProtocolSupportMatrix {
            entries: TlsVersion::ALL
                .iter()
                .map(|v| ProtocolSupport {
                    protocol: *v,
                    supported: supported.contains(v),
                    response_time_ms: 1.0,
                    negotiated_cipher: None,
                    error: None,
                })
                .collect(),
        }
    }

    #[test]
    fn test_grade_bands() {
        let cases = [
            (100, "A+"),
            (95, "A+"),
            (94, "A"),
            (90, "A"),
            (85, "A-"),
            (84, "B+"),
            (75, "B"),
            (70, "B-"),
            (65, "C+"),
            (60, "C"),
            (55, "C-"),
            (50, "D+"),
            (45, "D"),
            (40, "D-"),
            (39, "F"),
            (0, "F"),
        ];
        for (score, grade) in cases {
            assert_eq!(grade_for(score), grade, "score {score}");
        }
    }

    #[test]
    fn test_clean_certificate_scores_full() {
        let info = cert("SHA256withRSA", "RSA", 2048, 200, "example.com");
        let assessment = assess(&info, None, None);
        assert_eq!(assessment.score, 100);
        assert_eq!(assessment.grade, "A+");
        assert!(assessment.issues.is_empty());
    }

    #[test]
    fn test_all_deductions_stack() {
        let info = cert("SHA1withRSA", "RSA", 1024, 10, "*.example.com");
        let assessment = assess(&info, None, None);
        assert_eq!(assessment.score, 100 - 30 - 30 - 20 - 5);
        assert_eq!(assessment.grade, "F");
        assert_eq!(assessment.issues.len(), 4);
        assert_eq!(assessment.recommendations.len(), 4);
    }

    #[test]
    fn test_md5_signature_is_weak() {
        let info = cert("MD5withRSA", "RSA", 4096, 365, "example.com");
        assert_eq!(assess(&info, None, None).score, 70);
    }

    #[test]
    fn test_small_ec_key_not_penalized() {
        let info = cert("SHA256withECDSA", "EC", 256, 365, "example.com");
        assert_eq!(assess(&info, None, None).score, 100);
    }

    #[test]
    fn test_expired_certificate_issue_text() {
        let info = cert("SHA256withRSA", "RSA", 2048, -3, "example.com");
        let assessment = assess(&info, None, None);
        assert_eq!(assessment.score, 80);
        assert_eq!(assessment.issues, vec!["Certificate expired 3 days ago"]);
    }

    #[test]
    fn test_protocol_findings_do_not_change_score() {
        let info = cert("SHA256withRSA", "RSA", 2048, 365, "example.com");
        let matrix = protocols(&[TlsVersion::Tls12, TlsVersion::Tls10]);
        let assessment = assess(&info, Some(&matrix), None);
        assert_eq!(assessment.score, 100);
        assert_eq!(
            assessment.issues,
            vec![
                "Legacy protocols enabled: TLSv1".to_string(),
                "TLS 1.3 not supported".to_string()
            ]
        );
    }

    #[test]
    fn test_unavailable_assessment() {
        let assessment = SecurityAssessment::unavailable();
        assert_eq!(assessment.score, 0);
        assert_eq!(assessment.grade, "F");
        assert_eq!(assessment.issues, vec!["Unable to retrieve SSL certificate"]);
    }

    #[test]
    fn test_expiry_bands() {
        assert_eq!(expiry_risk(-1).level, ExpiryLevel::Critical);
        assert_eq!(expiry_risk(0).level, ExpiryLevel::High);
        assert_eq!(expiry_risk(7).level, ExpiryLevel::High);
        assert_eq!(expiry_risk(8).level, ExpiryLevel::Medium);
        assert_eq!(expiry_risk(30).level, ExpiryLevel::Medium);
        assert_eq!(expiry_risk(90).level, ExpiryLevel::Low);
        let healthy = expiry_risk(91);
        assert_eq!(healthy.level, ExpiryLevel::Info);
        assert_eq!(healthy.message, "Certificate validity is healthy");
    }
}
