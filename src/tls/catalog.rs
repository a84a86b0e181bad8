//! Fixed protocol-version and cipher-suite tables tested by the matrices.
//!
//! Both tables are immutable and ordered: versions newest to oldest,
//! ciphers strongest first. Matrix output preserves this order.

use serde::Serialize;

/// TLS protocol versions tested by the protocol matrix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub enum TlsVersion {
    /// TLS 1.0
    #[serde(rename = "TLSv1")]
    Tls10,
    /// TLS 1.1
    #[serde(rename = "TLSv1.1")]
    Tls11,
    /// TLS 1.2
    #[serde(rename = "TLSv1.2")]
    Tls12,
    /// TLS 1.3
    #[serde(rename = "TLSv1.3")]
    Tls13,
}

impl TlsVersion {
    /// Versions in test order, newest first.
    pub const ALL: [TlsVersion; 4] = [
        TlsVersion::Tls13,
        TlsVersion::Tls12,
        TlsVersion::Tls11,
        TlsVersion::Tls10,
    ];

    /// Protocol version code on the wire.
    pub fn wire_code(&self) -> u16 {
        match self {
            TlsVersion::Tls10 => 0x0301,
            TlsVersion::Tls11 => 0x0302,
            TlsVersion::Tls12 => 0x0303,
            TlsVersion::Tls13 => 0x0304,
        }
    }

    /// Looks up a version by wire code.
    pub fn from_wire(code: u16) -> Option<Self> {
        TlsVersion::ALL.into_iter().find(|v| v.wire_code() == code)
    }

    /// Display name (`"TLSv1.3"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            TlsVersion::Tls10 => "TLSv1",
            TlsVersion::Tls11 => "TLSv1.1",
            TlsVersion::Tls12 => "TLSv1.2",
            TlsVersion::Tls13 => "TLSv1.3",
        }
    }

    /// TLS 1.0 and 1.1 are deprecated (RFC 8996).
    pub fn is_legacy(&self) -> bool {
        matches!(self, TlsVersion::Tls10 | TlsVersion::Tls11)
    }
}

impl std::fmt::Display for TlsVersion {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Strength class of a cipher suite.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherStrength {
    /// AEAD with forward secrecy.
    Strong,
    /// Forward secrecy with CBC, or AEAD without forward secrecy.
    Acceptable,
    /// No forward secrecy and CBC, 3DES or RC4.
    Weak,
}

/// One entry of the cipher catalog.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CipherSpec {
    /// IANA name.
    pub name: &'static str,
    /// IANA code point.
    pub code: u16,
    /// Strength class.
    pub strength: CipherStrength,
    /// Oldest version the suite is defined for. TLS 1.3 suites are only
    /// negotiable in TLS 1.3, and no older suite is negotiable there.
    pub min_version: TlsVersion,
}

impl CipherSpec {
    /// Whether this is a TLS 1.3 suite.
    pub fn is_tls13(&self) -> bool {
        self.min_version == TlsVersion::Tls13
    }

    /// Whether a `version` hello may offer this suite.
    pub fn usable_with(&self, version: TlsVersion) -> bool {
        if version == TlsVersion::Tls13 {
            self.is_tls13()
        } else {
            !self.is_tls13() && self.min_version <= version
        }
    }
}

const fn suite(
    name: &'static str,
    code: u16,
    strength: CipherStrength,
    min_version: TlsVersion,
) -> CipherSpec {
    CipherSpec {
        name,
        code,
        strength,
        min_version,
    }
}

use CipherStrength::{Acceptable, Strong, Weak};
use TlsVersion::{Tls10, Tls12, Tls13};

/// Cipher suites tested by the cipher matrix.
pub static CIPHER_SUITES: &[CipherSpec] = &[
    suite("TLS_AES_256_GCM_SHA384", 0x1302, Strong, Tls13),
    suite("TLS_AES_128_GCM_SHA256", 0x1301, Strong, Tls13),
    suite("TLS_CHACHA20_POLY1305_SHA256", 0x1303, Strong, Tls13),
    suite("TLS_ECDHE_RSA_WITH_AES_256_GCM_SHA384", 0xC030, Strong, Tls12),
    suite("TLS_ECDHE_RSA_WITH_AES_128_GCM_SHA256", 0xC02F, Strong, Tls12),
    suite("TLS_ECDHE_ECDSA_WITH_AES_256_GCM_SHA384", 0xC02C, Strong, Tls12),
    suite("TLS_ECDHE_ECDSA_WITH_AES_128_GCM_SHA256", 0xC02B, Strong, Tls12),
    suite("TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256", 0xCCA8, Strong, Tls12),
    suite("TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA384", 0xC028, Acceptable, Tls12),
    suite("TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA256", 0xC027, Acceptable, Tls12),
    suite("TLS_ECDHE_RSA_WITH_AES_256_CBC_SHA", 0xC014, Acceptable, Tls10),
    suite("TLS_ECDHE_RSA_WITH_AES_128_CBC_SHA", 0xC013, Acceptable, Tls10),
    suite("TLS_ECDHE_ECDSA_WITH_AES_256_CBC_SHA", 0xC00A, Acceptable, Tls10),
    suite("TLS_ECDHE_ECDSA_WITH_AES_128_CBC_SHA", 0xC009, Acceptable, Tls10),
    suite("TLS_RSA_WITH_AES_256_GCM_SHA384", 0x009D, Acceptable, Tls12),
    suite("TLS_RSA_WITH_AES_128_GCM_SHA256", 0x009C, Acceptable, Tls12),
    suite("TLS_RSA_WITH_AES_256_CBC_SHA", 0x0035, Weak, Tls10),
    suite("TLS_RSA_WITH_AES_128_CBC_SHA", 0x002F, Weak, Tls10),
    suite("TLS_RSA_WITH_3DES_EDE_CBC_SHA", 0x000A, Weak, Tls10),
    suite("TLS_RSA_WITH_RC4_128_SHA", 0x0005, Weak, Tls10),
    suite("TLS_RSA_WITH_RC4_128_MD5", 0x0004, Weak, Tls10),
];

/// Looks up a catalog entry by code point.
pub fn cipher_by_code(code: u16) -> Option<&'static CipherSpec> {
    CIPHER_SUITES.iter().find(|c| c.code == code)
}

/// Human-readable name for a cipher code point, catalogued or not.
pub fn cipher_name(code: u16) -> String {
    cipher_by_code(code)
        .map(|c| c.name.to_string())
        .unwrap_or_else(|| format!("0x{code:04X}"))
}

/// Cipher codes offered when probing `version`.
pub fn ciphers_for(version: TlsVersion) -> Vec<u16> {
    CIPHER_SUITES
        .iter()
        .filter(|c| c.usable_with(version))
        .map(|c| c.code)
        .collect()
}
