//! Probe target admission.
//!
//! A target is either an IP address or a hostname that passes a conservative
//! grammar check. Engine entry points accept only the validated types defined
//! here, so no probe ever sees an unchecked string.
//!
//! Grammar:
//! - dot-separated labels of 1–63 ASCII letters, digits or hyphens
//! - no label starts or ends with a hyphen
//! - the final label is at least 2 characters
//! - at most 253 characters overall

use std::fmt;
use std::net::IpAddr;
use std::sync::LazyLock;

use regex::Regex;
use serde::Serialize;

use crate::error_handling::DiagnosticError;

static HOSTNAME_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^(?:[a-z0-9](?:[a-z0-9-]{0,61}[a-z0-9])?\.)+[a-z0-9][a-z0-9-]{0,61}[a-z0-9]$",
    )
    .expect("hostname pattern is a valid regex")
});

const MAX_HOSTNAME_LENGTH: usize = 253;

/// Returns true if `name` satisfies the hostname grammar.
///
/// The check is case-insensitive; callers that want the canonical form should
/// go through [`ValidatedDomain::parse`].
pub fn is_valid_hostname(name: &str) -> bool {
    name.len() <= MAX_HOSTNAME_LENGTH && HOSTNAME_RE.is_match(&name.to_ascii_lowercase())
}

/// A hostname that passed the admission grammar, stored lowercased.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct ValidatedDomain(String);

impl ValidatedDomain {
    /// Validates and normalizes a hostname.
    ///
    /// Surrounding whitespace and a single trailing dot are removed and the
    /// name is lowercased before the grammar check.
    ///
    /// # Errors
    ///
    /// Returns `DiagnosticError::InvalidTarget` if the name fails the grammar.
    pub fn parse(input: &str) -> Result<Self, DiagnosticError> {
        let trimmed = input.trim();
        let trimmed = trimmed.strip_suffix('.').unwrap_or(trimmed);
        let normalized = trimmed.to_ascii_lowercase();
        if is_valid_hostname(&normalized) {
            Ok(ValidatedDomain(normalized))
        } else {
            Err(DiagnosticError::InvalidTarget(format!(
                "'{}' is not a valid domain name",
                input.trim()
            )))
        }
    }

    /// The normalized hostname.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ValidatedDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for ValidatedDomain {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// What a diagnostic run is pointed at.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(untagged)]
pub enum ProbeTarget {
    /// A validated hostname.
    Domain(ValidatedDomain),
    /// A literal IPv4 or IPv6 address.
    Ip(IpAddr),
}

impl ProbeTarget {
    /// Parses user input as an IP address first, then as a hostname.
    ///
    /// # Errors
    ///
    /// Returns `DiagnosticError::InvalidTarget` (status 400) if the input is neither.
    pub fn parse(input: &str) -> Result<Self, DiagnosticError> {
        let trimmed = input.trim();
        if let Ok(ip) = trimmed.parse::<IpAddr>() {
            return Ok(ProbeTarget::Ip(ip));
        }
        // Bracketed IPv6 as typed in URLs
        if let Some(inner) = trimmed.strip_prefix('[').and_then(|s| s.strip_suffix(']')) {
            if let Ok(ip) = inner.parse::<IpAddr>() {
                return Ok(ProbeTarget::Ip(ip));
            }
        }
        ValidatedDomain::parse(trimmed).map(ProbeTarget::Domain)
    }

    /// The host string to connect to or query.
    pub fn host(&self) -> String {
        match self {
            ProbeTarget::Domain(d) => d.to_string(),
            ProbeTarget::Ip(ip) => ip.to_string(),
        }
    }

    /// The validated domain, if this target is one.
    pub fn as_domain(&self) -> Option<&ValidatedDomain> {
        match self {
            ProbeTarget::Domain(d) => Some(d),
            ProbeTarget::Ip(_) => None,
        }
    }
}

impl fmt::Display for ProbeTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeTarget::Domain(d) => d.fmt(f),
            ProbeTarget::Ip(ip) => ip.fmt(f),
        }
    }
}
