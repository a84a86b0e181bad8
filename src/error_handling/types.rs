//! Error type definitions.
//!
//! This module defines the error enums used at every seam of the engine and
//! the `ErrorType` categories counted per diagnostic run.

use log::SetLoggerError;
use strum_macros::EnumIter as EnumIterMacro;
use thiserror::Error;

/// Error types for initialization failures.
#[derive(Error, Debug)]
#[allow(clippy::enum_variant_names)] // All variants end with "Error" by convention
pub enum InitializationError {
    /// Error initializing the logger.
    #[error("Logger initialization error: {0}")]
    LoggerError(#[from] SetLoggerError),

    /// Error initializing the DNS resolver.
    #[error("DNS resolver initialization error: {0}")]
    DnsResolverError(String),
}

/// Top-level failure of one diagnostic category.
///
/// Every variant maps to an HTTP-style status code so a routing layer can
/// frame the response without inspecting the message.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DiagnosticError {
    /// The target is not a valid hostname or IP address.
    #[error("Invalid target: {0}")]
    InvalidTarget(String),

    /// The thing being diagnosed does not exist (no MX records, no certificate).
    #[error("{0}")]
    NotFound(String),

    /// The category did not finish inside its budget.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        /// Name of the operation that was abandoned.
        operation: String,
        /// Budget that expired, in milliseconds.
        after_ms: u64,
    },

    /// The resolver could not be reached at all.
    #[error("DNS resolution failed: {0}")]
    Resolver(String),

    /// Anything else that should abort the request.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl DiagnosticError {
    /// HTTP-style status code for this failure.
    pub fn status_code(&self) -> u16 {
        match self {
            DiagnosticError::InvalidTarget(_) => 400,
            DiagnosticError::NotFound(_) => 404,
            DiagnosticError::Timeout { .. } => 408,
            DiagnosticError::Resolver(_) | DiagnosticError::Internal(_) => 500,
        }
    }
}

/// Failure of a single probe.
///
/// These never cross a probe boundary as faults; they are rendered into the
/// `error` field of the probe's `TimedResult`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProbeError {
    /// The probe did not finish before its deadline.
    #[error("{operation} timed out after {after_ms}ms")]
    Timeout {
        /// Name of the abandoned operation.
        operation: String,
        /// Deadline in milliseconds.
        after_ms: u64,
    },

    /// Connect, read or write failed.
    #[error("{0}")]
    Transport(String),

    /// The peer answered with something we could not use.
    #[error("{0}")]
    Protocol(String),

    /// The query succeeded but produced nothing.
    #[error("{0}")]
    NotFound(String),
}

impl From<std::io::Error> for ProbeError {
    fn from(e: std::io::Error) -> Self {
        ProbeError::Transport(e.to_string())
    }
}

impl From<ProbeError> for DiagnosticError {
    fn from(e: ProbeError) -> Self {
        match e {
            ProbeError::Timeout {
                operation,
                after_ms,
            } => DiagnosticError::Timeout {
                operation,
                after_ms,
            },
            ProbeError::NotFound(msg) => DiagnosticError::NotFound(msg),
            ProbeError::Transport(msg) | ProbeError::Protocol(msg) => {
                DiagnosticError::Internal(msg)
            }
        }
    }
}

/// Failures of a TLS connection or handshake probe.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TlsProbeError {
    /// The host cannot be used as a TLS server name.
    #[error("Invalid server name: {0}")]
    InvalidServerName(String),

    /// TCP connect failed.
    #[error("Connection failed: {0}")]
    Connect(String),

    /// A deadline expired.
    #[error("{stage} timed out after {after_ms}ms")]
    Timeout {
        /// Connect or handshake.
        stage: &'static str,
        /// Deadline in milliseconds.
        after_ms: u64,
    },

    /// The handshake failed or the peer sent something unusable.
    #[error("TLS handshake failed: {0}")]
    Handshake(String),

    /// The handshake completed without a server certificate.
    #[error("No certificate presented by server")]
    NoCertificate,

    /// The certificate could not be parsed.
    #[error("Certificate parse error: {0}")]
    Certificate(String),
}

impl From<TlsProbeError> for ProbeError {
    fn from(e: TlsProbeError) -> Self {
        match e {
            TlsProbeError::Timeout { stage, after_ms } => ProbeError::Timeout {
                operation: format!("TLS {stage}"),
                after_ms,
            },
            TlsProbeError::NoCertificate => ProbeError::NotFound(e.to_string()),
            TlsProbeError::Certificate(_) | TlsProbeError::Handshake(_) => {
                ProbeError::Protocol(e.to_string())
            }
            TlsProbeError::InvalidServerName(_) | TlsProbeError::Connect(_) => {
                ProbeError::Transport(e.to_string())
            }
        }
    }
}

/// Failures of an SMTP conversation.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SmtpError {
    /// TCP connect failed.
    #[error("connection failed: {0}")]
    ConnectionFailed(String),

    /// The peer closed the connection before the reply was complete.
    #[error("connection closed by server while {0}")]
    ConnectionClosed(&'static str),

    /// The server's first reply was not a 220 greeting.
    #[error("unexpected greeting: {0}")]
    UnexpectedGreeting(String),

    /// The server answered EHLO with something other than 250.
    #[error("EHLO rejected: {0}")]
    EhloRejected(String),

    /// A reply line was not `NNN` followed by a space or dash.
    #[error("malformed reply line: {0}")]
    MalformedLine(String),

    /// A line or reply exceeded the configured limits.
    #[error("reply exceeds {0}")]
    ReplyTooLarge(&'static str),

    /// Read or write failed mid-conversation.
    #[error("I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for SmtpError {
    fn from(e: std::io::Error) -> Self {
        SmtpError::Io(e.to_string())
    }
}

impl From<SmtpError> for ProbeError {
    fn from(e: SmtpError) -> Self {
        match e {
            SmtpError::ConnectionFailed(_) | SmtpError::Io(_) | SmtpError::ConnectionClosed(_) => {
                ProbeError::Transport(e.to_string())
            }
            _ => ProbeError::Protocol(e.to_string()),
        }
    }
}

/// Outcome of one DNSBL lookup that did not return an address.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DnsblError {
    /// NXDOMAIN or an empty answer: the provider's "not listed" signal.
    #[error("not listed")]
    NotListed,

    /// The provider did not answer in time.
    #[error("DNSBL lookup timed out after {after_ms}ms")]
    Timeout { after_ms: u64 },

    /// Any other resolver failure (SERVFAIL, refused, network error).
    #[error("DNSBL lookup failed: {0}")]
    Lookup(String),
}

/// Categories of probe failures counted during a diagnostic run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, EnumIterMacro)]
pub enum ErrorType {
    // DNS errors
    DnsLookupError,
    DnsRawQueryError,
    DnsNameserverError,
    DnsPropagationError,
    // SMTP errors
    SmtpConnectError,
    SmtpProtocolError,
    SmtpTlsError,
    // TLS errors
    TlsHandshakeError,
    TlsCertificateError,
    // DNSBL errors (NXDOMAIN is not an error)
    DnsblLookupError,
    // Deadline expiry of any probe
    ProbeTimeout,
}

impl std::fmt::Display for ErrorType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl ErrorType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorType::DnsLookupError => "DNS lookup error",
            ErrorType::DnsRawQueryError => "DNS raw query error",
            ErrorType::DnsNameserverError => "DNS nameserver error",
            ErrorType::DnsPropagationError => "DNS propagation error",
            ErrorType::SmtpConnectError => "SMTP connect error",
            ErrorType::SmtpProtocolError => "SMTP protocol error",
            ErrorType::SmtpTlsError => "SMTP TLS error",
            ErrorType::TlsHandshakeError => "TLS handshake error",
            ErrorType::TlsCertificateError => "TLS certificate error",
            ErrorType::DnsblLookupError => "DNSBL lookup error",
            ErrorType::ProbeTimeout => "Probe timeout",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    #[test]
    fn test_status_codes() {
        assert_eq!(DiagnosticError::InvalidTarget("x".into()).status_code(), 400);
        assert_eq!(DiagnosticError::NotFound("x".into()).status_code(), 404);
        assert_eq!(
            DiagnosticError::Timeout {
                operation: "smtp".into(),
                after_ms: 10
            }
            .status_code(),
            408
        );
        assert_eq!(DiagnosticError::Resolver("x".into()).status_code(), 500);
        assert_eq!(DiagnosticError::Internal("x".into()).status_code(), 500);
    }

    #[test]
    fn test_probe_timeout_message() {
        let err = ProbeError::Timeout {
            operation: "EHLO mx.example.com".into(),
            after_ms: 50,
        };
        assert_eq!(err.to_string(), "EHLO mx.example.com timed out after 50ms");
    }

    #[test]
    fn test_probe_error_converts_to_diagnostic_error() {
        let not_found: DiagnosticError = ProbeError::NotFound("No certificate".into()).into();
        assert_eq!(not_found.status_code(), 404);

        let timeout: DiagnosticError = ProbeError::Timeout {
            operation: "tls".into(),
            after_ms: 5,
        }
        .into();
        assert_eq!(timeout.status_code(), 408);
    }

    #[test]
    fn test_tls_errors_classify() {
        assert_eq!(
            ProbeError::from(TlsProbeError::NoCertificate),
            ProbeError::NotFound("No certificate presented by server".into())
        );
        let timeout = ProbeError::from(TlsProbeError::Timeout {
            stage: "handshake",
            after_ms: 10,
        });
        assert_eq!(timeout.to_string(), "TLS handshake timed out after 10ms");
    }

    #[test]
    fn test_smtp_connection_failure_message() {
        let err = SmtpError::ConnectionFailed("Connection refused".into());
        assert_eq!(err.to_string(), "connection failed: Connection refused");
        assert!(matches!(ProbeError::from(err), ProbeError::Transport(_)));
    }

    #[test]
    fn test_all_error_types_have_string_representation() {
        for error_type in ErrorType::iter() {
            let str_repr = error_type.as_str();
            assert!(
                !str_repr.is_empty(),
                "ErrorType {:?} should have a non-empty string representation",
                error_type
            );
            assert_eq!(error_type.to_string(), str_repr);
        }
    }
}
