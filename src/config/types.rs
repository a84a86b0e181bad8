//! Configuration types.
//!
//! This module defines the log options parsed from the command line and the
//! `DiagnosticsConfig` struct that carries every timeout budget the engine uses.

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use crate::config::constants::{
    CATEGORY_TIMEOUT_SECS, DEFAULT_EHLO_NAME, DEFAULT_TLS_PORTS, DNSBL_GROUP_TIMEOUT_SECS,
    DNSBL_TIMEOUT_SECS, DNS_PORT, DNS_TIMEOUT_SECS, RAW_DNS_TIMEOUT, RAW_QUERY_RESOLVER,
    SMTPS_PORT, SMTP_GROUP_TIMEOUT_SECS, SMTP_HOST_TIMEOUT_SECS, SMTP_PORT, SUBMISSION_PORT,
    TCP_CONNECT_TIMEOUT_SECS, TLS_GROUP_TIMEOUT_SECS, TLS_HANDSHAKE_TIMEOUT_SECS,
};

/// Logging level for the application.
///
/// Controls the verbosity of log output, from most restrictive (Error) to most
/// verbose (Trace).
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogLevel {
    /// Only error messages
    Error,
    /// Error and warning messages
    Warn,
    /// Error, warning, and informational messages
    Info,
    /// All messages except trace
    Debug,
    /// All messages including trace
    Trace,
}

impl From<LogLevel> for log::LevelFilter {
    fn from(l: LogLevel) -> Self {
        match l {
            LogLevel::Error => log::LevelFilter::Error,
            LogLevel::Warn => log::LevelFilter::Warn,
            LogLevel::Info => log::LevelFilter::Info,
            LogLevel::Debug => log::LevelFilter::Debug,
            LogLevel::Trace => log::LevelFilter::Trace,
        }
    }
}

impl FromStr for LogLevel {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "error" => Ok(LogLevel::Error),
            "warn" | "warning" => Ok(LogLevel::Warn),
            "info" => Ok(LogLevel::Info),
            "debug" => Ok(LogLevel::Debug),
            "trace" => Ok(LogLevel::Trace),
            other => Err(format!("unknown log level '{other}'")),
        }
    }
}

/// Log output format.
///
/// - `Plain`: Human-readable format with colors (default)
/// - `Json`: Structured JSON format for machine parsing
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable format with colors (default)
    Plain,
    /// Structured JSON format for machine parsing
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "plain" => Ok(LogFormat::Plain),
            "json" => Ok(LogFormat::Json),
            other => Err(format!("unknown log format '{other}'")),
        }
    }
}

/// Ports of the three mail services probed on every MX host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MailPorts {
    /// Plain SMTP, where the EHLO handshake runs.
    pub smtp: u16,
    /// Implicit-TLS SMTP.
    pub smtps: u16,
    /// Submission.
    pub submission: u16,
}

impl Default for MailPorts {
    fn default() -> Self {
        MailPorts {
            smtp: SMTP_PORT,
            smtps: SMTPS_PORT,
            submission: SUBMISSION_PORT,
        }
    }
}

impl MailPorts {
    /// All three ports in probe order.
    pub fn all(&self) -> [u16; 3] {
        [self.smtp, self.smtps, self.submission]
    }
}

/// Timeout budgets and probe parameters for one engine instance.
///
/// Individual budgets bound a single attempt (one DNS query, one SMTP
/// conversation, one TLS handshake). Group budgets bound a whole set of
/// already-guarded attempts.
///
/// # Examples
///
/// ```
/// use domain_diagnostics::DiagnosticsConfig;
/// use std::time::Duration;
///
/// let config = DiagnosticsConfig {
///     smtp_group_timeout: Duration::from_secs(30),
///     ..Default::default()
/// };
/// assert_eq!(config.tls_ports, vec![443, 465, 993, 995, 8443]);
/// ```
#[derive(Debug, Clone)]
pub struct DiagnosticsConfig {
    /// Timeout for one resolver lookup.
    pub dns_timeout: Duration,
    /// Timeout for one raw DNS exchange (TTL, DNSSEC, direct nameserver query).
    pub raw_dns_timeout: Duration,
    /// Recursive resolver used for raw queries.
    pub raw_query_resolver: SocketAddr,
    /// Timeout for a bare TCP connect.
    pub connect_timeout: Duration,
    /// Timeout for one TLS handshake attempt.
    pub tls_handshake_timeout: Duration,
    /// Budget for the whole TLS inspection of one endpoint.
    pub tls_group_timeout: Duration,
    /// Budget for the SMTP conversation with one MX host.
    pub smtp_host_timeout: Duration,
    /// Budget for all MX hosts combined.
    pub smtp_group_timeout: Duration,
    /// Timeout for one DNSBL provider lookup.
    pub dnsbl_timeout: Duration,
    /// Budget for all provider lookups of one address.
    pub dnsbl_group_timeout: Duration,
    /// Budget for one whole diagnostic category.
    pub category_timeout: Duration,
    /// Ports swept by the TLS port scan.
    pub tls_ports: Vec<u16>,
    /// Mail ports probed on each MX host.
    pub mail_ports: MailPorts,
    /// Name announced in EHLO.
    pub ehlo_name: String,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            dns_timeout: Duration::from_secs(DNS_TIMEOUT_SECS),
            raw_dns_timeout: RAW_DNS_TIMEOUT,
            raw_query_resolver: SocketAddr::new(RAW_QUERY_RESOLVER, DNS_PORT),
            connect_timeout: Duration::from_secs(TCP_CONNECT_TIMEOUT_SECS),
            tls_handshake_timeout: Duration::from_secs(TLS_HANDSHAKE_TIMEOUT_SECS),
            tls_group_timeout: Duration::from_secs(TLS_GROUP_TIMEOUT_SECS),
            smtp_host_timeout: Duration::from_secs(SMTP_HOST_TIMEOUT_SECS),
            smtp_group_timeout: Duration::from_secs(SMTP_GROUP_TIMEOUT_SECS),
            dnsbl_timeout: Duration::from_secs(DNSBL_TIMEOUT_SECS),
            dnsbl_group_timeout: Duration::from_secs(DNSBL_GROUP_TIMEOUT_SECS),
            category_timeout: Duration::from_secs(CATEGORY_TIMEOUT_SECS),
            tls_ports: DEFAULT_TLS_PORTS.to_vec(),
            mail_ports: MailPorts::default(),
            ehlo_name: DEFAULT_EHLO_NAME.to_string(),
        }
    }
}

impl DiagnosticsConfig {
    /// Scales every individual probe timeout to `secs`, leaving group budgets
    /// at least as large as the individual ones.
    pub fn with_probe_timeout(mut self, secs: u64) -> Self {
        let probe = Duration::from_secs(secs.max(1));
        self.dns_timeout = probe;
        self.raw_dns_timeout = probe;
        self.connect_timeout = probe;
        self.tls_handshake_timeout = probe;
        self.dnsbl_timeout = probe;
        self.smtp_host_timeout = self.smtp_host_timeout.max(probe);
        self.smtp_group_timeout = self.smtp_group_timeout.max(self.smtp_host_timeout);
        self.tls_group_timeout = self.tls_group_timeout.max(probe);
        self.dnsbl_group_timeout = self.dnsbl_group_timeout.max(probe);
        self.category_timeout = self.category_timeout.max(self.smtp_group_timeout);
        self
    }
}
