//! Implicit-TLS (SMTPS) probe.

use std::net::{IpAddr, SocketAddr};

use serde::Serialize;

use crate::config::DiagnosticsConfig;
use crate::error_handling::TlsProbeError;
use crate::tls::{fetch_certificate, CertificateSummary};

/// Session and certificate seen on the SMTPS port.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SmtpTlsDetails {
    /// A TLS session was established.
    pub secure: bool,
    /// Negotiated protocol.
    pub protocol: String,
    /// Negotiated cipher suite.
    pub cipher: String,
    /// Leaf certificate summary.
    pub certificate: CertificateSummary,
    /// The chain validates for the MX host name.
    pub trusted: bool,
}

/// Opens a direct TLS session to the SMTPS port of `ip` for `host`.
///
/// Independent of the plaintext EHLO probe; its outcome never gates it.
pub async fn probe_smtps(
    host: &str,
    ip: IpAddr,
    config: &DiagnosticsConfig,
) -> Result<SmtpTlsDetails, TlsProbeError> {
    let addr = SocketAddr::new(ip, config.mail_ports.smtps);
    let fetch = fetch_certificate(host, addr, config).await?;
    Ok(SmtpTlsDetails {
        secure: true,
        protocol: fetch.protocol,
        cipher: fetch.cipher,
        certificate: CertificateSummary::from(&fetch.info),
        trusted: fetch.trusted,
    })
}
