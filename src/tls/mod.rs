//! TLS/SSL certificate diagnostics.
//!
//! This module connects to TLS endpoints and reports:
//! - The presented certificate (names, validity, fingerprints, SANs, key,
//!   signature algorithm, issuer chain) and whether it would be trusted
//! - Which protocol versions the server accepts
//! - Which cipher suites the server accepts
//! - Which of the configured TLS ports answer with a handshake
//! - A security score, letter grade and expiry risk
//!
//! Certificate inspection uses `tokio-rustls` with validation disabled and
//! `x509-parser` for parsing. The matrices use a raw ClientHello probe so
//! legacy versions and suites can be tested.

mod catalog;
mod certificate;
mod connector;
mod handshake;
mod matrix;
mod ports;
mod scoring;

#[cfg(test)]
pub(crate) mod test_helpers;

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use chrono::Utc;
use serde::Serialize;
use trust_dns_resolver::TokioAsyncResolver;

use crate::config::DiagnosticsConfig;
use crate::dns::resolve_host_to_ip;
use crate::error_handling::{DiagnosticError, TlsProbeError};
use crate::target::ProbeTarget;
use crate::utils::TimedResult;

pub use catalog::{
    cipher_by_code, cipher_name, ciphers_for, CipherSpec, CipherStrength, TlsVersion,
    CIPHER_SUITES,
};
pub use certificate::{
    certificate_info, CertificateInfo, CertificateSummary, ChainCertificate, Fingerprints,
};
pub use connector::{open_session, verify_trust, TlsSession};
pub use handshake::{
    alert_name, build_client_hello, parse_server_hello, probe_handshake, read_server_hello,
    HandshakeError, Negotiated,
};
pub use matrix::{
    test_cipher_matrix, test_protocol_matrix, CipherSupport, CipherSupportMatrix,
    ProtocolSupport, ProtocolSupportMatrix,
};
pub use ports::{sweep_tls_ports, TlsPortResult};
pub use scoring::{assess, expiry_risk, grade_for, ExpiryLevel, ExpiryRisk, SecurityAssessment};

/// A fetched certificate with the session it came from.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateFetch {
    /// Parsed certificate details.
    #[serde(flatten)]
    pub info: CertificateInfo,
    /// Negotiated protocol.
    pub protocol: String,
    /// Negotiated cipher suite.
    pub cipher: String,
    /// The chain validates for the requested name against the Mozilla roots.
    pub trusted: bool,
    /// Why the chain does not validate.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trust_error: Option<String>,
}

/// Connects without validation, reads the certificate chain and closes.
///
/// # Errors
///
/// Returns `TlsProbeError::NoCertificate` if the server presented none,
/// and other `TlsProbeError` variants for connect, handshake or parse
/// failures.
pub async fn fetch_certificate(
    host: &str,
    addr: SocketAddr,
    config: &DiagnosticsConfig,
) -> Result<CertificateFetch, TlsProbeError> {
    let session = open_session(
        host,
        addr,
        config.connect_timeout,
        config.tls_handshake_timeout,
    )
    .await?;
    if session.certificates.is_empty() {
        return Err(TlsProbeError::NoCertificate);
    }

    let info = certificate_info(&session.certificates, Utc::now())?;
    let trust_error = verify_trust(&session.certificates, host).err();
    if let Some(reason) = &trust_error {
        log::debug!("Certificate for {host} is not trusted: {reason}");
    }

    Ok(CertificateFetch {
        info,
        protocol: session.protocol,
        cipher: session.cipher,
        trusted: trust_error.is_none(),
        trust_error,
    })
}

/// Full TLS diagnostics for one host and port.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SslDiagnostics {
    /// Host name used for SNI and trust checks.
    pub host: String,
    /// Port the certificate and matrices were tested on.
    pub port: u16,
    /// Address connected to.
    pub ip: IpAddr,
    /// Certificate fetch result.
    pub certificate: TimedResult<CertificateFetch>,
    /// Protocol version support, newest first.
    pub protocol_support: ProtocolSupportMatrix,
    /// Cipher suite support, strongest first.
    pub cipher_support: CipherSupportMatrix,
    /// Handshake results on the configured TLS ports.
    pub port_scan: Vec<TlsPortResult>,
    /// Score and grade.
    pub security: SecurityAssessment,
    /// Expiry band, when a certificate was read.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry: Option<ExpiryRisk>,
}

/// Runs certificate fetch, both matrices and the port sweep concurrently.
///
/// # Errors
///
/// Returns `DiagnosticError::NotFound` when the server presents no
/// certificate and the resolver error when a domain has no address. Other
/// fetch failures are reported inside the result with a zero score.
pub async fn run_ssl_diagnostics(
    resolver: &TokioAsyncResolver,
    config: &DiagnosticsConfig,
    target: &ProbeTarget,
    port: u16,
) -> Result<SslDiagnostics, DiagnosticError> {
    let host = target.host();
    let ip = match target {
        ProbeTarget::Ip(ip) => *ip,
        ProbeTarget::Domain(domain) => {
            resolve_host_to_ip(domain.as_str(), resolver, config.dns_timeout).await?
        }
    };
    let addr = SocketAddr::new(ip, port);
    log::info!("Running SSL diagnostics for {host} ({addr})");

    let fetch = async {
        let start = Instant::now();
        let result = fetch_certificate(&host, addr, config).await;
        (result, start.elapsed())
    };
    let ((fetched, fetch_elapsed), protocols, ciphers, port_scan) = tokio::join!(
        fetch,
        test_protocol_matrix(addr, &host, config),
        test_cipher_matrix(addr, &host, config),
        sweep_tls_ports(&host, ip, config),
    );

    let certificate = match fetched {
        Ok(fetch) => TimedResult::success(fetch, fetch_elapsed),
        Err(TlsProbeError::NoCertificate) => {
            return Err(DiagnosticError::NotFound(format!(
                "No SSL certificate presented by {host}:{port}"
            )))
        }
        Err(e) => {
            log::warn!("Certificate fetch for {host}:{port} failed: {e}");
            TimedResult::failure(e, fetch_elapsed)
        }
    };

    let (security, expiry) = match &certificate.data {
        Some(fetch) => (
            assess(&fetch.info, Some(&protocols), Some(&ciphers)),
            Some(expiry_risk(fetch.info.days_remaining)),
        ),
        None => (SecurityAssessment::unavailable(), None),
    };

    Ok(SslDiagnostics {
        host,
        port,
        ip,
        certificate,
        protocol_support: protocols,
        cipher_support: ciphers,
        port_scan,
        security,
        expiry,
    })
}
