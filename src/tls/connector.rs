//! TLS connections for certificate inspection.
//!
//! Inspection connects with certificate validation disabled so expired,
//! self-signed and mismatched certificates can still be read. Whether the
//! chain would have been trusted is checked separately against the Mozilla
//! root set and reported next to the certificate, never used as a gate.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::client::WebPkiServerVerifier;
use rustls::crypto::{ring, CryptoProvider};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, Error as RustlsError, RootCertStore, SignatureScheme};
use tokio::io::AsyncWriteExt;
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;

use crate::error_handling::TlsProbeError;

/// Verifier that accepts any certificate; inspection must see invalid ones too.
#[derive(Debug)]
struct InspectionVerifier {
    schemes: Vec<SignatureScheme>,
}

impl ServerCertVerifier for InspectionVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, RustlsError> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, RustlsError> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        self.schemes.clone()
    }
}

fn provider() -> Arc<CryptoProvider> {
    Arc::new(ring::default_provider())
}

fn inspection_config() -> Result<ClientConfig, TlsProbeError> {
    let provider = provider();
    let verifier = InspectionVerifier {
        schemes: provider
            .signature_verification_algorithms
            .supported_schemes(),
    };
    let config = ClientConfig::builder_with_provider(provider)
        .with_protocol_versions(&[&rustls::version::TLS13, &rustls::version::TLS12])
        .map_err(|e| TlsProbeError::Handshake(e.to_string()))?
        .dangerous()
        .with_custom_certificate_verifier(Arc::new(verifier))
        .with_no_client_auth();
    Ok(config)
}

/// What an inspection handshake negotiated.
#[derive(Debug, Clone)]
pub struct TlsSession {
    /// Negotiated protocol (`"TLSv1.3"`).
    pub protocol: String,
    /// Negotiated cipher suite, IANA name.
    pub cipher: String,
    /// Certificates as sent by the server, leaf first.
    pub certificates: Vec<CertificateDer<'static>>,
}

fn protocol_name(version: rustls::ProtocolVersion) -> String {
    match version {
        rustls::ProtocolVersion::TLSv1_3 => "TLSv1.3".to_string(),
        rustls::ProtocolVersion::TLSv1_2 => "TLSv1.2".to_string(),
        other => format!("{other:?}"),
    }
}

/// Maps a failed handshake to a probe error.
///
/// rustls aborts the handshake itself when the server sends an empty
/// Certificate message, so "no certificate" arrives here as an I/O error
/// wrapping `NoCertificatesPresented`.
fn handshake_error(e: std::io::Error) -> TlsProbeError {
    match e.get_ref().and_then(|inner| inner.downcast_ref::<RustlsError>()) {
        Some(RustlsError::NoCertificatesPresented) => TlsProbeError::NoCertificate,
        _ => TlsProbeError::Handshake(e.to_string()),
    }
}

/// Connects to `addr`, completes a handshake for `host` and closes again.
///
/// # Errors
///
/// Returns `TlsProbeError::NoCertificate` when the server presents no
/// certificate, and other variants for connect/handshake failures and
/// timeouts.
pub async fn open_session(
    host: &str,
    addr: SocketAddr,
    connect_timeout: Duration,
    handshake_timeout: Duration,
) -> Result<TlsSession, TlsProbeError> {
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|e| TlsProbeError::InvalidServerName(format!("{host}: {e}")))?;
    let connector = TlsConnector::from(Arc::new(inspection_config()?));

    let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            log::debug!("Failed to connect to {addr} for {host}: {e}");
            return Err(TlsProbeError::Connect(e.to_string()));
        }
        Err(_) => {
            return Err(TlsProbeError::Timeout {
                stage: "connect",
                after_ms: connect_timeout.as_millis() as u64,
            })
        }
    };

    let mut tls_stream =
        match tokio::time::timeout(handshake_timeout, connector.connect(server_name, stream)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                log::debug!("TLS handshake with {host} ({addr}) failed: {e}");
                return Err(handshake_error(e));
            }
            Err(_) => {
                return Err(TlsProbeError::Timeout {
                    stage: "handshake",
                    after_ms: handshake_timeout.as_millis() as u64,
                })
            }
        };

    let (_, connection) = tls_stream.get_ref();
    let session = TlsSession {
        protocol: connection
            .protocol_version()
            .map(protocol_name)
            .unwrap_or_else(|| "Unknown".to_string()),
        cipher: connection
            .negotiated_cipher_suite()
            .and_then(|cs| cs.suite().as_str())
            .map(str::to_string)
            .unwrap_or_else(|| "Unknown".to_string()),
        certificates: connection
            .peer_certificates()
            .map(|certs| certs.iter().map(|c| c.clone().into_owned()).collect())
            .unwrap_or_default(),
    };

    // Send close_notify; the session has what we need either way
    let _ = tls_stream.shutdown().await;
    Ok(session)
}

/// Checks whether `chain` validates for `host` against the Mozilla root set.
///
/// # Errors
///
/// Returns the verifier's reason when the chain is not trusted.
pub fn verify_trust(chain: &[CertificateDer<'static>], host: &str) -> Result<(), String> {
    let (end_entity, intermediates) = chain
        .split_first()
        .ok_or_else(|| "no certificate presented".to_string())?;
    let server_name =
        ServerName::try_from(host.to_string()).map_err(|e| format!("invalid server name: {e}"))?;

    let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
    let verifier = WebPkiServerVerifier::builder_with_provider(Arc::new(roots), provider())
        .build()
        .map_err(|e| e.to_string())?;
    verifier
        .verify_server_cert(end_entity, intermediates, &server_name, &[], UnixTime::now())
        .map(|_| ())
        .map_err(|e| e.to_string())
}
