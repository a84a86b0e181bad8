//! Protocol-version and cipher-suite support matrices.
//!
//! Every matrix entry is an independent raw handshake on its own connection.
//! Entries run concurrently under the TLS group budget; one entry's failure
//! never keeps the others from being attempted.

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use serde::Serialize;

use super::catalog::{cipher_name, ciphers_for, CipherStrength, TlsVersion, CIPHER_SUITES};
use super::handshake::{probe_handshake, HandshakeError, Negotiated};
use crate::config::DiagnosticsConfig;
use crate::utils::{duration_to_ms, join_all_within};

/// Result of forcing one protocol version.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProtocolSupport {
    /// Version offered as both floor and ceiling.
    pub protocol: TlsVersion,
    /// The server selected exactly this version.
    pub supported: bool,
    /// Time for this entry's handshake.
    pub response_time_ms: f64,
    /// Suite the server picked, when supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiated_cipher: Option<String>,
    /// Why the version was not accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Result of offering one cipher suite alone.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CipherSupport {
    /// IANA suite name.
    pub cipher: &'static str,
    /// Strength class from the catalog.
    pub strength: CipherStrength,
    /// Version the suite was offered under.
    pub offered_with: TlsVersion,
    /// The server selected this suite.
    pub supported: bool,
    /// Time for this entry's handshake.
    pub response_time_ms: f64,
    /// Version the server selected, when supported.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub negotiated_version: Option<TlsVersion>,
    /// Why the suite was not accepted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// One entry per catalog version, newest first.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct ProtocolSupportMatrix {
    /// Entries in catalog order.
    pub entries: Vec<ProtocolSupport>,
}

impl ProtocolSupportMatrix {
    /// Whether `version` was accepted.
    pub fn supports(&self, version: TlsVersion) -> bool {
        self.entries
            .iter()
            .any(|e| e.protocol == version && e.supported)
    }

    /// Accepted versions, newest first.
    pub fn supported_versions(&self) -> Vec<TlsVersion> {
        self.entries
            .iter()
            .filter(|e| e.supported)
            .map(|e| e.protocol)
            .collect()
    }
}

/// One entry per catalog cipher suite, strongest first.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(transparent)]
pub struct CipherSupportMatrix {
    /// Entries in catalog order.
    pub entries: Vec<CipherSupport>,
}

impl CipherSupportMatrix {
    /// Names of accepted suites of the given strength.
    pub fn supported_with_strength(&self, strength: CipherStrength) -> Vec<&'static str> {
        self.entries
            .iter()
            .filter(|e| e.supported && e.strength == strength)
            .map(|e| e.cipher)
            .collect()
    }
}

fn group_timeout_error(budget: Duration) -> String {
    format!("TLS matrix timed out after {}ms", budget.as_millis())
}

async fn handshake(
    addr: SocketAddr,
    server_name: &str,
    version: TlsVersion,
    ciphers: &[u16],
    config: &DiagnosticsConfig,
) -> (Result<Negotiated, HandshakeError>, f64) {
    let start = Instant::now();
    let result = probe_handshake(
        addr,
        server_name,
        version,
        ciphers,
        config.connect_timeout,
        config.tls_handshake_timeout,
    )
    .await;
    (result, duration_to_ms(start.elapsed()))
}

/// Forces each catalog version in turn and records which ones the server accepts.
///
/// Always returns exactly one entry per version.
pub async fn test_protocol_matrix(
    addr: SocketAddr,
    server_name: &str,
    config: &DiagnosticsConfig,
) -> ProtocolSupportMatrix {
    let probes: Vec<_> = TlsVersion::ALL
        .into_iter()
        .map(|version| async move {
            let ciphers = ciphers_for(version);
            let (result, elapsed) = handshake(addr, server_name, version, &ciphers, config).await;
            match result {
                Ok(negotiated) if negotiated.version == version.wire_code() => ProtocolSupport {
                    protocol: version,
                    supported: true,
                    response_time_ms: elapsed,
                    negotiated_cipher: Some(cipher_name(negotiated.cipher)),
                    error: None,
                },
                Ok(negotiated) => ProtocolSupport {
                    protocol: version,
                    supported: false,
                    response_time_ms: elapsed,
                    negotiated_cipher: None,
                    error: Some(format!(
                        "server selected version 0x{:04X} instead",
                        negotiated.version
                    )),
                },
                Err(e) => ProtocolSupport {
                    protocol: version,
                    supported: false,
                    response_time_ms: elapsed,
                    negotiated_cipher: None,
                    error: Some(e.to_string()),
                },
            }
        })
        .collect();

    let budget = config.tls_group_timeout;
    let entries = join_all_within(probes, budget, |index| ProtocolSupport {
        protocol: TlsVersion::ALL[index],
        supported: false,
        response_time_ms: duration_to_ms(budget),
        negotiated_cipher: None,
        error: Some(group_timeout_error(budget)),
    })
    .await;

    log::debug!(
        "Protocol matrix for {server_name} ({addr}): {:?}",
        entries
            .iter()
            .filter(|e| e.supported)
            .map(|e| e.protocol.as_str())
            .collect::<Vec<_>>()
    );
    ProtocolSupportMatrix { entries }
}

/// Offers each catalog suite as the only choice and records which ones the
/// server selects.
///
/// TLS 1.3 suites are offered in a TLS 1.3 hello, all others in a TLS 1.2
/// hello. Always returns exactly one entry per suite.
pub async fn test_cipher_matrix(
    addr: SocketAddr,
    server_name: &str,
    config: &DiagnosticsConfig,
) -> CipherSupportMatrix {
    let probes: Vec<_> = CIPHER_SUITES
        .iter()
        .map(|spec| async move {
            let offered_with = if spec.is_tls13() {
                TlsVersion::Tls13
            } else {
                TlsVersion::Tls12
            };
            let (result, elapsed) =
                handshake(addr, server_name, offered_with, &[spec.code], config).await;
            let base = CipherSupport {
                cipher: spec.name,
                strength: spec.strength,
                offered_with,
                supported: false,
                response_time_ms: elapsed,
                negotiated_version: None,
                error: None,
            };
            match result {
                Ok(negotiated) if negotiated.cipher == spec.code => CipherSupport {
                    supported: true,
                    negotiated_version: negotiated.tls_version(),
                    ..base
                },
                Ok(negotiated) => CipherSupport {
                    error: Some(format!(
                        "server selected {} instead",
                        cipher_name(negotiated.cipher)
                    )),
                    ..base
                },
                Err(e) => CipherSupport {
                    error: Some(e.to_string()),
                    ..base
                },
            }
        })
        .collect();

    let budget = config.tls_group_timeout;
    let entries = join_all_within(probes, budget, |index| {
        let spec = &CIPHER_SUITES[index];
        CipherSupport {
            cipher: spec.name,
            strength: spec.strength,
            offered_with: if spec.is_tls13() {
                TlsVersion::Tls13
            } else {
                TlsVersion::Tls12
            },
            supported: false,
            response_time_ms: duration_to_ms(budget),
            negotiated_version: None,
            error: Some(group_timeout_error(budget)),
        }
    })
    .await;

    CipherSupportMatrix { entries }
}
