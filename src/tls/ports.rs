//! TLS port sweep.

use std::net::{IpAddr, SocketAddr};
use std::time::Instant;

use serde::Serialize;

use super::connector::open_session;
use crate::config::DiagnosticsConfig;
use crate::utils::{duration_to_ms, join_all_within};

/// Whether a TLS session could be established on one port.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TlsPortResult {
    /// Port tried.
    pub port: u16,
    /// A handshake completed.
    pub secure: bool,
    /// Negotiated protocol.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub protocol: Option<String>,
    /// Negotiated cipher suite.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cipher: Option<String>,
    /// Time to connect and handshake.
    pub response_time_ms: f64,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Attempts a TLS session on every configured port of `ip`.
pub async fn sweep_tls_ports(
    host: &str,
    ip: IpAddr,
    config: &DiagnosticsConfig,
) -> Vec<TlsPortResult> {
    let probes: Vec<_> = config
        .tls_ports
        .iter()
        .map(|&port| async move {
            let start = Instant::now();
            let result = open_session(
                host,
                SocketAddr::new(ip, port),
                config.connect_timeout,
                config.tls_handshake_timeout,
            )
            .await;
            let elapsed = duration_to_ms(start.elapsed());
            match result {
                Ok(session) => TlsPortResult {
                    port,
                    secure: true,
                    protocol: Some(session.protocol),
                    cipher: Some(session.cipher),
                    response_time_ms: elapsed,
                    error: None,
                },
                Err(e) => TlsPortResult {
                    port,
                    secure: false,
                    protocol: None,
                    cipher: None,
                    response_time_ms: elapsed,
                    error: Some(e.to_string()),
                },
            }
        })
        .collect();

    let budget = config.tls_group_timeout;
    join_all_within(probes, budget, |index| TlsPortResult {
        port: config.tls_ports[index],
        secure: false,
        protocol: None,
        cipher: None,
        response_time_ms: duration_to_ms(budget),
        error: Some(format!("TLS port sweep timed out after {}ms", budget.as_millis())),
    })
    .await
}
