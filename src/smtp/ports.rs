//! Bare TCP connectivity checks on the mail ports.

use std::net::{IpAddr, SocketAddr};
use std::time::{Duration, Instant};

use futures::future::join_all;
use serde::Serialize;
use tokio::net::TcpStream;

use crate::utils::duration_to_ms;

/// Whether one port accepted a TCP connection.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PortTest {
    /// Port tried.
    pub port: u16,
    /// The connection was accepted.
    pub open: bool,
    /// Time to connect or fail.
    pub response_time_ms: f64,
    /// Failure description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Connects to `ip:port` and closes again immediately.
pub async fn test_port(ip: IpAddr, port: u16, timeout: Duration) -> PortTest {
    let start = Instant::now();
    let result = tokio::time::timeout(timeout, TcpStream::connect(SocketAddr::new(ip, port))).await;
    let response_time_ms = duration_to_ms(start.elapsed());
    let error = match result {
        // Stream dropped here, closing the connection
        Ok(Ok(_stream)) => None,
        Ok(Err(e)) => Some(e.to_string()),
        Err(_) => Some(format!("connect timed out after {}ms", timeout.as_millis())),
    };
    PortTest {
        port,
        open: error.is_none(),
        response_time_ms,
        error,
    }
}

/// Tests every port concurrently, results in input order.
pub async fn test_ports(ip: IpAddr, ports: &[u16], timeout: Duration) -> Vec<PortTest> {
    join_all(ports.iter().map(|&port| test_port(ip, port, timeout))).await
}
