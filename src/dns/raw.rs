//! Raw DNS transport.
//!
//! Sends one query built by the wire codec to a specific server over UDP,
//! retrying over TCP when the UDP answer comes back truncated. Used where the
//! resolver API hides what we need: answer TTLs, DNSSEC records, and the AA
//! flag of a direct nameserver answer.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;

use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, UdpSocket};
use trust_dns_resolver::proto::op::{Message, MessageType};
use trust_dns_resolver::proto::rr::RecordType;

use super::wire::{build_query, decode, encode, first_ttl, WireError};
use crate::config::EDNS_UDP_PAYLOAD_SIZE;
use crate::error_handling::ProbeError;

/// Errors from a raw query exchange.
#[derive(Error, Debug)]
pub enum RawQueryError {
    /// The query or the response could not be encoded/decoded.
    #[error("malformed DNS message: {0}")]
    Wire(#[from] WireError),

    /// Socket failure.
    #[error("DNS transport error: {0}")]
    Io(#[from] std::io::Error),

    /// No matching response before the deadline.
    #[error("raw DNS query timed out after {0}ms")]
    Timeout(u64),
}

impl From<RawQueryError> for ProbeError {
    fn from(e: RawQueryError) -> Self {
        match e {
            RawQueryError::Timeout(after_ms) => ProbeError::Timeout {
                operation: "raw DNS query".to_string(),
                after_ms,
            },
            RawQueryError::Wire(e) => ProbeError::Protocol(e.to_string()),
            RawQueryError::Io(e) => ProbeError::Transport(e.to_string()),
        }
    }
}

/// Sends `name`/`record_type` to `server` and returns the decoded response.
///
/// The whole exchange, including a TCP retry after a truncated UDP answer,
/// shares one `timeout`. Sockets are owned by the exchange future and close
/// on every exit path, including the deadline firing.
///
/// # Errors
///
/// Returns `RawQueryError` on socket failure, an undecodable response, or timeout.
pub async fn raw_query(
    server: SocketAddr,
    name: &str,
    record_type: RecordType,
    recursion_desired: bool,
    timeout: Duration,
) -> Result<Message, RawQueryError> {
    let id: u16 = rand::random();
    let query = encode(&build_query(
        id,
        name,
        record_type,
        recursion_desired,
        Some(EDNS_UDP_PAYLOAD_SIZE),
    )?)?;

    let exchange = async {
        let response = exchange_udp(server, id, &query).await?;
        if response.truncated() {
            log::debug!("UDP answer for {name} from {server} truncated, retrying over TCP");
            return exchange_tcp(server, id, &query).await;
        }
        Ok(response)
    };

    match tokio::time::timeout(timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(RawQueryError::Timeout(timeout.as_millis() as u64)),
    }
}

async fn exchange_udp(server: SocketAddr, id: u16, query: &[u8]) -> Result<Message, RawQueryError> {
    let bind_addr: SocketAddr = match server.ip() {
        IpAddr::V4(_) => (Ipv4Addr::UNSPECIFIED, 0).into(),
        IpAddr::V6(_) => (Ipv6Addr::UNSPECIFIED, 0).into(),
    };
    let socket = UdpSocket::bind(bind_addr).await?;
    socket.connect(server).await?;
    socket.send(query).await?;

    let mut buf = vec![0u8; EDNS_UDP_PAYLOAD_SIZE as usize];
    loop {
        let len = socket.recv(&mut buf).await?;
        match decode(&buf[..len]) {
            Ok(message) if message.id() == id && message.message_type() == MessageType::Response => {
                return Ok(message)
            }
            Ok(message) => {
                // Stray or spoofed datagram; keep waiting for ours
                log::debug!("Ignoring DNS datagram with id {} (expected {id})", message.id());
            }
            Err(e) => log::debug!("Ignoring undecodable DNS datagram from {server}: {e}"),
        }
    }
}

async fn exchange_tcp(server: SocketAddr, id: u16, query: &[u8]) -> Result<Message, RawQueryError> {
    let mut stream = TcpStream::connect(server).await?;
    let mut framed = Vec::with_capacity(query.len() + 2);
    framed.extend_from_slice(&(query.len() as u16).to_be_bytes());
    framed.extend_from_slice(query);
    stream.write_all(&framed).await?;

    let len = stream.read_u16().await? as usize;
    let mut buf = vec![0u8; len];
    stream.read_exact(&mut buf).await?;
    let message = decode(&buf)?;
    if message.id() != id {
        return Err(RawQueryError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("DNS response id {} does not match query id {id}", message.id()),
        )));
    }
    Ok(message)
}

/// Reads the TTL of the first `record_type` answer for `name`.
///
/// Best effort: any failure is logged and yields `None`.
pub async fn fetch_ttl(
    server: SocketAddr,
    name: &str,
    record_type: RecordType,
    timeout: Duration,
) -> Option<u32> {
    match raw_query(server, name, record_type, true, timeout).await {
        Ok(message) => first_ttl(&message, record_type),
        Err(e) => {
            log::debug!("TTL lookup for {name} via {server} failed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dns::test_helpers::{a, build_response, encode_reply, response_to, spawn_udp_responder, txt};

    #[tokio::test]
    async fn test_fetch_ttl_reads_answer_ttl() {
        let server =
            spawn_udp_responder(|query| vec![build_response(query, &[(300, a([192, 0, 2, 10]))])]).await;

        let ttl = fetch_ttl(server, "example.com", RecordType::A, Duration::from_secs(2)).await;
        assert_eq!(ttl, Some(300));
    }

    #[tokio::test]
    async fn test_fetch_ttl_none_without_matching_answer() {
        let server = spawn_udp_responder(|query| vec![build_response(query, &[])]).await;
        let ttl = fetch_ttl(server, "example.com", RecordType::A, Duration::from_secs(2)).await;
        assert_eq!(ttl, None);
    }

    #[tokio::test]
    async fn test_silent_server_times_out() {
        let server = spawn_udp_responder(|_| Vec::new()).await;
        let result = raw_query(server, "example.com", RecordType::A, true, Duration::from_millis(100)).await;
        assert!(matches!(result, Err(RawQueryError::Timeout(100))));
        assert_eq!(
            fetch_ttl(server, "example.com", RecordType::A, Duration::from_millis(100)).await,
            None
        );
    }

    #[tokio::test]
    async fn test_mismatched_id_is_ignored() {
        let server = spawn_udp_responder(|query| {
            let mut stray = build_response(query, &[(1, a([10, 0, 0, 1]))]);
            stray[0] ^= 0xFF;
            let real = build_response(query, &[(60, a([192, 0, 2, 1]))]);
            vec![stray, real]
        })
        .await;

        let message = raw_query(server, "example.com", RecordType::A, true, Duration::from_secs(2))
            .await
            .unwrap();
        assert_eq!(first_ttl(&message, RecordType::A), Some(60));
    }

    #[tokio::test]
    async fn test_garbage_datagram_is_ignored() {
        let server = spawn_udp_responder(|query| {
            vec![vec![0xFF; 5], build_response(query, &[(45, a([192, 0, 2, 2]))])]
        })
        .await;

        let ttl = fetch_ttl(server, "example.com", RecordType::A, Duration::from_secs(2)).await;
        assert_eq!(ttl, Some(45));
    }

    #[tokio::test]
    async fn test_truncated_udp_falls_back_to_tcp() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let udp = UdpSocket::bind(addr).await.unwrap();

        tokio::spawn(async move {
            let mut buf = vec![0u8; 4096];
            let (len, peer) = udp.recv_from(&mut buf).await.unwrap();
            let mut reply = response_to(&buf[..len]);
            reply.set_truncated(true);
            udp.send_to(&encode_reply(&reply), peer).await.unwrap();
        });
        tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let len = stream.read_u16().await.unwrap() as usize;
            let mut query = vec![0u8; len];
            stream.read_exact(&mut query).await.unwrap();
            let reply = build_response(&query, &[(900, txt("hello"))]);
            stream.write_u16(reply.len() as u16).await.unwrap();
            stream.write_all(&reply).await.unwrap();
        });

        let message = raw_query(addr, "example.com", RecordType::TXT, true, Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!message.truncated());
        assert_eq!(first_ttl(&message, RecordType::TXT), Some(900));
    }

    #[test]
    fn test_timeout_converts_to_probe_timeout() {
        let err: ProbeError = RawQueryError::Timeout(5000).into();
        assert_eq!(err.to_string(), "raw DNS query timed out after 5000ms");
    }
}
