//! Raw TLS ClientHello probe.
//!
//! rustls cannot speak TLS 1.0/1.1 or offer legacy suites, so the version
//! and cipher matrices send a hand-built ClientHello restricted to exactly
//! one version and a chosen cipher list, read the first server flight up to
//! the ServerHello (or alert), and hang up. No key exchange is completed;
//! the ServerHello alone says what the server would negotiate.

use std::net::{IpAddr, SocketAddr};
use std::time::Duration;

use rand::RngCore;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

use super::catalog::TlsVersion;

const CONTENT_ALERT: u8 = 0x15;
const CONTENT_HANDSHAKE: u8 = 0x16;
const HANDSHAKE_CLIENT_HELLO: u8 = 0x01;
const HANDSHAKE_SERVER_HELLO: u8 = 0x02;

const EXT_SERVER_NAME: u16 = 0x0000;
const EXT_SUPPORTED_GROUPS: u16 = 0x000a;
const EXT_EC_POINT_FORMATS: u16 = 0x000b;
const EXT_SIGNATURE_ALGORITHMS: u16 = 0x000d;
const EXT_SUPPORTED_VERSIONS: u16 = 0x002b;
const EXT_PSK_MODES: u16 = 0x002d;
const EXT_KEY_SHARE: u16 = 0x0033;
const EXT_RENEGOTIATION_INFO: u16 = 0xff01;

const GROUP_X25519: u16 = 0x001d;
const SUPPORTED_GROUPS: [u16; 3] = [GROUP_X25519, 0x0017, 0x0018];
const SIGNATURE_SCHEMES: [u16; 11] = [
    0x0403, 0x0503, 0x0603, 0x0804, 0x0805, 0x0806, 0x0401, 0x0501, 0x0601, 0x0203, 0x0201,
];

/// Upper bound on buffered handshake bytes while looking for a ServerHello.
const MAX_FLIGHT_BYTES: usize = 64 * 1024;

/// Why a probe did not produce a ServerHello.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// TCP connect failed.
    #[error("connection failed: {0}")]
    Connect(String),

    /// A stage exceeded its budget.
    #[error("{stage} timed out after {after_ms}ms")]
    Timeout {
        /// `"connect"` or `"handshake"`.
        stage: &'static str,
        /// Budget in milliseconds.
        after_ms: u64,
    },

    /// The server refused with a TLS alert.
    #[error("server sent alert {name} ({0})", name = alert_label(.0))]
    Alert(u8),

    /// The server hung up before sending a ServerHello.
    #[error("connection closed before ServerHello")]
    Closed,

    /// The response was not a well-formed TLS flight.
    #[error("malformed server response: {0}")]
    Malformed(&'static str),

    /// Socket error after connecting.
    #[error("I/O error: {0}")]
    Io(String),
}

/// Names the alerts servers commonly send in response to a ClientHello.
pub fn alert_name(description: u8) -> &'static str {
    match description {
        0 => "close_notify",
        10 => "unexpected_message",
        40 => "handshake_failure",
        47 => "illegal_parameter",
        50 => "decode_error",
        70 => "protocol_version",
        71 => "insufficient_security",
        80 => "internal_error",
        86 => "inappropriate_fallback",
        109 => "missing_extension",
        112 => "unrecognized_name",
        _ => "unknown",
    }
}

fn alert_label(description: &u8) -> &'static str {
    alert_name(*description)
}

/// What the server picked in its ServerHello.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Negotiated {
    /// Selected protocol version code.
    pub version: u16,
    /// Selected cipher suite code.
    pub cipher: u16,
}

impl Negotiated {
    /// The selected version, if it is one the engine knows.
    pub fn tls_version(&self) -> Option<TlsVersion> {
        TlsVersion::from_wire(self.version)
    }
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_be_bytes());
}

fn put_extension(buf: &mut Vec<u8>, ext_type: u16, body: &[u8]) {
    put_u16(buf, ext_type);
    put_u16(buf, body.len() as u16);
    buf.extend_from_slice(body);
}

fn u16_list(values: &[u16]) -> Vec<u8> {
    let mut body = Vec::with_capacity(2 + values.len() * 2);
    put_u16(&mut body, (values.len() * 2) as u16);
    for v in values {
        put_u16(&mut body, *v);
    }
    body
}

/// Builds a ClientHello record offering exactly `version` and `ciphers`.
///
/// SNI is included when `server_name` is a hostname. TLS 1.3 hellos carry
/// `supported_versions`, an x25519 key share and PSK modes; earlier
/// versions put the version in the legacy field only.
pub fn build_client_hello(server_name: &str, version: TlsVersion, ciphers: &[u16]) -> Vec<u8> {
    let mut rng = rand::rng();
    let is_tls13 = version == TlsVersion::Tls13;

    let mut extensions = Vec::new();
    if server_name.parse::<IpAddr>().is_err() && !server_name.is_empty() {
        let name = server_name.as_bytes();
        let mut sni = Vec::with_capacity(name.len() + 5);
        put_u16(&mut sni, (name.len() + 3) as u16);
        sni.push(0x00); // host_name
        put_u16(&mut sni, name.len() as u16);
        sni.extend_from_slice(name);
        put_extension(&mut extensions, EXT_SERVER_NAME, &sni);
    }
    put_extension(&mut extensions, EXT_SUPPORTED_GROUPS, &u16_list(&SUPPORTED_GROUPS));
    put_extension(&mut extensions, EXT_EC_POINT_FORMATS, &[0x01, 0x00]);
    put_extension(&mut extensions, EXT_SIGNATURE_ALGORITHMS, &u16_list(&SIGNATURE_SCHEMES));
    put_extension(&mut extensions, EXT_RENEGOTIATION_INFO, &[0x00]);
    if is_tls13 {
        let mut versions = vec![0x02];
        put_u16(&mut versions, version.wire_code());
        put_extension(&mut extensions, EXT_SUPPORTED_VERSIONS, &versions);

        let mut public_key = [0u8; 32];
        rng.fill_bytes(&mut public_key);
        let mut share = Vec::with_capacity(38);
        put_u16(&mut share, 36);
        put_u16(&mut share, GROUP_X25519);
        put_u16(&mut share, 32);
        share.extend_from_slice(&public_key);
        put_extension(&mut extensions, EXT_KEY_SHARE, &share);

        put_extension(&mut extensions, EXT_PSK_MODES, &[0x01, 0x01]);
    }

    let mut body = Vec::with_capacity(128 + extensions.len());
    let legacy_version = if is_tls13 { 0x0303 } else { version.wire_code() };
    put_u16(&mut body, legacy_version);
    let mut random = [0u8; 32];
    rng.fill_bytes(&mut random);
    body.extend_from_slice(&random);
    let mut session_id = [0u8; 32];
    rng.fill_bytes(&mut session_id);
    body.push(session_id.len() as u8);
    body.extend_from_slice(&session_id);
    body.extend_from_slice(&u16_list(ciphers));
    body.extend_from_slice(&[0x01, 0x00]); // null compression only
    put_u16(&mut body, extensions.len() as u16);
    body.extend_from_slice(&extensions);

    let mut handshake = Vec::with_capacity(body.len() + 4);
    handshake.push(HANDSHAKE_CLIENT_HELLO);
    handshake.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    handshake.extend_from_slice(&body);

    let mut record = Vec::with_capacity(handshake.len() + 5);
    record.push(CONTENT_HANDSHAKE);
    // Record-layer version stays at TLS 1.0 for compatibility
    put_u16(&mut record, 0x0301);
    put_u16(&mut record, handshake.len() as u16);
    record.extend_from_slice(&handshake);
    record
}

/// Small cursor over a byte slice; every read is bounds-checked.
struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(buf: &'a [u8]) -> Self {
        Reader { buf, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], HandshakeError> {
        let end = self
            .pos
            .checked_add(n)
            .filter(|end| *end <= self.buf.len())
            .ok_or(HandshakeError::Malformed("ServerHello truncated"))?;
        let slice = &self.buf[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, HandshakeError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, HandshakeError> {
        let b = self.take(2)?;
        Ok(u16::from_be_bytes([b[0], b[1]]))
    }

    fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }
}

/// Parses a ServerHello handshake body (after the 4-byte header).
///
/// The `supported_versions` extension overrides the legacy version field.
pub fn parse_server_hello(body: &[u8]) -> Result<Negotiated, HandshakeError> {
    let mut r = Reader::new(body);
    let legacy_version = r.u16()?;
    r.take(32)?; // random
    let session_id_len = r.u8()? as usize;
    r.take(session_id_len)?;
    let cipher = r.u16()?;
    r.u8()?; // compression

    let mut version = legacy_version;
    if !r.is_empty() {
        let ext_len = r.u16()? as usize;
        let mut exts = Reader::new(r.take(ext_len)?);
        while !exts.is_empty() {
            let ext_type = exts.u16()?;
            let len = exts.u16()? as usize;
            let data = exts.take(len)?;
            if ext_type == EXT_SUPPORTED_VERSIONS {
                if data.len() != 2 {
                    return Err(HandshakeError::Malformed("bad supported_versions"));
                }
                version = u16::from_be_bytes([data[0], data[1]]);
            }
        }
    }
    Ok(Negotiated { version, cipher })
}

/// Reads records until the ServerHello is complete or the server alerts.
pub async fn read_server_hello<R>(reader: &mut R) -> Result<Negotiated, HandshakeError>
where
    R: AsyncRead + Unpin,
{
    let mut handshake: Vec<u8> = Vec::new();
    loop {
        let mut header = [0u8; 5];
        match reader.read_exact(&mut header).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(HandshakeError::Closed)
            }
            Err(e) => return Err(HandshakeError::Io(e.to_string())),
        }
        let length = u16::from_be_bytes([header[3], header[4]]) as usize;
        let mut fragment = vec![0u8; length];
        match reader.read_exact(&mut fragment).await {
            Ok(_) => {}
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => {
                return Err(HandshakeError::Closed)
            }
            Err(e) => return Err(HandshakeError::Io(e.to_string())),
        }

        match header[0] {
            CONTENT_ALERT => {
                let description = *fragment
                    .get(1)
                    .ok_or(HandshakeError::Malformed("short alert"))?;
                return Err(HandshakeError::Alert(description));
            }
            CONTENT_HANDSHAKE => handshake.extend_from_slice(&fragment),
            _ => return Err(HandshakeError::Malformed("unexpected record type")),
        }

        if handshake.len() > MAX_FLIGHT_BYTES {
            return Err(HandshakeError::Malformed("handshake flight too large"));
        }
        if handshake.len() < 4 {
            continue;
        }
        if handshake[0] != HANDSHAKE_SERVER_HELLO {
            return Err(HandshakeError::Malformed("first handshake message is not ServerHello"));
        }
        let msg_len = u32::from_be_bytes([0, handshake[1], handshake[2], handshake[3]]) as usize;
        if handshake.len() >= 4 + msg_len {
            return parse_server_hello(&handshake[4..4 + msg_len]);
        }
    }
}

/// Offers `version` with `ciphers` to `addr` and reports what was selected.
///
/// Each call uses its own TCP connection, which is dropped on every exit
/// path.
pub async fn probe_handshake(
    addr: SocketAddr,
    server_name: &str,
    version: TlsVersion,
    ciphers: &[u16],
    connect_timeout: Duration,
    handshake_timeout: Duration,
) -> Result<Negotiated, HandshakeError> {
    let mut stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => return Err(HandshakeError::Connect(e.to_string())),
        Err(_) => {
            return Err(HandshakeError::Timeout {
                stage: "connect",
                after_ms: connect_timeout.as_millis() as u64,
            })
        }
    };

    let hello = build_client_hello(server_name, version, ciphers);
    let exchange = async {
        stream
            .write_all(&hello)
            .await
            .map_err(|e| HandshakeError::Io(e.to_string()))?;
        read_server_hello(&mut stream).await
    };
    let result = match tokio::time::timeout(handshake_timeout, exchange).await {
        Ok(result) => result,
        Err(_) => Err(HandshakeError::Timeout {
            stage: "handshake",
            after_ms: handshake_timeout.as_millis() as u64,
        }),
    };
    log::trace!("{version} probe of {server_name} ({addr}): {result:?}");
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tls::test_helpers::{alert_record, parse_client_hello, server_hello_record};

    #[test]
    fn test_tls12_hello_has_legacy_version_and_sni() {
        let hello = build_client_hello("mail.example.com", TlsVersion::Tls12, &[0xC02F, 0x009C]);
        let view = parse_client_hello(&hello).unwrap();
        assert_eq!(view.legacy_version, 0x0303);
        assert_eq!(view.ciphers, vec![0xC02F, 0x009C]);
        assert!(view.supported_versions.is_empty());
        assert_eq!(view.server_name.as_deref(), Some("mail.example.com"));
        assert!(!view.has_key_share);
    }

    #[test]
    fn test_tls13_hello_uses_supported_versions() {
        let hello = build_client_hello("example.com", TlsVersion::Tls13, &[0x1301]);
        let view = parse_client_hello(&hello).unwrap();
        assert_eq!(view.legacy_version, 0x0303);
        assert_eq!(view.supported_versions, vec![0x0304]);
        assert!(view.has_key_share);
    }

    #[test]
    fn test_ip_target_omits_sni() {
        let hello = build_client_hello("192.0.2.10", TlsVersion::Tls10, &[0x002F]);
        let view = parse_client_hello(&hello).unwrap();
        assert_eq!(view.legacy_version, 0x0301);
        assert_eq!(view.server_name, None);
    }

    #[test]
    fn test_parse_server_hello_legacy_version() {
        let record = server_hello_record(0x0302, 0x002F);
        let negotiated = parse_server_hello(&record[9..]).unwrap();
        assert_eq!(negotiated.version, 0x0302);
        assert_eq!(negotiated.cipher, 0x002F);
        assert_eq!(negotiated.tls_version(), Some(TlsVersion::Tls11));
    }

    #[test]
    fn test_parse_server_hello_supported_versions_wins() {
        let record = server_hello_record(0x0304, 0x1302);
        let negotiated = parse_server_hello(&record[9..]).unwrap();
        assert_eq!(negotiated.version, 0x0304);
        assert_eq!(negotiated.cipher, 0x1302);
    }

    #[test]
    fn test_parse_truncated_server_hello() {
        assert_eq!(
            parse_server_hello(&[0x03, 0x03, 0x00]),
            Err(HandshakeError::Malformed("ServerHello truncated"))
        );
    }

    #[tokio::test]
    async fn test_read_alert() {
        let bytes = alert_record(70);
        let mut reader = &bytes[..];
        let err = read_server_hello(&mut reader).await.unwrap_err();
        assert_eq!(err, HandshakeError::Alert(70));
        assert_eq!(err.to_string(), "server sent alert protocol_version (70)");
    }

    #[tokio::test]
    async fn test_read_server_hello_split_across_records() {
        let record = server_hello_record(0x0303, 0xC02F);
        let handshake = &record[5..];
        let (first, second) = handshake.split_at(10);
        let mut bytes = Vec::new();
        for part in [first, second] {
            bytes.extend_from_slice(&[CONTENT_HANDSHAKE, 0x03, 0x03]);
            bytes.extend_from_slice(&(part.len() as u16).to_be_bytes());
            bytes.extend_from_slice(part);
        }
        let mut reader = &bytes[..];
        let negotiated = read_server_hello(&mut reader).await.unwrap();
        assert_eq!(negotiated, Negotiated { version: 0x0303, cipher: 0xC02F });
    }

    #[tokio::test]
    async fn test_read_closed_connection() {
        let mut reader: &[u8] = &[];
        assert_eq!(read_server_hello(&mut reader).await, Err(HandshakeError::Closed));
    }

    #[tokio::test]
    async fn test_read_rejects_application_data() {
        let bytes = [0x17, 0x03, 0x03, 0x00, 0x01, 0x00];
        let mut reader = &bytes[..];
        assert!(matches!(
            read_server_hello(&mut reader).await,
            Err(HandshakeError::Malformed(_))
        ));
    }
}
