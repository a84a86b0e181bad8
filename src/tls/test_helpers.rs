//! Fake TLS endpoints for matrix tests.
//!
//! The endpoints only read the ClientHello and answer with a ServerHello or
//! an alert, which is all the raw handshake probe looks at.

use std::collections::HashSet;
use std::net::SocketAddr;
use std::sync::Arc;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;

/// The parts of a ClientHello the fakes decide on.
#[derive(Debug, Clone, Default)]
pub struct ClientHelloView {
    pub legacy_version: u16,
    pub ciphers: Vec<u16>,
    pub supported_versions: Vec<u16>,
    pub server_name: Option<String>,
    pub has_key_share: bool,
}

impl ClientHelloView {
    /// Highest version the client offered.
    pub fn max_version(&self) -> u16 {
        self.supported_versions
            .iter()
            .copied()
            .max()
            .unwrap_or(self.legacy_version)
    }
}

fn be16(b: &[u8], at: usize) -> Option<u16> {
    Some(u16::from_be_bytes([*b.get(at)?, *b.get(at + 1)?]))
}

/// Decodes a ClientHello record produced by the probe.
pub fn parse_client_hello(record: &[u8]) -> Option<ClientHelloView> {
    if *record.first()? != 0x16 || *record.get(5)? != 0x01 {
        return None;
    }
    let body = record.get(9..)?;
    let mut view = ClientHelloView {
        legacy_version: be16(body, 0)?,
        ..Default::default()
    };
    let mut pos = 2 + 32;
    let sid_len = *body.get(pos)? as usize;
    pos += 1 + sid_len;
    let cipher_len = be16(body, pos)? as usize;
    pos += 2;
    for i in (0..cipher_len).step_by(2) {
        view.ciphers.push(be16(body, pos + i)?);
    }
    pos += cipher_len;
    let comp_len = *body.get(pos)? as usize;
    pos += 1 + comp_len;
    let ext_total = be16(body, pos)? as usize;
    pos += 2;
    let end = pos + ext_total;
    while pos < end {
        let ext_type = be16(body, pos)?;
        let len = be16(body, pos + 2)? as usize;
        let data = body.get(pos + 4..pos + 4 + len)?;
        match ext_type {
            0x0000 => {
                let name_len = be16(data, 3)? as usize;
                view.server_name = Some(String::from_utf8(data.get(5..5 + name_len)?.to_vec()).ok()?);
            }
            0x002b => {
                for chunk in data.get(1..)?.chunks(2) {
                    view.supported_versions.push(be16(chunk, 0)?);
                }
            }
            0x0033 => view.has_key_share = true,
            _ => {}
        }
        pos += 4 + len;
    }
    Some(view)
}

/// A ServerHello record selecting `version` and `cipher`.
///
/// TLS 1.3 selections go in `supported_versions` with a legacy 1.2 field.
pub fn server_hello_record(version: u16, cipher: u16) -> Vec<u8> {
    let mut body = Vec::new();
    let legacy = if version == 0x0304 { 0x0303 } else { version };
    body.extend_from_slice(&legacy.to_be_bytes());
    body.extend_from_slice(&[0x42; 32]);
    body.push(0);
    body.extend_from_slice(&cipher.to_be_bytes());
    body.push(0);
    if version == 0x0304 {
        body.extend_from_slice(&6u16.to_be_bytes());
        body.extend_from_slice(&0x002bu16.to_be_bytes());
        body.extend_from_slice(&2u16.to_be_bytes());
        body.extend_from_slice(&version.to_be_bytes());
    }
    let mut handshake = vec![0x02];
    handshake.extend_from_slice(&(body.len() as u32).to_be_bytes()[1..]);
    handshake.extend_from_slice(&body);
    let mut record = vec![0x16, 0x03, 0x03];
    record.extend_from_slice(&(handshake.len() as u16).to_be_bytes());
    record.extend_from_slice(&handshake);
    record
}

/// A fatal alert record.
pub fn alert_record(description: u8) -> Vec<u8> {
    vec![0x15, 0x03, 0x03, 0x00, 0x02, 0x02, description]
}

/// Serves connections, answering each ClientHello with `respond(view)`.
///
/// An empty reply leaves the client waiting, like a stalled server.
pub async fn spawn_fake_tls_endpoint<F>(respond: F) -> SocketAddr
where
    F: Fn(&ClientHelloView) -> Vec<u8> + Send + Sync + 'static,
{
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let respond = Arc::new(respond);
    tokio::spawn(async move {
        while let Ok((mut socket, _)) = listener.accept().await {
            let respond = Arc::clone(&respond);
            tokio::spawn(async move {
                let mut header = [0u8; 5];
                if socket.read_exact(&mut header).await.is_err() {
                    return;
                }
                let len = u16::from_be_bytes([header[3], header[4]]) as usize;
                let mut body = vec![0u8; len];
                if socket.read_exact(&mut body).await.is_err() {
                    return;
                }
                let mut record = header.to_vec();
                record.extend_from_slice(&body);
                let reply = match parse_client_hello(&record) {
                    Some(view) => respond(&view),
                    None => alert_record(50),
                };
                let _ = socket.write_all(&reply).await;
                // Hold the connection until the client hangs up
                let mut sink = [0u8; 256];
                while let Ok(n) = socket.read(&mut sink).await {
                    if n == 0 {
                        break;
                    }
                }
            });
        }
    });
    addr
}

/// A server that only speaks `version` and only with `ciphers`.
pub async fn spawn_single_version_endpoint(version: u16, ciphers: &[u16]) -> SocketAddr {
    let accepted: HashSet<u16> = ciphers.iter().copied().collect();
    spawn_fake_tls_endpoint(move |hello| {
        if hello.max_version() != version {
            return alert_record(70);
        }
        match hello.ciphers.iter().find(|c| accepted.contains(c)) {
            Some(cipher) => server_hello_record(version, *cipher),
            None => alert_record(40),
        }
    })
    .await
}

/// A server that only speaks TLS 1.2 and only with `ciphers`.
pub async fn spawn_tls12_only_endpoint(ciphers: &[u16]) -> SocketAddr {
    spawn_single_version_endpoint(0x0303, ciphers).await
}

/// A real TLS server with a fresh self-signed certificate for `names`.
///
/// Completes one handshake per connection, then waits for the client to
/// close. Returns the address and the certificate it presents.
pub async fn spawn_rustls_endpoint(
    names: &[&str],
) -> (SocketAddr, rustls::pki_types::CertificateDer<'static>) {
    use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};

    let names: Vec<String> = names.iter().map(|n| n.to_string()).collect();
    let certified = rcgen::generate_simple_self_signed(names).unwrap();
    let cert_der = certified.cert.der().clone();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(certified.key_pair.serialize_der()));

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_single_cert(vec![cert_der.clone()], key)
    .unwrap();
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                if let Ok(mut stream) = acceptor.accept(socket).await {
                    let mut sink = [0u8; 256];
                    while let Ok(n) = stream.read(&mut sink).await {
                        if n == 0 {
                            break;
                        }
                    }
                }
            });
        }
    });
    (addr, cert_der)
}

/// Resolves every hello to a real key with an empty certificate chain.
#[derive(Debug)]
struct EmptyChain(Arc<rustls::sign::CertifiedKey>);

impl rustls::server::ResolvesServerCert for EmptyChain {
    fn resolve(
        &self,
        _hello: rustls::server::ClientHello<'_>,
    ) -> Option<Arc<rustls::sign::CertifiedKey>> {
        Some(Arc::clone(&self.0))
    }
}

/// A TLS server that sends an empty Certificate message.
pub async fn spawn_certless_endpoint() -> SocketAddr {
    use rustls::pki_types::{PrivateKeyDer, PrivatePkcs8KeyDer};

    let key_pair = rcgen::KeyPair::generate().unwrap();
    let key = PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key_pair.serialize_der()));
    let signing_key = rustls::crypto::ring::sign::any_supported_type(&key).unwrap();
    let resolver = EmptyChain(Arc::new(rustls::sign::CertifiedKey::new(Vec::new(), signing_key)));

    let config = rustls::ServerConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()
    .unwrap()
    .with_no_client_auth()
    .with_cert_resolver(Arc::new(resolver));
    let acceptor = tokio_rustls::TlsAcceptor::from(Arc::new(config));

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        while let Ok((socket, _)) = listener.accept().await {
            let acceptor = acceptor.clone();
            tokio::spawn(async move {
                let _ = acceptor.accept(socket).await;
            });
        }
    });
    addr
}
