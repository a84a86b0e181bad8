//! Fake SMTP endpoint for unit tests.

use std::net::SocketAddr;

use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::TcpListener;

/// Serves a scripted greeting and EHLO reply to every connection on localhost.
pub(crate) async fn spawn_smtp_server(greeting: &'static str, ehlo_reply: &'static str) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.expect("bind smtp");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            tokio::spawn(async move {
                let mut reader = BufReader::new(stream);
                if reader.get_mut().write_all(greeting.as_bytes()).await.is_err() {
                    return;
                }
                let mut line = String::new();
                while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
                    let reply: &[u8] = if line.starts_with("EHLO") {
                        ehlo_reply.as_bytes()
                    } else if line.starts_with("QUIT") {
                        b"221 bye\r\n"
                    } else {
                        b"502 not implemented\r\n"
                    };
                    if reader.get_mut().write_all(reply).await.is_err() {
                        return;
                    }
                    line.clear();
                }
            });
        }
    });
    addr
}
