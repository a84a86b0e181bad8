//! SMTP conversation driver: greeting, EHLO, QUIT.
//!
//! The driver is generic over the stream so tests can run it against an
//! in-memory duplex pipe. Timeouts are applied by the caller.

use std::net::SocketAddr;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::net::TcpStream;

use super::parser::{EhloParser, ParserState, SmtpHandshake};
use crate::config::MAX_SMTP_LINE_LENGTH;
use crate::error_handling::SmtpError;

fn stage_name(state: ParserState) -> &'static str {
    match state {
        ParserState::AwaitingGreeting => "awaiting greeting",
        ParserState::AwaitingCapabilities => "awaiting EHLO reply",
        ParserState::Complete | ParserState::Failed => "finishing",
    }
}

/// Reads one CRLF-terminated line, refusing lines longer than the limit.
async fn read_reply_line<R>(reader: &mut BufReader<R>, state: ParserState) -> Result<String, SmtpError>
where
    R: AsyncRead + Unpin,
{
    let mut line = String::new();
    let read = reader
        .take(MAX_SMTP_LINE_LENGTH as u64 + 1)
        .read_line(&mut line)
        .await?;
    if read == 0 {
        return Err(SmtpError::ConnectionClosed(stage_name(state)));
    }
    if !line.ends_with('\n') {
        if line.len() > MAX_SMTP_LINE_LENGTH {
            return Err(SmtpError::ReplyTooLarge("line length"));
        }
        // Final line without a terminator before EOF
        return Err(SmtpError::ConnectionClosed(stage_name(state)));
    }
    Ok(line)
}

/// Runs greeting → EHLO → QUIT over `stream` and returns the parsed reply.
///
/// The stream is shut down on every exit path that reaches the end of the
/// function; early returns drop it, which closes it.
///
/// # Errors
///
/// Returns `SmtpError` for I/O failures, an early close, or replies the
/// parser rejects.
pub async fn run_ehlo<S>(stream: S, ehlo_name: &str) -> Result<SmtpHandshake, SmtpError>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let mut reader = BufReader::new(stream);
    let mut parser = EhloParser::new();

    while parser.state() == ParserState::AwaitingGreeting {
        let line = read_reply_line(&mut reader, parser.state()).await?;
        log::trace!("S: {}", line.trim_end());
        parser.feed_line(&line)?;
    }

    let ehlo = format!("EHLO {ehlo_name}\r\n");
    log::trace!("C: {}", ehlo.trim_end());
    reader.get_mut().write_all(ehlo.as_bytes()).await?;
    reader.get_mut().flush().await?;

    while parser.state() == ParserState::AwaitingCapabilities {
        let line = read_reply_line(&mut reader, parser.state()).await?;
        log::trace!("S: {}", line.trim_end());
        parser.feed_line(&line)?;
    }

    let handshake = parser.finish().ok_or(SmtpError::ConnectionClosed("finishing"))?;

    // Politely end the session; the result no longer depends on the peer
    let stream = reader.get_mut();
    if stream.write_all(b"QUIT\r\n").await.is_ok() {
        let _ = stream.flush().await;
        let mut bye = String::new();
        let _ = tokio::time::timeout(Duration::from_millis(500), reader.read_line(&mut bye)).await;
    }
    let _ = reader.get_mut().shutdown().await;

    Ok(handshake)
}

/// Connects to `addr` and runs the EHLO conversation.
///
/// # Errors
///
/// Returns `SmtpError::ConnectionFailed` when the TCP connect fails or
/// exceeds `connect_timeout`, otherwise whatever [`run_ehlo`] returns.
pub async fn probe_smtp(
    addr: SocketAddr,
    ehlo_name: &str,
    connect_timeout: Duration,
) -> Result<SmtpHandshake, SmtpError> {
    let stream = match tokio::time::timeout(connect_timeout, TcpStream::connect(addr)).await {
        Ok(Ok(stream)) => stream,
        Ok(Err(e)) => {
            log::debug!("SMTP connect to {addr} failed: {e}");
            return Err(SmtpError::ConnectionFailed(e.to_string()));
        }
        Err(_) => {
            return Err(SmtpError::ConnectionFailed(format!(
                "connect timed out after {}ms",
                connect_timeout.as_millis()
            )))
        }
    };
    run_ehlo(stream, ehlo_name).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::duplex;

    /// Plays the server side of a scripted conversation.
    async fn serve(
        mut server: tokio::io::DuplexStream,
        greeting: &'static str,
        ehlo_reply: &'static str,
    ) -> Vec<String> {
        let mut received = Vec::new();
        server.write_all(greeting.as_bytes()).await.unwrap();
        let mut reader = BufReader::new(server);
        let mut line = String::new();
        while reader.read_line(&mut line).await.unwrap_or(0) > 0 {
            received.push(line.trim_end().to_string());
            if line.starts_with("EHLO") {
                reader.get_mut().write_all(ehlo_reply.as_bytes()).await.unwrap();
            } else if line.starts_with("QUIT") {
                reader.get_mut().write_all(b"221 bye\r\n").await.unwrap();
            }
            line.clear();
        }
        received
    }

    #[tokio::test]
    async fn test_full_conversation() {
        let (client, server) = duplex(4096);
        let server_task = tokio::spawn(serve(
            server,
            "220 mx.example.com ESMTP\r\n",
            "250-mx.example.com\r\n250-STARTTLS\r\n250-AUTH PLAIN LOGIN\r\n250 OK\r\n",
        ));

        let handshake = run_ehlo(client, "probe.example").await.unwrap();
        assert!(handshake.tls_supported);
        assert_eq!(handshake.auth_methods, vec!["PLAIN", "LOGIN"]);
        assert_eq!(handshake.banner, "mx.example.com ESMTP");

        let received = server_task.await.unwrap();
        assert_eq!(received, vec!["EHLO probe.example", "QUIT"]);
    }

    #[tokio::test]
    async fn test_rejecting_greeting() {
        let (client, server) = duplex(1024);
        tokio::spawn(serve(server, "554 go away\r\n", ""));
        let err = run_ehlo(client, "probe.example").await.unwrap_err();
        assert_eq!(err, SmtpError::UnexpectedGreeting("554 go away".to_string()));
    }

    #[tokio::test]
    async fn test_server_closes_mid_reply() {
        let (client, mut server) = duplex(1024);
        tokio::spawn(async move {
            server.write_all(b"220 ready\r\n").await.unwrap();
            let mut buf = [0u8; 64];
            let _ = server.read(&mut buf).await;
            server.write_all(b"250-mx.example.com\r\n").await.unwrap();
            // dropped before the final line
        });
        let err = run_ehlo(client, "probe.example").await.unwrap_err();
        assert_eq!(err, SmtpError::ConnectionClosed("awaiting EHLO reply"));
    }

    #[tokio::test]
    async fn test_overlong_line_rejected() {
        let (client, mut server) = duplex(16 * 1024);
        tokio::spawn(async move {
            let long = format!("220 {}\r\n", "x".repeat(MAX_SMTP_LINE_LENGTH + 10));
            let _ = server.write_all(long.as_bytes()).await;
            tokio::time::sleep(Duration::from_secs(1)).await;
        });
        let err = run_ehlo(client, "probe.example").await.unwrap_err();
        assert_eq!(err, SmtpError::ReplyTooLarge("line length"));
    }

    #[tokio::test]
    async fn test_probe_refused_port() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);
        let err = probe_smtp(addr, "probe.example", Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, SmtpError::ConnectionFailed(_)));
    }
}
