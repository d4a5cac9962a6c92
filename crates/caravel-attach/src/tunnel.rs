//! HTTP-hijack tunnel to a remote one-off process.
//!
//! The attach endpoint speaks just enough HTTP to authorize the caller:
//! we dial the host ourselves, send a single `CONNECT` request over the
//! (optionally TLS-wrapped) socket, read exactly one response head, and
//! then own the connection as an opaque byte stream. The lifecycle is an
//! explicit state machine:
//!
//! ```text
//! Dialing → HttpNegotiating → Hijacked → Closed
//! ```
//!
//! Raw bytes may only be read or written in `Hijacked`; dropping the
//! stream closes the tunnel.

use std::pin::Pin;
use std::task::{Context, Poll};

use base64::Engine as _;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tracing::debug;
use url::Url;

use caravel_api::Credential;

use crate::error::AttachError;
use crate::tls::{TlsOptions, client_config};

/// Upper bound on the attach response head.
const MAX_RESPONSE_HEAD: usize = 16 * 1024;

/// Tunnel lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TunnelState {
    /// Establishing the TCP (and possibly TLS) connection.
    Dialing,
    /// Request sent, waiting for the server's verdict.
    HttpNegotiating,
    /// Socket ownership taken; raw bidirectional I/O allowed.
    Hijacked,
    /// Connection released.
    Closed,
}

/// The hijacked byte stream, plain or TLS-wrapped.
#[derive(Debug)]
pub enum TunnelStream {
    /// Cleartext TCP (http attach URLs).
    Plain(TcpStream),
    /// TLS over TCP (https attach URLs).
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for TunnelStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for TunnelStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<std::io::Result<usize>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_flush(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<std::io::Result<()>> {
        match self.get_mut() {
            Self::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            Self::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}

/// An accepted, hijacked tunnel.
#[derive(Debug)]
pub struct TunnelConnection {
    stream: TunnelStream,
    status: u16,
    state: TunnelState,
}

impl TunnelConnection {
    /// HTTP status the server accepted the attach with (200 or 202).
    #[must_use]
    pub const fn status(&self) -> u16 {
        self.status
    }

    /// Current lifecycle state.
    #[must_use]
    pub const fn state(&self) -> TunnelState {
        self.state
    }

    /// Take the raw byte stream, discarding the HTTP framing for good.
    #[must_use]
    pub fn into_stream(self) -> TunnelStream {
        self.stream
    }
}

/// Open a tunnel to `attach_url` and hijack the connection.
///
/// Authenticates with the credential in the password half of basic auth.
/// Accepts 200 and 202, including responses where the server closes the
/// connection right after writing its head.
///
/// # Errors
///
/// - [`AttachError::InvalidAttachUrl`] for non-http(s) schemes or
///   unparsable URLs (detected before any network traffic).
/// - [`AttachError::Dial`] / [`AttachError::Tls`] for transport
///   failures, with the firewall/proxy hint on the record-overflow
///   signature.
/// - [`AttachError::AttachRejected`] when the server answers with any
///   status other than 200/202.
pub async fn connect(
    attach_url: &str,
    credential: &Credential,
    tls: &TlsOptions,
) -> Result<TunnelConnection, AttachError> {
    let url = Url::parse(attach_url).map_err(|e| AttachError::InvalidAttachUrl {
        url: attach_url.to_string(),
        reason: e.to_string(),
    })?;
    let scheme = url.scheme();
    if scheme != "http" && scheme != "https" {
        return Err(AttachError::InvalidAttachUrl {
            url: attach_url.to_string(),
            reason: format!("unsupported scheme '{scheme}'"),
        });
    }
    let host = url
        .host_str()
        .ok_or_else(|| AttachError::InvalidAttachUrl {
            url: attach_url.to_string(),
            reason: "missing host".to_string(),
        })?
        .to_string();
    let port = url
        .port_or_known_default()
        .ok_or_else(|| AttachError::InvalidAttachUrl {
            url: attach_url.to_string(),
            reason: "missing port".to_string(),
        })?;
    let host_port = format!("{host}:{port}");

    debug!(state = ?TunnelState::Dialing, host = %host_port, "dialing attach host");
    let tcp = TcpStream::connect(&host_port)
        .await
        .map_err(|e| AttachError::Dial {
            host: host_port.clone(),
            source: e,
        })?;

    let mut stream = if scheme == "https" {
        let connector = TlsConnector::from(client_config(tls));
        let server_name = rustls::pki_types::ServerName::try_from(host.clone()).map_err(|e| {
            AttachError::InvalidAttachUrl {
                url: attach_url.to_string(),
                reason: format!("invalid tls server name: {e}"),
            }
        })?;
        let tls_stream = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| classify_tls_error(&host_port, e))?;
        TunnelStream::Tls(Box::new(tls_stream))
    } else {
        TunnelStream::Plain(tcp)
    };

    debug!(state = ?TunnelState::HttpNegotiating, "sending attach request");
    let request = build_connect_request(&url, credential);
    stream.write_all(request.as_bytes()).await?;
    stream.flush().await?;

    let status = read_response_head(&mut stream).await?;
    if status != 200 && status != 202 {
        return Err(AttachError::AttachRejected { status });
    }

    debug!(state = ?TunnelState::Hijacked, status, "attach accepted, socket hijacked");
    Ok(TunnelConnection {
        stream,
        status,
        state: TunnelState::Hijacked,
    })
}

/// Render the CONNECT request for the attach target.
fn build_connect_request(url: &Url, credential: &Credential) -> String {
    let mut target = url.path().to_string();
    if let Some(query) = url.query() {
        target.push('?');
        target.push_str(query);
    }
    let host = url.host_str().unwrap_or_default();
    let token = base64::engine::general_purpose::STANDARD
        .encode(format!(":{}", credential.token()));
    format!(
        "CONNECT {target} HTTP/1.1\r\n\
         Host: {host}\r\n\
         Authorization: Basic {token}\r\n\
         \r\n"
    )
}

/// Read exactly one HTTP response head and return its status code.
///
/// Reads byte by byte so that nothing past the terminating blank line is
/// consumed: the remote process output starts right after it. A server
/// that writes its whole response and closes the connection before the
/// terminating blank line still counts as having answered.
async fn read_response_head<S>(stream: &mut S) -> Result<u16, AttachError>
where
    S: AsyncRead + Unpin,
{
    let mut head: Vec<u8> = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    loop {
        let read = stream.read(&mut byte).await?;
        if read == 0 {
            if head.ends_with(b"\r\n") {
                break;
            }
            return Err(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before attach response",
            )
            .into());
        }
        head.push(byte[0]);
        if head.ends_with(b"\r\n\r\n") {
            break;
        }
        if head.len() > MAX_RESPONSE_HEAD {
            return Err(std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                "attach response head too large",
            )
            .into());
        }
    }
    parse_status_line(&head)
}

/// Extract the status code from a raw response head.
fn parse_status_line(head: &[u8]) -> Result<u16, AttachError> {
    let text = String::from_utf8_lossy(head);
    let line = text.lines().next().unwrap_or_default();
    let mut parts = line.split_whitespace();
    let version = parts.next().unwrap_or_default();
    let status = parts.next().and_then(|s| s.parse::<u16>().ok());
    match status {
        Some(code) if version.starts_with("HTTP/") => Ok(code),
        _ => Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("malformed attach response: {line}"),
        )
        .into()),
    }
}

/// Map a TLS handshake failure, recognizing the record-overflow
/// signature of a middlebox speaking something other than TLS.
fn classify_tls_error(host: &str, err: std::io::Error) -> AttachError {
    let reason = err.to_string();
    let lowered = reason.to_lowercase();
    if lowered.contains("record overflow")
        || lowered.contains("recordoverflow")
        || lowered.contains("message too large")
    {
        return AttachError::TlsInterference {
            host: host.to_string(),
            reason,
        };
    }
    AttachError::Tls {
        host: host.to_string(),
        source: err,
    }
}
