//! Client side of the HTTP Upgrade handshake (RFC 6455 Section 4.1).

use std::collections::HashMap;

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use sha1::{Digest, Sha1};

use crate::endpoint::Endpoint;
use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wslink::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    BASE64.encode(hasher.finalize())
}

/// Base64 of 16 random bytes, for `Sec-WebSocket-Key`.
pub fn generate_key() -> Result<String> {
    let mut nonce = [0u8; 16];
    getrandom::getrandom(&mut nonce)
        .map_err(|e| Error::Io(format!("entropy source unavailable: {e}")))?;
    Ok(BASE64.encode(nonce))
}

/// Offset just past the blank line ending an HTTP head, if present.
///
/// Bare `\n` line endings are tolerated.
#[must_use]
pub fn find_head_end(buf: &[u8]) -> Option<usize> {
    let crlf = buf.windows(4).position(|w| w == b"\r\n\r\n").map(|i| i + 4);
    let lf = buf.windows(2).position(|w| w == b"\n\n").map(|i| i + 2);
    match (crlf, lf) {
        (Some(a), Some(b)) => Some(a.min(b)),
        (a, b) => a.or(b),
    }
}

fn validate_header_value(header_name: &str, value: &str) -> Result<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(Error::HandshakeFailed(format!(
            "{header_name} header contains CR or LF characters"
        )));
    }
    Ok(())
}

/// Upgrade request sent to the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// Request target: path plus optional `?query`.
    pub target: String,
    /// The Host header value (`host:port`).
    pub host: String,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
    /// The Origin header value.
    pub origin: String,
}

impl HandshakeRequest {
    /// Build a request for `endpoint` with a fresh key.
    ///
    /// `origin` defaults to `http://<host>`.
    ///
    /// # Errors
    ///
    /// [`Error::HandshakeFailed`] if `origin` contains CR/LF, [`Error::Io`] if
    /// no entropy is available for the key.
    pub fn new(endpoint: &Endpoint, origin: Option<&str>) -> Result<Self> {
        let origin = origin.map_or_else(|| endpoint.default_origin(), str::to_string);
        validate_header_value("Origin", &origin)?;
        Ok(Self {
            target: endpoint.request_target(),
            host: endpoint.host_header(),
            key: generate_key()?,
            origin,
        })
    }

    /// Serialize the request head.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(format!("GET {} HTTP/1.1\r\n", self.target).as_bytes());
        buf.extend_from_slice(format!("Host: {}\r\n", self.host).as_bytes());
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Key: {}\r\n", self.key).as_bytes());
        buf.extend_from_slice(b"Sec-WebSocket-Version: 13\r\n");
        buf.extend_from_slice(format!("Origin: {}\r\n", self.origin).as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    /// The value a compliant server must echo in `Sec-WebSocket-Accept`.
    #[must_use]
    pub fn expected_accept(&self) -> String {
        compute_accept_key(&self.key)
    }
}

/// Parsed upgrade response head.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// Numeric status code.
    pub status: u16,
    /// Reason phrase; may be empty.
    pub reason: String,
    /// Headers keyed by lowercase name.
    pub headers: HashMap<String, String>,
}

impl HandshakeResponse {
    /// Parse a response head (status line through blank line).
    ///
    /// # Errors
    ///
    /// [`Error::HandshakeFailed`] if:
    /// - The data is not valid UTF-8.
    /// - The status line is missing or not `HTTP/x.y <code> [reason]`.
    /// - A header line has no `:` separator.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::HandshakeFailed("response is not valid UTF-8".into()))?;

        let mut lines = text.lines();
        let status_line = lines
            .next()
            .filter(|l| !l.trim().is_empty())
            .ok_or_else(|| Error::HandshakeFailed("empty response".into()))?;

        let mut parts = status_line.trim_end().splitn(3, ' ');
        let version = parts.next().unwrap_or_default();
        if !version.starts_with("HTTP/") {
            return Err(Error::HandshakeFailed(format!(
                "malformed status line: {status_line}"
            )));
        }
        let status: u16 = parts
            .next()
            .and_then(|code| code.parse().ok())
            .ok_or_else(|| {
                Error::HandshakeFailed(format!("malformed status line: {status_line}"))
            })?;
        let reason = parts.next().unwrap_or_default().to_string();

        let mut headers = HashMap::new();
        for line in lines {
            if line.trim().is_empty() {
                break;
            }
            let (name, value) = line
                .split_once(':')
                .ok_or_else(|| Error::HandshakeFailed(format!("malformed header: {line}")))?;
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }

        Ok(Self {
            status,
            reason,
            headers,
        })
    }

    /// Look up a header by case-insensitive name.
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_lowercase()).map(String::as_str)
    }

    /// Confirm the server switched protocols for `request`.
    ///
    /// With `verify_accept` off only the `101` status is checked.
    ///
    /// # Errors
    ///
    /// [`Error::HandshakeFailed`] naming the first check that failed.
    pub fn validate(&self, request: &HandshakeRequest, verify_accept: bool) -> Result<()> {
        if self.status != 101 {
            return Err(Error::HandshakeFailed(format!(
                "expected status 101, got {} {}",
                self.status, self.reason
            )));
        }
        if !verify_accept {
            return Ok(());
        }

        let upgrade = self
            .header("upgrade")
            .ok_or_else(|| Error::HandshakeFailed("missing Upgrade header".into()))?;
        if !upgrade.eq_ignore_ascii_case("websocket") {
            return Err(Error::HandshakeFailed(format!(
                "invalid Upgrade header: {upgrade}"
            )));
        }

        let connection = self
            .header("connection")
            .ok_or_else(|| Error::HandshakeFailed("missing Connection header".into()))?;
        if !connection.to_lowercase().contains("upgrade") {
            return Err(Error::HandshakeFailed(format!(
                "invalid Connection header: {connection}"
            )));
        }

        let accept = self
            .header("sec-websocket-accept")
            .ok_or_else(|| Error::HandshakeFailed("missing Sec-WebSocket-Accept header".into()))?;
        if accept != request.expected_accept() {
            return Err(Error::HandshakeFailed(format!(
                "Sec-WebSocket-Accept mismatch: {accept}"
            )));
        }

        Ok(())
    }
}
