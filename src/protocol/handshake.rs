//! WebSocket opening handshake (RFC 6455 section 4.2).
//!
//! Negotiation is a pure computation over the request bytes. Writing the
//! response and promoting the session is the caller's job.

use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use bytes::Bytes;
use sha1::{Digest, Sha1};
use std::collections::HashMap;

use crate::error::{Error, Result};

/// The WebSocket GUID used in the Sec-WebSocket-Accept calculation (RFC 6455).
pub const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// Parse HTTP headers into a map keyed by lowercase header name.
///
/// Stops at the first empty line. Lines without a colon are ignored.
fn parse_headers<'a, I>(lines: I) -> HashMap<String, String>
where
    I: Iterator<Item = &'a str>,
{
    let mut headers = HashMap::new();

    for line in lines {
        if line.is_empty() {
            break;
        }
        if let Some((name, value)) = line.split_once(':') {
            headers.insert(name.trim().to_lowercase(), value.trim().to_string());
        }
    }

    headers
}

/// Computes the Sec-WebSocket-Accept value from the client's Sec-WebSocket-Key.
///
/// The accept key is calculated as: Base64(SHA-1(key + GUID))
///
/// # Example
///
/// ```
/// use wsrelay::protocol::handshake::compute_accept_key;
///
/// let key = "dGhlIHNhbXBsZSBub25jZQ==";
/// let accept = compute_accept_key(key);
/// assert_eq!(accept, "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
/// ```
pub fn compute_accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(WS_GUID.as_bytes());
    let hash = hasher.finalize();
    BASE64.encode(hash)
}

/// Negotiate a handshake: the Switching-Protocols response, or `None` when
/// the request carries no usable `Sec-WebSocket-Key`.
///
/// ```
/// use wsrelay::protocol::handshake::negotiate;
///
/// assert!(negotiate(b"GET / HTTP/1.1\r\nHost: x\r\n\r\n").is_none());
/// ```
#[must_use]
pub fn negotiate(request: &[u8]) -> Option<HandshakeResponse> {
    HandshakeRequest::parse(request)
        .ok()
        .map(|req| HandshakeResponse::from_request(&req))
}

/// Parsed opening handshake request from a client.
///
/// Only `Sec-WebSocket-Key` is required. Upgrade, Connection and version
/// headers are not checked.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeRequest {
    /// The request path, when a request line is present.
    pub path: Option<String>,
    /// The Host header value (optional).
    pub host: Option<String>,
    /// The Sec-WebSocket-Key header value.
    pub key: String,
}

impl HandshakeRequest {
    /// Parse a handshake request from raw HTTP data.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidHandshake`] if:
    /// - The data is not valid UTF-8.
    /// - The data is empty.
    /// - The `Sec-WebSocket-Key` header is missing or empty.
    pub fn parse(data: &[u8]) -> Result<Self> {
        let text = std::str::from_utf8(data)
            .map_err(|_| Error::InvalidHandshake("Invalid UTF-8".into()))?;

        let mut lines = text.lines();

        let request_line = lines
            .next()
            .ok_or_else(|| Error::InvalidHandshake("Empty request".into()))?;

        // "GET /path HTTP/1.1"; a request line that does not look like one
        // is treated as a header line.
        let parts: Vec<&str> = request_line.split_whitespace().collect();
        let (path, headers) = if parts.len() == 3 && parts[2].starts_with("HTTP/") {
            (Some(parts[1].to_string()), parse_headers(lines))
        } else {
            (None, parse_headers(text.lines()))
        };

        let key = headers
            .get("sec-websocket-key")
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::InvalidHandshake("Missing Sec-WebSocket-Key header".into()))?
            .clone();

        Ok(Self {
            path,
            host: headers.get("host").cloned(),
            key,
        })
    }

    /// Parse a handshake request with size limit.
    ///
    /// # Errors
    ///
    /// - `Error::HandshakeTooLarge` if data exceeds max_size
    /// - Other handshake errors as per `parse()`
    pub fn parse_with_limit(data: &[u8], max_size: usize) -> Result<Self> {
        if data.len() > max_size {
            return Err(Error::HandshakeTooLarge {
                size: data.len(),
                max: max_size,
            });
        }
        Self::parse(data)
    }
}

/// Switching-Protocols response sent back to the client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HandshakeResponse {
    /// The Sec-WebSocket-Accept value.
    pub accept: String,
}

impl HandshakeResponse {
    /// Create a handshake response from a parsed request.
    pub fn from_request(req: &HandshakeRequest) -> Self {
        Self {
            accept: compute_accept_key(&req.key),
        }
    }

    /// Write the HTTP response to a buffer.
    pub fn write(&self, buf: &mut Vec<u8>) {
        buf.extend_from_slice(b"HTTP/1.1 101 Switching Protocols\r\n");
        buf.extend_from_slice(b"Upgrade: websocket\r\n");
        buf.extend_from_slice(b"Connection: Upgrade\r\n");
        buf.extend_from_slice(format!("Sec-WebSocket-Accept: {}\r\n", self.accept).as_bytes());
        buf.extend_from_slice(b"\r\n");
    }

    /// Serialize the HTTP response.
    #[must_use]
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = Vec::with_capacity(129);
        self.write(&mut buf);
        Bytes::from(buf)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const RFC_REQUEST: &[u8] = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    #[test]
    fn test_compute_accept_key_rfc_example() {
        // RFC 6455 Section 1.3 example
        let key = "dGhlIHNhbXBsZSBub25jZQ==";
        assert_eq!(compute_accept_key(key), "s3pPLMBiTxaQ9kYGzzhZRbK+xOo=");
    }

    #[test]
    fn test_parse_valid_request() {
        let req = HandshakeRequest::parse(RFC_REQUEST).unwrap();
        assert_eq!(req.path.as_deref(), Some("/chat"));
        assert_eq!(req.host.as_deref(), Some("server.example.com"));
        assert_eq!(req.key, "dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn test_parse_request_missing_key() {
        let request = b"GET /chat HTTP/1.1\r\n\
            Host: server.example.com\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            \r\n";

        let err = HandshakeRequest::parse(request).unwrap_err();
        assert!(matches!(err, Error::InvalidHandshake(msg) if msg.contains("Sec-WebSocket-Key")));
    }

    #[test]
    fn test_parse_request_empty_key() {
        let request = b"GET / HTTP/1.1\r\nSec-WebSocket-Key: \r\n\r\n";
        assert!(HandshakeRequest::parse(request).is_err());
    }

    #[test]
    fn test_parse_invalid_utf8() {
        let err = HandshakeRequest::parse(&[0xff, 0xfe, 0x0d, 0x0a]).unwrap_err();
        assert!(matches!(err, Error::InvalidHandshake(msg) if msg.contains("UTF-8")));
    }

    #[test]
    fn test_parse_empty_request() {
        assert!(HandshakeRequest::parse(b"").is_err());
    }

    #[test]
    fn test_case_insensitive_headers() {
        let request = b"GET /chat HTTP/1.1\r\n\
            HOST: server.example.com\r\n\
            SEC-WEBSOCKET-KEY: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            \r\n";

        let req = HandshakeRequest::parse(request).unwrap();
        assert_eq!(req.key, "dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn test_parse_headers_without_request_line() {
        let request = b"Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\r\n";
        let req = HandshakeRequest::parse(request).unwrap();
        assert_eq!(req.path, None);
        assert_eq!(req.key, "dGhlIHNhbXBsZSBub25jZQ==");
    }

    #[test]
    fn test_handshake_too_large() {
        let large_data = vec![b'A'; 10000];
        let result = HandshakeRequest::parse_with_limit(&large_data, 8192);
        assert!(matches!(
            result,
            Err(Error::HandshakeTooLarge {
                size: 10000,
                max: 8192
            })
        ));
    }

    #[test]
    fn test_handshake_at_limit() {
        assert!(HandshakeRequest::parse_with_limit(RFC_REQUEST, RFC_REQUEST.len()).is_ok());
    }

    #[test]
    fn test_response_bytes_exact() {
        let resp = negotiate(RFC_REQUEST).unwrap();
        assert_eq!(
            &resp.to_bytes()[..],
            b"HTTP/1.1 101 Switching Protocols\r\n\
Upgrade: websocket\r\n\
Connection: Upgrade\r\n\
Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\
\r\n"
        );
    }

    #[test]
    fn test_negotiate_without_key_yields_nothing() {
        let request = b"GET / HTTP/1.1\r\nHost: example.com\r\nUpgrade: websocket\r\n\r\n";
        assert_eq!(negotiate(request), None);
    }
}
