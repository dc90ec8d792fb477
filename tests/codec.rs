//! Wire-level checks of the handshake and frame codec.

use wsrelay::codec::{FrameCodec, FrameKind};
use wsrelay::protocol::{HandshakeRequest, HandshakeResponse, negotiate};
use wsrelay::{Error, Limits};

#[test]
fn test_rfc_sample_handshake_is_byte_exact() {
    let request = b"GET /chat HTTP/1.1\r\n\
        Host: server.example.com\r\n\
        Upgrade: websocket\r\n\
        Connection: Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Origin: http://example.com\r\n\
        Sec-WebSocket-Version: 13\r\n\r\n";

    let response = negotiate(request).unwrap();
    assert_eq!(
        &response.to_bytes()[..],
        b"HTTP/1.1 101 Switching Protocols\r\n\
          Upgrade: websocket\r\n\
          Connection: Upgrade\r\n\
          Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n\r\n"
    );
}

#[test]
fn test_handshake_without_key_has_no_response() {
    assert!(negotiate(b"GET / HTTP/1.1\r\nHost: a\r\nUpgrade: websocket\r\n\r\n").is_none());
    assert!(negotiate(b"GET / HTTP/1.1\r\nSec-WebSocket-Key:   \r\n\r\n").is_none());
    assert!(negotiate(&[0xff, 0xfe, 0x00]).is_none());
}

#[test]
fn test_handshake_limit() {
    let request = b"GET / HTTP/1.1\r\nSec-WebSocket-Key: abc\r\n\r\n";
    let err = HandshakeRequest::parse_with_limit(request, 8).unwrap_err();
    assert!(matches!(err, Error::HandshakeTooLarge { max: 8, .. }));

    let req = HandshakeRequest::parse_with_limit(request, 1024).unwrap();
    assert_eq!(req.path.as_deref(), Some("/"));
    assert_eq!(HandshakeResponse::from_request(&req).accept.len(), 28);
}

#[test]
fn test_rfc_masked_hello() {
    let data = [0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58];
    assert_eq!(FrameCodec::default().decode_text(&data).unwrap(), "Hello");
}

#[test]
fn test_forged_64_bit_length_rejected_before_allocation() {
    let mut data = vec![0x82, 0xFF];
    data.extend_from_slice(&u64::MAX.to_be_bytes());
    data.extend_from_slice(&[0, 0, 0, 0]);

    let codec = FrameCodec::new(&Limits::default());
    assert!(matches!(
        codec.decode(&data),
        Err(Error::FrameTooLarge { size: u64::MAX, .. })
    ));
}

#[test]
fn test_encode_23_bytes() {
    let frames = FrameCodec::encode(b"0123456789abcdefghijXYZ", FrameKind::Text);
    let headers: Vec<[u8; 2]> = frames.iter().map(|f| [f[0], f[1]]).collect();
    assert_eq!(headers, vec![[0x01, 10], [0x00, 10], [0x80, 3]]);
}
