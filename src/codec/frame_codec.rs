use bytes::{BufMut, Bytes, BytesMut};

use crate::codec::fragmenter::MessageFragmenter;
use crate::config::Limits;
use crate::error::{Error, Result};
use crate::protocol::{Frame, OpCode};

/// Maximum payload bytes carried by one outbound frame.
///
/// Keeps every outbound frame inside the 7-bit base length field, so the
/// encoder never needs the extended length forms.
pub const FRAGMENT_SIZE: usize = 10;

/// Kind of outbound message, selecting the opcode of its first frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum FrameKind {
    /// UTF-8 text (opcode 0x1).
    #[default]
    Text,
    /// Arbitrary bytes (opcode 0x2).
    Binary,
    /// Close notification (opcode 0x8).
    Close,
}

impl FrameKind {
    /// Opcode used by the first frame of a message of this kind.
    #[inline]
    #[must_use]
    pub const fn opcode(self) -> OpCode {
        match self {
            FrameKind::Text => OpCode::Text,
            FrameKind::Binary => OpCode::Binary,
            FrameKind::Close => OpCode::Close,
        }
    }
}

/// One inbound frame and the number of input bytes it occupied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DecodedFrame {
    /// The decoded frame, payload already unmasked.
    pub frame: Frame,
    /// Bytes of input consumed by this frame.
    pub consumed: usize,
}

impl DecodedFrame {
    /// Payload interpreted as text. Invalid UTF-8 sequences are replaced
    /// with U+FFFD.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(self.frame.payload()).into_owned()
    }

    /// Check whether the peer sent a close frame.
    #[inline]
    #[must_use]
    pub fn is_close(&self) -> bool {
        self.frame.opcode == OpCode::Close
    }
}

/// Server-side frame codec.
///
/// Decoding reads exactly one frame per call with no reassembly across calls.
/// Encoding splits payloads into [`FRAGMENT_SIZE`] chunks and never masks.
///
/// ## Example
///
/// ```
/// use wsrelay::codec::{FrameCodec, FrameKind};
///
/// let frames = FrameCodec::encode(b"hello, world", FrameKind::Text);
/// assert_eq!(frames.len(), 2);
/// assert_eq!(&frames[0][..2], &[0x01, 10]);
/// assert_eq!(&frames[1][..2], &[0x80, 2]);
/// ```
#[derive(Debug, Clone)]
pub struct FrameCodec {
    max_frame_size: usize,
}

impl Default for FrameCodec {
    fn default() -> Self {
        Self::new(&Limits::default())
    }
}

impl FrameCodec {
    /// Create a codec enforcing the given limits on inbound frames.
    #[must_use]
    pub fn new(limits: &Limits) -> Self {
        Self {
            max_frame_size: limits.max_frame_size,
        }
    }

    /// Decode one client frame from the front of `data`.
    ///
    /// Masked frames go through the full 7/16/64-bit length dispatch. A frame
    /// without the mask bit is taken as-is: the payload is every byte after
    /// the 2-byte header and the whole input is consumed.
    ///
    /// # Errors
    ///
    /// - `Error::IncompleteFrame` if the header or payload is truncated
    /// - `Error::InvalidOpcode` for opcodes other than continuation, text,
    ///   binary and close
    /// - `Error::FrameTooLarge` if the declared length exceeds the limit
    pub fn decode(&self, data: &[u8]) -> Result<DecodedFrame> {
        if data.len() < 2 {
            return Err(Error::IncompleteFrame {
                needed: 2 - data.len(),
            });
        }

        if data[1] & 0x80 == 0 {
            let fin = data[0] & 0x80 != 0;
            let opcode = OpCode::from_u8(data[0] & 0x0F)?;
            return Ok(DecodedFrame {
                frame: Frame::new(fin, opcode, data[2..].to_vec()),
                consumed: data.len(),
            });
        }

        let (frame, consumed) = Frame::parse_with_limit(data, self.max_frame_size)?;
        Ok(DecodedFrame { frame, consumed })
    }

    /// Decode one client frame and return its payload as text.
    ///
    /// # Errors
    ///
    /// Same as [`FrameCodec::decode`].
    pub fn decode_text(&self, data: &[u8]) -> Result<String> {
        self.decode(data).map(|decoded| decoded.text())
    }

    /// Encode `payload` into the ordered frames to write to the socket.
    ///
    /// Each frame is a 2-byte header (opcode with FIN on the last frame, then
    /// the chunk length) followed by the unmasked chunk.
    #[must_use]
    pub fn encode(payload: &[u8], kind: FrameKind) -> Vec<Bytes> {
        let fragmenter = MessageFragmenter::new(payload, kind.opcode(), FRAGMENT_SIZE);
        let mut frames = Vec::with_capacity(fragmenter.frame_count());

        for frame in fragmenter {
            let chunk = frame.payload();
            let mut buf = BytesMut::with_capacity(2 + chunk.len());
            let fin = if frame.fin { 0x80 } else { 0x00 };
            buf.put_u8(fin | frame.opcode.as_u8());
            buf.put_u8(chunk.len() as u8);
            buf.extend_from_slice(chunk);
            frames.push(buf.freeze());
        }

        frames
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client_frame(opcode: OpCode, payload: &[u8], mask: [u8; 4]) -> Bytes {
        Frame::new(true, opcode, payload.to_vec())
            .to_bytes(Some(mask))
            .unwrap()
    }

    #[test]
    fn test_decode_masked_hello() {
        let data = [
            0x81, 0x85, 0x37, 0xfa, 0x21, 0x3d, 0x7f, 0x9f, 0x4d, 0x51, 0x58,
        ];
        let codec = FrameCodec::default();
        let decoded = codec.decode(&data).unwrap();
        assert_eq!(decoded.consumed, 11);
        assert_eq!(decoded.text(), "Hello");
        assert!(!decoded.is_close());
    }

    #[test]
    fn test_decode_16_bit_length() {
        let payload = "a".repeat(200);
        let data = client_frame(OpCode::Text, payload.as_bytes(), [0x11, 0x22, 0x33, 0x44]);
        let codec = FrameCodec::default();
        assert_eq!(codec.decode_text(&data).unwrap(), payload);
    }

    #[test]
    fn test_decode_64_bit_length() {
        let payload = "z".repeat(65_600);
        let data = client_frame(OpCode::Text, payload.as_bytes(), [0xde, 0xad, 0xbe, 0xef]);
        assert_eq!(data[1] & 0x7F, 127);
        let codec = FrameCodec::default();
        assert_eq!(codec.decode_text(&data).unwrap(), payload);
    }

    #[test]
    fn test_decode_64_bit_length_over_limit() {
        let payload = vec![b'q'; 70_000];
        let data = client_frame(OpCode::Binary, &payload, [1, 2, 3, 4]);
        let codec = FrameCodec::new(&Limits::embedded());
        assert!(matches!(
            codec.decode(&data),
            Err(Error::FrameTooLarge { size: 70_000, .. })
        ));
    }

    #[test]
    fn test_decode_truncated_payload() {
        let data = client_frame(OpCode::Text, b"Hello", [1, 2, 3, 4]);
        let codec = FrameCodec::default();
        let err = codec.decode(&data[..data.len() - 2]).unwrap_err();
        assert_eq!(err, Error::IncompleteFrame { needed: 2 });
    }

    #[test]
    fn test_decode_too_short() {
        let codec = FrameCodec::default();
        assert!(matches!(
            codec.decode(&[0x81]),
            Err(Error::IncompleteFrame { needed: 1 })
        ));
    }

    #[test]
    fn test_decode_unmasked_fallback_takes_rest() {
        // Length byte says 2 but the fallback ignores it.
        let data = [0x81, 0x02, b'h', b'i', b'!'];
        let codec = FrameCodec::default();
        let decoded = codec.decode(&data).unwrap();
        assert_eq!(decoded.text(), "hi!");
        assert_eq!(decoded.consumed, 5);
    }

    #[test]
    fn test_decode_invalid_opcode() {
        let data = client_frame(OpCode::Text, b"x", [0; 4]);
        let mut data = data.to_vec();
        data[0] = 0x89;
        let codec = FrameCodec::default();
        assert_eq!(codec.decode(&data), Err(Error::InvalidOpcode(0x9)));
    }

    #[test]
    fn test_decode_lossy_text() {
        let data = client_frame(OpCode::Text, &[b'o', b'k', 0xff], [5, 6, 7, 8]);
        let codec = FrameCodec::default();
        assert_eq!(codec.decode_text(&data).unwrap(), "ok\u{FFFD}");
    }

    #[test]
    fn test_decode_consumes_only_first_frame() {
        let mut data = client_frame(OpCode::Text, b"one", [1, 1, 1, 1]).to_vec();
        data.extend_from_slice(&client_frame(OpCode::Text, b"two", [2, 2, 2, 2]));
        let codec = FrameCodec::default();

        let first = codec.decode(&data).unwrap();
        assert_eq!(first.text(), "one");
        let second = codec.decode(&data[first.consumed..]).unwrap();
        assert_eq!(second.text(), "two");
    }

    #[test]
    fn test_encode_short_text() {
        let frames = FrameCodec::encode(b"Hello", FrameKind::Text);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &[0x81, 0x05, b'H', b'e', b'l', b'l', b'o']);
    }

    #[test]
    fn test_encode_splits_into_ten_byte_chunks() {
        let frames = FrameCodec::encode(b"abcdefghijklmnopqrstuvw", FrameKind::Text);
        assert_eq!(frames.len(), 3);
        assert_eq!(&frames[0][..2], &[0x01, 10]);
        assert_eq!(&frames[1][..2], &[0x00, 10]);
        assert_eq!(&frames[2][..2], &[0x80, 3]);
        assert_eq!(&frames[2][2..], b"uvw");
    }

    #[test]
    fn test_encode_binary_and_close_opcodes() {
        let binary = FrameCodec::encode(&[1, 2, 3], FrameKind::Binary);
        assert_eq!(binary[0][0], 0x82);

        let close = FrameCodec::encode(b"server side disconnected", FrameKind::Close);
        assert_eq!(close.len(), 3);
        assert_eq!(close[0][0], 0x08);
        assert_eq!(close[1][0], 0x00);
        assert_eq!(close[2][0], 0x80);
    }

    #[test]
    fn test_encode_empty_payload() {
        let frames = FrameCodec::encode(b"", FrameKind::Close);
        assert_eq!(frames.len(), 1);
        assert_eq!(&frames[0][..], &[0x88, 0x00]);
    }

    #[test]
    fn test_frame_kind_default_is_text() {
        assert_eq!(FrameKind::default(), FrameKind::Text);
        assert_eq!(FrameKind::Close.opcode(), OpCode::Close);
    }
}
