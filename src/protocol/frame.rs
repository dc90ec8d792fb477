//! WebSocket frame parsing and serialization (RFC 6455).

use bytes::{Bytes, BytesMut};

use crate::error::{Error, Result};
use crate::protocol::OpCode;
use crate::protocol::mask::{apply_mask, apply_mask_fast};

/// Largest payload that fits the 7-bit base length field.
pub const MAX_BASE_PAYLOAD: usize = 125;

#[derive(Debug, Clone)]
struct FrameHeader {
    fin: bool,
    opcode: OpCode,
    mask: Option<[u8; 4]>,
    payload_len: u64,
    header_len: usize,
}

/// Parse frame header from buffer.
///
/// # Errors
///
/// - `Error::IncompleteFrame` if not enough data is available
/// - `Error::InvalidOpcode` if the opcode is not supported
#[inline]
fn parse_header(buf: &[u8]) -> Result<FrameHeader> {
    if buf.len() < 2 {
        return Err(Error::IncompleteFrame {
            needed: 2 - buf.len(),
        });
    }

    let byte0 = buf[0];
    let byte1 = buf[1];

    let fin = (byte0 & 0x80) != 0;
    let opcode = OpCode::from_u8(byte0 & 0x0F)?;

    let masked = (byte1 & 0x80) != 0;
    let payload_len_initial = byte1 & 0x7F;

    let (payload_len, length_end) = match payload_len_initial {
        0..=125 => (u64::from(payload_len_initial), 2),
        126 => {
            if buf.len() < 4 {
                return Err(Error::IncompleteFrame {
                    needed: 4 - buf.len(),
                });
            }
            (u64::from(u16::from_be_bytes([buf[2], buf[3]])), 4)
        }
        _ => {
            if buf.len() < 10 {
                return Err(Error::IncompleteFrame {
                    needed: 10 - buf.len(),
                });
            }
            let len = u64::from_be_bytes([
                buf[2], buf[3], buf[4], buf[5], buf[6], buf[7], buf[8], buf[9],
            ]);
            (len, 10)
        }
    };

    let header_len = if masked { length_end + 4 } else { length_end };
    if buf.len() < header_len {
        return Err(Error::IncompleteFrame {
            needed: header_len - buf.len(),
        });
    }

    let mask = masked.then(|| {
        [
            buf[length_end],
            buf[length_end + 1],
            buf[length_end + 2],
            buf[length_end + 3],
        ]
    });

    Ok(FrameHeader {
        fin,
        opcode,
        mask,
        payload_len,
        header_len,
    })
}

/// A WebSocket frame as defined in RFC 6455.
///
/// ## Frame Structure
///
/// ```text
///  0                   1                   2                   3
///  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |F|R|R|R| opcode |M| Payload len |    Extended payload length    |
/// |I|S|S|S|  (4)   |A|     (7)     |             (16/64)           |
/// |N|V|V|V|       |S|             |   (if payload len==126/127)   |
/// | |1|2|3|       |K|             |                               |
/// +-+-+-+-+-------+-+-------------+-------------------------------+
/// |                         Masking key (if present)              |
/// +---------------------------------------------------------------+
/// |                     Payload data                              |
/// +---------------------------------------------------------------+
/// ```
///
/// Frames are ephemeral: built for one encode or decode call and dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Final fragment flag. True if this is the last fragment of a message.
    pub fin: bool,
    /// Frame opcode.
    pub opcode: OpCode,
    /// Masking key the frame arrived with. Outbound server frames have none.
    pub mask: Option<[u8; 4]>,
    /// Unmasked payload data.
    payload: Vec<u8>,
}

impl Frame {
    /// Create a new unmasked frame.
    #[must_use]
    pub fn new(fin: bool, opcode: OpCode, payload: Vec<u8>) -> Self {
        Self {
            fin,
            opcode,
            mask: None,
            payload,
        }
    }

    /// Create a final text frame.
    #[must_use]
    pub fn text(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Text, data.into())
    }

    /// Create a final binary frame.
    #[must_use]
    pub fn binary(data: impl Into<Vec<u8>>) -> Self {
        Self::new(true, OpCode::Binary, data.into())
    }

    /// Create a final close frame carrying `reason` as its payload.
    #[must_use]
    pub fn close(reason: &str) -> Self {
        Self::new(true, OpCode::Close, reason.as_bytes().to_vec())
    }

    /// Get the payload bytes.
    #[inline]
    #[must_use]
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Take ownership of the payload.
    #[must_use]
    pub fn into_payload(self) -> Vec<u8> {
        self.payload
    }

    /// Parse a frame from a buffer.
    ///
    /// Returns the parsed frame (payload already unmasked) and the number of
    /// bytes consumed.
    ///
    /// ## Errors
    ///
    /// - `Error::IncompleteFrame` if the buffer is shorter than the frame
    /// - `Error::InvalidOpcode` if the opcode is not supported
    /// - `Error::FrameTooLarge` if the declared length does not fit in memory
    #[inline]
    pub fn parse(buf: &[u8]) -> Result<(Self, usize)> {
        Self::parse_with_limit(buf, usize::MAX)
    }

    /// Parse a frame, rejecting declared payload lengths above `max_payload`.
    ///
    /// The length check runs before any payload is copied, so a forged 64-bit
    /// length cannot trigger a large allocation.
    ///
    /// ## Errors
    ///
    /// Same as [`Frame::parse`], with `Error::FrameTooLarge` above `max_payload`.
    pub fn parse_with_limit(buf: &[u8], max_payload: usize) -> Result<(Self, usize)> {
        let header = parse_header(buf)?;

        let payload_len = usize::try_from(header.payload_len)
            .ok()
            .filter(|len| *len <= max_payload)
            .ok_or(Error::FrameTooLarge {
                size: header.payload_len,
                max: max_payload,
            })?;

        let total_size =
            header
                .header_len
                .checked_add(payload_len)
                .ok_or(Error::FrameTooLarge {
                    size: header.payload_len,
                    max: max_payload,
                })?;

        if buf.len() < total_size {
            return Err(Error::IncompleteFrame {
                needed: total_size - buf.len(),
            });
        }

        let mut payload = buf[header.header_len..total_size].to_vec();
        if let Some(mask) = header.mask {
            apply_mask_fast(&mut payload, mask);
        }

        let frame = Frame {
            fin: header.fin,
            opcode: header.opcode,
            mask: header.mask,
            payload,
        };

        Ok((frame, total_size))
    }

    /// Write the frame to a buffer.
    ///
    /// Returns the number of bytes written.
    ///
    /// # Arguments
    ///
    /// * `buf` - The buffer to write to
    /// * `mask` - Optional masking key (only clients mask)
    ///
    /// # Errors
    ///
    /// Returns an error if the buffer is too small.
    pub fn write(&self, buf: &mut [u8], mask: Option<[u8; 4]>) -> Result<usize> {
        let payload = self.payload();
        let payload_len = payload.len();

        let (len_byte, extended_len_size) = if payload_len <= MAX_BASE_PAYLOAD {
            (payload_len as u8, 0)
        } else if payload_len <= 65535 {
            (126, 2)
        } else {
            (127, 8)
        };

        let total_size = self.wire_size(mask.is_some());
        if buf.len() < total_size {
            return Err(Error::InvalidFrame(format!(
                "Buffer too small: need {} bytes, have {}",
                total_size,
                buf.len()
            )));
        }

        let mut byte0 = self.opcode.as_u8();
        if self.fin {
            byte0 |= 0x80;
        }
        buf[0] = byte0;

        let mut byte1 = len_byte;
        if mask.is_some() {
            byte1 |= 0x80;
        }
        buf[1] = byte1;

        let mut offset = 2;
        match extended_len_size {
            2 => {
                buf[offset..offset + 2].copy_from_slice(&(payload_len as u16).to_be_bytes());
                offset += 2;
            }
            8 => {
                buf[offset..offset + 8].copy_from_slice(&(payload_len as u64).to_be_bytes());
                offset += 8;
            }
            _ => {}
        }

        if let Some(mask_key) = mask {
            buf[offset..offset + 4].copy_from_slice(&mask_key);
            offset += 4;
        }

        buf[offset..offset + payload_len].copy_from_slice(payload);

        if let Some(mask_key) = mask {
            apply_mask(&mut buf[offset..offset + payload_len], mask_key);
        }

        Ok(total_size)
    }

    /// Serialize the frame into a freshly allocated buffer.
    ///
    /// # Errors
    ///
    /// Never fails in practice; the buffer is sized with [`Frame::wire_size`].
    pub fn to_bytes(&self, mask: Option<[u8; 4]>) -> Result<Bytes> {
        let mut buf = BytesMut::zeroed(self.wire_size(mask.is_some()));
        let written = self.write(&mut buf, mask)?;
        buf.truncate(written);
        Ok(buf.freeze())
    }

    /// Calculate the size needed to write this frame.
    #[must_use]
    pub fn wire_size(&self, masked: bool) -> usize {
        let payload_len = self.payload().len();
        let extended_len_size = if payload_len <= MAX_BASE_PAYLOAD {
            0
        } else if payload_len <= 65535 {
            2
        } else {
            8
        };
        let mask_size = if masked { 4 } else { 0 };
        2 + extended_len_size + mask_size + payload_len
    }
}
