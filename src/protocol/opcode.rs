//! WebSocket frame opcodes understood by the relay.

use crate::error::{Error, Result};

/// WebSocket frame opcode.
///
/// Only the opcodes the relay produces or accepts are represented; ping and
/// pong are not part of this server's protocol surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
#[non_exhaustive]
pub enum OpCode {
    /// Continuation frame (0x0).
    ///
    /// Used for every fragment after the first.
    Continuation = 0x0,

    /// Text frame (0x1).
    Text = 0x1,

    /// Binary frame (0x2).
    Binary = 0x2,

    /// Close frame (0x8).
    Close = 0x8,
}

impl OpCode {
    /// Create OpCode from raw byte value.
    ///
    /// # Errors
    ///
    /// Returns `Error::InvalidOpcode` for any value other than 0x0, 0x1, 0x2 or 0x8.
    pub fn from_u8(byte: u8) -> Result<Self> {
        match byte {
            0x0 => Ok(OpCode::Continuation),
            0x1 => Ok(OpCode::Text),
            0x2 => Ok(OpCode::Binary),
            0x8 => Ok(OpCode::Close),
            _ => Err(Error::InvalidOpcode(byte)),
        }
    }

    /// Convert OpCode to raw byte value.
    #[inline]
    #[must_use]
    pub const fn as_u8(self) -> u8 {
        self as u8
    }

    /// Get human-readable name for this opcode.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OpCode::Continuation => "Continuation",
            OpCode::Text => "Text",
            OpCode::Binary => "Binary",
            OpCode::Close => "Close",
        }
    }
}

impl std::fmt::Display for OpCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_opcode_from_u8_valid() {
        assert_eq!(OpCode::from_u8(0x0).unwrap(), OpCode::Continuation);
        assert_eq!(OpCode::from_u8(0x1).unwrap(), OpCode::Text);
        assert_eq!(OpCode::from_u8(0x2).unwrap(), OpCode::Binary);
        assert_eq!(OpCode::from_u8(0x8).unwrap(), OpCode::Close);
    }

    #[test]
    fn test_opcode_from_u8_unsupported() {
        for byte in [0x3, 0x7, 0x9, 0xA, 0xF] {
            assert!(matches!(OpCode::from_u8(byte), Err(Error::InvalidOpcode(b)) if b == byte));
        }
    }

    #[test]
    fn test_opcode_as_u8() {
        assert_eq!(OpCode::Continuation.as_u8(), 0x0);
        assert_eq!(OpCode::Text.as_u8(), 0x1);
        assert_eq!(OpCode::Binary.as_u8(), 0x2);
        assert_eq!(OpCode::Close.as_u8(), 0x8);
    }

    #[test]
    fn test_opcode_display() {
        assert_eq!(OpCode::Text.to_string(), "Text");
        assert_eq!(OpCode::Close.to_string(), "Close");
    }
}
