//! Message fragmentation for outgoing frames.

use crate::protocol::{Frame, OpCode};

/// Iterator that produces frames from a message payload.
///
/// Splits payloads into frames of at most `fragment_size` bytes. The first
/// frame uses the original opcode, later frames use `OpCode::Continuation`,
/// and only the last frame has FIN set. An empty payload yields one empty
/// final frame.
pub struct MessageFragmenter<'a> {
    payload: &'a [u8],
    opcode: OpCode,
    fragment_size: usize,
    offset: usize,
    is_first: bool,
}

impl<'a> MessageFragmenter<'a> {
    /// Create a new fragmenter for the given payload.
    #[inline]
    #[must_use]
    pub fn new(payload: &'a [u8], opcode: OpCode, fragment_size: usize) -> Self {
        Self {
            payload,
            opcode,
            fragment_size: fragment_size.max(1),
            offset: 0,
            is_first: true,
        }
    }

    /// Number of frames this fragmenter yields in total.
    #[inline]
    #[must_use]
    pub fn frame_count(&self) -> usize {
        self.payload.len().div_ceil(self.fragment_size).max(1)
    }

    /// Get remaining bytes to fragment.
    #[inline]
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.payload.len().saturating_sub(self.offset)
    }
}

impl Iterator for MessageFragmenter<'_> {
    type Item = Frame;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.payload.len() {
            if self.is_first && self.payload.is_empty() {
                self.is_first = false;
                return Some(Frame::new(true, self.opcode, Vec::new()));
            }
            return None;
        }

        let chunk_size = self.remaining().min(self.fragment_size);
        let is_final = self.offset + chunk_size >= self.payload.len();

        let chunk = self.payload[self.offset..self.offset + chunk_size].to_vec();
        self.offset += chunk_size;

        let opcode = if self.is_first {
            self.is_first = false;
            self.opcode
        } else {
            OpCode::Continuation
        };

        Some(Frame::new(is_final, opcode, chunk))
    }
}
