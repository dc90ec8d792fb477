//! Payload masking (RFC 6455 section 5.3).
//!
//! Client-to-server frames carry a 4-byte key; payload byte `i` is XORed with
//! `key[i % 4]`. XOR is its own inverse, so the same routine masks and unmasks.

/// Byte-by-byte XOR masking.
#[inline]
pub fn apply_mask(data: &mut [u8], mask: [u8; 4]) {
    for (i, byte) in data.iter_mut().enumerate() {
        *byte ^= mask[i % 4];
    }
}

/// Word-at-a-time XOR masking.
///
/// Processes 4-byte chunks as `u32` values and finishes the tail byte by byte.
/// Produces exactly the same output as [`apply_mask`].
#[inline]
pub fn apply_mask_fast(data: &mut [u8], mask: [u8; 4]) {
    let mask_u32 = u32::from_ne_bytes(mask);
    let mut chunks = data.chunks_exact_mut(4);

    for chunk in &mut chunks {
        let val = u32::from_ne_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        chunk.copy_from_slice(&(val ^ mask_u32).to_ne_bytes());
    }

    // Tail starts on a multiple of 4, so the key index restarts at 0.
    for (i, byte) in chunks.into_remainder().iter_mut().enumerate() {
        *byte ^= mask[i];
    }
}
