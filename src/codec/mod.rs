//! Frame codec used by sessions.
//!
//! This module provides the server-side decode of single client frames and
//! the fixed-size fragmenting encoder for outbound messages.

mod fragmenter;
mod frame_codec;

pub use fragmenter::MessageFragmenter;
pub use frame_codec::{DecodedFrame, FRAGMENT_SIZE, FrameCodec, FrameKind};
