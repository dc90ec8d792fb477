//! WebSocket protocol core (RFC 6455 subset): framing, masking and the
//! opening handshake.

pub mod frame;
pub mod handshake;
pub mod mask;
pub mod opcode;

pub use frame::Frame;
pub use handshake::{HandshakeRequest, HandshakeResponse, WS_GUID, compute_accept_key, negotiate};
pub use mask::{apply_mask, apply_mask_fast};
pub use opcode::OpCode;
