//! Error types for the WebSocket relay server.
//!
//! Every fallible operation in the crate reports one of these variants to its
//! immediate caller. The event paths (session dispatch, topology relays) log
//! the error and keep going instead of propagating it across callbacks.

use thiserror::Error;

/// Result type alias for relay operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur during handshake, framing, session and topology
/// operations.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum Error {
    /// Invalid frame structure or header.
    #[error("Invalid frame: {0}")]
    InvalidFrame(String),

    /// Incomplete frame data.
    #[error("Incomplete frame: need {needed} more bytes")]
    IncompleteFrame {
        /// Number of additional bytes needed.
        needed: usize,
    },

    /// Invalid or unsupported opcode value.
    #[error("Invalid opcode: {0:#x}")]
    InvalidOpcode(u8),

    /// Declared frame length exceeds the configured maximum.
    #[error("Frame too large: {size} bytes (max: {max})")]
    FrameTooLarge {
        /// Declared payload length.
        size: u64,
        /// Maximum allowed payload length.
        max: usize,
    },

    /// Invalid WebSocket handshake request.
    #[error("Invalid handshake: {0}")]
    InvalidHandshake(String),

    /// Handshake request exceeds the configured maximum size.
    #[error("Handshake too large: {size} bytes (max: {max})")]
    HandshakeTooLarge {
        /// Actual request size.
        size: usize,
        /// Maximum allowed size.
        max: usize,
    },

    /// The session has not completed its handshake.
    #[error("Session has not completed the WebSocket handshake")]
    NotEstablished,

    /// The session or its transport has been closed.
    #[error("Connection closed")]
    ConnectionClosed,

    /// I/O error reported by the transport.
    #[error("I/O error: {0}")]
    Io(String),

    /// A duplex topology was built with too few sessions.
    #[error("Topology needs at least {required} sessions, got {actual}")]
    TopologyTooSmall {
        /// Minimum number of sessions.
        required: usize,
        /// Number of sessions supplied.
        actual: usize,
    },

    /// Attempted to broadcast an empty message.
    #[error("Cannot send an empty message")]
    EmptyMessage,

    /// Invalid server configuration.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

impl Error {
    /// Check if decoding stopped only because more input is needed.
    #[must_use]
    pub const fn is_incomplete(&self) -> bool {
        matches!(self, Error::IncompleteFrame { .. })
    }
}

impl From<std::io::Error> for Error {
    fn from(err: std::io::Error) -> Self {
        Error::Io(err.to_string())
    }
}
