//! Byte-stream transport boundary.
//!
//! A [`Transport`] is the write side of one accepted connection. The read
//! side is owned by whoever drives the connection: it delivers data, error,
//! end and close events to the session through
//! [`ClientSession::handle_data`](crate::ClientSession::handle_data) and its
//! siblings.
//!
//! Two implementations ship with the crate:
//!
//! - [`TcpTransport`] (feature `async-tokio`): a tokio socket with a
//!   dedicated writer task, driven by [`TcpReader`].
//! - [`MemoryTransport`]: records writes in memory and completes them
//!   immediately. Useful for tests and for embedders that move bytes
//!   themselves.

use std::net::SocketAddr;

use bytes::Bytes;

use crate::error::Result;

mod memory;
pub use memory::MemoryTransport;

#[cfg(feature = "async-tokio")]
mod tcp;
#[cfg(feature = "async-tokio")]
pub use tcp::{TcpReader, TcpTransport};

/// Completion callback for a transport write.
///
/// Receives `Ok(())` once the bytes were handed to the operating system, or
/// the error that stopped them.
pub type WriteCallback = Box<dyn FnOnce(Result<()>) + Send + 'static>;

/// Write side of a bidirectional byte stream.
///
/// Implementations must not block: `write` enqueues and returns, and the
/// completion callback (if any) fires later. Callbacks may run on the calling
/// thread before `write` returns, so callers must not hold locks across
/// `write` that the callback also takes.
pub trait Transport: Send + Sync + 'static {
    /// Enqueue `data` for writing, in order with previous writes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConnectionClosed`](crate::Error::ConnectionClosed) if
    /// the transport has been destroyed. In that case `on_complete` is dropped
    /// without being called.
    fn write(&self, data: Bytes, on_complete: Option<WriteCallback>) -> Result<()>;

    /// Forcibly tear down the connection. Idempotent.
    fn destroy(&self);

    /// Remote address of the connection, if known.
    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}
