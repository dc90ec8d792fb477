//! # wsrelay - WebSocket relay server over raw TCP
//!
//! `wsrelay` accepts WebSocket clients, performs the opening handshake,
//! decodes their frames into text messages and relays those messages between
//! clients.
//!
//! ## Features
//!
//! - **Handshake negotiation** computing `Sec-WebSocket-Accept` (RFC 6455)
//! - **Frame codec** with 7/16/64-bit lengths, unmasking and fixed-size
//!   outbound fragmentation
//! - **Client sessions** with a small state machine and event callbacks
//! - **Registry** with broadcast and client-list queries
//! - **Topologies**: full-duplex, half-duplex and simplex relays
//! - **Tokio TCP server** behind the `async-tokio` feature (default)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use wsrelay::{ServerConfig, WebSocketServer};
//!
//! # async fn run() -> wsrelay::Result<()> {
//! let server = WebSocketServer::new(ServerConfig::default());
//! server
//!     .on_client_connect(|session| {
//!         let _ = session.send("welcome");
//!     })
//!     .on_client_message(|message, session| {
//!         let _ = session.send(message);
//!     });
//! let handle = server.listen().await?;
//! # handle.shutdown().await;
//! # Ok(())
//! # }
//! ```

pub mod codec;
pub mod config;
pub mod error;
pub mod protocol;
pub mod registry;
pub mod server;
pub mod session;
pub mod topology;
pub mod transport;

pub use codec::{FrameCodec, FrameKind};
pub use config::{Limits, ServerConfig};
pub use error::{Error, Result};
pub use protocol::{HandshakeRequest, HandshakeResponse, OpCode, WS_GUID, compute_accept_key};
pub use registry::{ClientQuery, ConnectedClients, Outgoing, SessionRegistry};
#[cfg(feature = "async-tokio")]
pub use server::ServerHandle;
pub use server::WebSocketServer;
pub use session::{
    ClientSession, CommunicationMode, DEFAULT_CLOSE_REASON, SessionId, SessionState, WeakSession,
};
pub use topology::{FullDuplexConnection, HalfDuplexConnection, SimplexConnection, Topology};
pub use transport::{MemoryTransport, Transport};
