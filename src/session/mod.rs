//! Client sessions: one per accepted connection.

mod client;
mod events;
mod mode;
mod state;

pub use client::{ClientSession, DEFAULT_CLOSE_REASON, SessionId, WeakSession};
pub use events::{ErrorCallback, LifecycleCallback, MessageCallback};
pub use mode::CommunicationMode;
pub use state::SessionState;
