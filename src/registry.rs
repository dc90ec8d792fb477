//! Registry of connected sessions and fan-out to them.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::session::ClientSession;

/// Message handed to [`SessionRegistry::broadcast`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outgoing {
    /// Text encoded into frames per session via [`ClientSession::send`].
    Text(String),
    /// Pre-encoded bytes written as-is via [`ClientSession::write`].
    Raw(Bytes),
}

impl From<&str> for Outgoing {
    fn from(text: &str) -> Self {
        Outgoing::Text(text.to_string())
    }
}

impl From<String> for Outgoing {
    fn from(text: String) -> Self {
        Outgoing::Text(text)
    }
}

impl From<Bytes> for Outgoing {
    fn from(bytes: Bytes) -> Self {
        Outgoing::Raw(bytes)
    }
}

/// Selection over the connected sessions.
///
/// Indices follow slice semantics and are clamped to the list: `last_index`
/// is exclusive and an empty range yields an empty list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ClientQuery {
    /// Select the single session at this position.
    pub index: Option<usize>,
    /// First position of the selected range.
    pub start_index: Option<usize>,
    /// End (exclusive) of the selected range.
    pub last_index: Option<usize>,
    /// Report the number of connected sessions.
    pub length: bool,
}

impl ClientQuery {
    /// Query selecting the session at `index`.
    #[must_use]
    pub fn index(index: usize) -> Self {
        Self {
            index: Some(index),
            ..Self::default()
        }
    }

    /// Query selecting `start..last`. Either bound may be omitted.
    #[must_use]
    pub fn range(start: Option<usize>, last: Option<usize>) -> Self {
        Self {
            start_index: start,
            last_index: last,
            ..Self::default()
        }
    }

    /// Query reporting only the count.
    #[must_use]
    pub fn length() -> Self {
        Self {
            length: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn with_length(mut self) -> Self {
        self.length = true;
        self
    }
}

/// Result of a [`ClientQuery`]. Fields not asked for are `None`.
#[derive(Debug, Clone, Default)]
pub struct ConnectedClients {
    pub client: Option<ClientSession>,
    pub clients: Option<Vec<ClientSession>>,
    pub length: Option<usize>,
}

/// Insertion-ordered list of connected sessions.
///
/// Clones share the same list.
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<Vec<ClientSession>>>,
}

impl SessionRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a session.
    pub fn add(&self, session: ClientSession) {
        self.sessions.write().push(session);
    }

    /// Remove a session by identity. Returns `false` if it was not present.
    pub fn remove(&self, session: &ClientSession) -> bool {
        let mut sessions = self.sessions.write();
        match sessions.iter().position(|s| s.same_session(session)) {
            Some(pos) => {
                sessions.remove(pos);
                true
            }
            None => false,
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.sessions.read().is_empty()
    }

    #[must_use]
    pub fn contains(&self, session: &ClientSession) -> bool {
        self.sessions.read().iter().any(|s| s.same_session(session))
    }

    #[must_use]
    pub fn get(&self, index: usize) -> Option<ClientSession> {
        self.sessions.read().get(index).cloned()
    }

    /// Copy of the current list.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ClientSession> {
        self.sessions.read().clone()
    }

    /// Answer a [`ClientQuery`].
    #[must_use]
    pub fn query(&self, query: ClientQuery) -> ConnectedClients {
        let sessions = self.sessions.read();
        let len = sessions.len();

        let clients = match (query.start_index, query.last_index) {
            (None, None) => None,
            (start, last) => {
                let start = start.unwrap_or(0).min(len);
                let last = last.unwrap_or(len).min(len);
                Some(if start < last {
                    sessions[start..last].to_vec()
                } else {
                    Vec::new()
                })
            }
        };

        ConnectedClients {
            client: query.index.and_then(|i| sessions.get(i).cloned()),
            clients,
            length: query.length.then_some(len),
        }
    }

    /// Send `message` to every session, or to those `filter` selects.
    ///
    /// The filter receives each session with its position. Sessions that
    /// fail to accept the message are logged and skipped. Returns the number
    /// of sessions written.
    pub fn broadcast(
        &self,
        message: &Outgoing,
        filter: Option<&dyn Fn(&ClientSession, usize) -> bool>,
    ) -> usize {
        let targets: Vec<ClientSession> = self
            .snapshot()
            .into_iter()
            .enumerate()
            .filter(|(i, s)| filter.is_none_or(|f| f(s, *i)))
            .map(|(_, s)| s)
            .collect();

        debug!(recipients = targets.len(), "broadcast");

        let mut written = 0;
        for session in &targets {
            let result = match message {
                Outgoing::Text(text) => session.send(text),
                Outgoing::Raw(bytes) => session.write(bytes.clone(), None),
            };
            match result {
                Ok(()) => written += 1,
                Err(e) => warn!(session_id = %session.id(), error = %e, "failed to broadcast to client"),
            }
        }
        written
    }
}

impl std::fmt::Debug for SessionRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry")
            .field("len", &self.len())
            .finish()
    }
}
