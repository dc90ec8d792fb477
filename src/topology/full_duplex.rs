use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, warn};

use super::{Topology, check_duplex, tag, wire_duplex};
use crate::error::{Error, Result};
use crate::session::{ClientSession, CommunicationMode};

/// Every member relays its messages to every other member.
#[derive(Debug)]
pub struct FullDuplexConnection {
    members: Vec<ClientSession>,
    opened: AtomicBool,
}

impl FullDuplexConnection {
    /// # Errors
    ///
    /// Returns `Error::TopologyTooSmall` with fewer than two sessions.
    pub fn new(sessions: Vec<ClientSession>) -> Result<Self> {
        check_duplex(&sessions)?;
        Ok(Self {
            members: sessions,
            opened: AtomicBool::new(false),
        })
    }

    /// Send `message` to every member. Returns how many accepted it.
    ///
    /// # Errors
    ///
    /// Returns `Error::EmptyMessage` if `message` is empty.
    pub fn broadcast(&self, message: &str) -> Result<usize> {
        if message.is_empty() {
            return Err(Error::EmptyMessage);
        }
        let mut sent = 0;
        for member in &self.members {
            match member.send(message) {
                Ok(()) => sent += 1,
                Err(e) => warn!(session_id = %member.id(), error = %e, "failed to broadcast to member"),
            }
        }
        Ok(sent)
    }
}

impl Topology for FullDuplexConnection {
    fn kind(&self) -> CommunicationMode {
        CommunicationMode::FullDuplex
    }

    fn members(&self) -> Vec<ClientSession> {
        self.members.clone()
    }

    fn open_communication_channels(&self) {
        if self.opened.swap(true, Ordering::AcqRel) {
            debug!("full-duplex channels already open");
            return;
        }
        tag(&self.members, self.kind());
        wire_duplex(&self.members);
    }
}
