use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use super::{Topology, check_duplex, tag, wire_duplex};
use crate::error::Result;
use crate::session::{ClientSession, CommunicationMode};

/// Members take turns talking; each message is relayed to all others.
///
/// Turn-taking is left to the members. Concurrent senders are relayed just
/// like in [`FullDuplexConnection`](super::FullDuplexConnection).
#[derive(Debug)]
pub struct HalfDuplexConnection {
    members: Vec<ClientSession>,
    opened: AtomicBool,
}

impl HalfDuplexConnection {
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
}

impl Topology for HalfDuplexConnection {
    fn kind(&self) -> CommunicationMode {
        CommunicationMode::HalfDuplex
    }

    fn members(&self) -> Vec<ClientSession> {
        self.members.clone()
    }

    fn open_communication_channels(&self) {
        if self.opened.swap(true, Ordering::AcqRel) {
            debug!("half-duplex channels already open");
            return;
        }
        tag(&self.members, self.kind());
        wire_duplex(&self.members);
    }
}
