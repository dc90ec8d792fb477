use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use super::{Topology, relay, tag};
use crate::session::{ClientSession, CommunicationMode};

/// One announcer relays to a list of receivers. Receivers have no path back.
#[derive(Debug)]
pub struct SimplexConnection {
    announcer: ClientSession,
    receivers: Vec<ClientSession>,
    opened: AtomicBool,
}

impl SimplexConnection {
    #[must_use]
    pub fn new(announcer: ClientSession, receivers: Vec<ClientSession>) -> Self {
        Self {
            announcer,
            receivers,
            opened: AtomicBool::new(false),
        }
    }

    #[must_use]
    pub fn announcer(&self) -> &ClientSession {
        &self.announcer
    }

    #[must_use]
    pub fn receivers(&self) -> &[ClientSession] {
        &self.receivers
    }
}

impl Topology for SimplexConnection {
    fn kind(&self) -> CommunicationMode {
        CommunicationMode::Simplex
    }

    fn members(&self) -> Vec<ClientSession> {
        std::iter::once(self.announcer.clone())
            .chain(self.receivers.iter().cloned())
            .collect()
    }

    fn open_communication_channels(&self) {
        if self.opened.swap(true, Ordering::AcqRel) {
            debug!("simplex channels already open");
            return;
        }
        tag(&self.members(), self.kind());
        let targets = self.receivers.iter().map(ClientSession::downgrade).collect();
        relay(&self.announcer, targets);
    }
}
