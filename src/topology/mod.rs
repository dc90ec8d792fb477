//! Relay topologies composed over established sessions.
//!
//! A topology subscribes to its members' messages and forwards them to the
//! other members according to its pattern:
//!
//! - [`FullDuplexConnection`]: every member to every other member.
//! - [`HalfDuplexConnection`]: same wiring; members are expected to take
//!   turns, which is not enforced.
//! - [`SimplexConnection`]: one announcer to a list of receivers.
//!
//! Relay subscriptions hold [`WeakSession`]s and are never removed. A target
//! that closed or was dropped is logged and skipped.

use tracing::{trace, warn};

use crate::error::{Error, Result};
use crate::session::{ClientSession, CommunicationMode, WeakSession};

mod full_duplex;
mod half_duplex;
mod simplex;

pub use full_duplex::FullDuplexConnection;
pub use half_duplex::HalfDuplexConnection;
pub use simplex::SimplexConnection;

/// Minimum number of members of a duplex topology.
pub const MIN_DUPLEX_MEMBERS: usize = 2;

/// Common interface of all topologies.
pub trait Topology: Send + Sync {
    /// Communication mode members are tagged with when channels open.
    fn kind(&self) -> CommunicationMode;

    /// All sessions taking part, in order.
    fn members(&self) -> Vec<ClientSession>;

    /// Subscribe the relays. Calling this again has no effect.
    fn open_communication_channels(&self);

    /// Send close frames to every member. Returns how many members accepted
    /// them.
    fn close_communication_channels(&self) -> usize {
        close_all(&self.members())
    }
}

/// Forward every message of `source` to `targets`.
pub(crate) fn relay(source: &ClientSession, targets: Vec<WeakSession>) {
    source.on_message(move |message, from| {
        for target in &targets {
            let Some(session) = target.upgrade() else {
                warn!(from = %from.id(), target = %target.id(), "relay target dropped");
                continue;
            };
            if let Err(e) = session.send(message) {
                warn!(from = %from.id(), target = %target.id(), error = %e, "relay failed");
            }
        }
    });
}

/// Reject duplex member lists shorter than [`MIN_DUPLEX_MEMBERS`].
pub(crate) fn check_duplex(members: &[ClientSession]) -> Result<()> {
    if members.len() < MIN_DUPLEX_MEMBERS {
        return Err(Error::TopologyTooSmall {
            required: MIN_DUPLEX_MEMBERS,
            actual: members.len(),
        });
    }
    Ok(())
}

/// Relay every member to all others, by position.
pub(crate) fn wire_duplex(members: &[ClientSession]) {
    for (i, source) in members.iter().enumerate() {
        let targets = members
            .iter()
            .enumerate()
            .filter(|(j, _)| *j != i)
            .map(|(_, s)| s.downgrade())
            .collect();
        relay(source, targets);
    }
}

pub(crate) fn tag(members: &[ClientSession], mode: CommunicationMode) {
    for member in members {
        member.set_communication_mode(mode);
    }
    trace!(%mode, members = members.len(), "channels open");
}

pub(crate) fn close_all(members: &[ClientSession]) -> usize {
    members
        .iter()
        .filter(|member| match member.close(crate::session::DEFAULT_CLOSE_REASON) {
            Ok(()) => true,
            Err(e) => {
                warn!(session_id = %member.id(), error = %e, "failed to close member");
                false
            }
        })
        .count()
}


#[cfg(test)]
mod tests {
    use super::test_support::established;
    use super::*;

    #[test]
    fn test_check_duplex_member_count() {
        let (a, _) = established();
        let (b, _) = established();

        assert_eq!(
            check_duplex(&[]),
            Err(Error::TopologyTooSmall {
                required: MIN_DUPLEX_MEMBERS,
                actual: 0,
            })
        );
        assert_eq!(
            check_duplex(std::slice::from_ref(&a)),
            Err(Error::TopologyTooSmall {
                required: MIN_DUPLEX_MEMBERS,
                actual: 1,
            })
        );
        assert_eq!(check_duplex(&[a, b]), Ok(()));
    }
}
