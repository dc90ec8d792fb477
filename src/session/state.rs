//! Session lifecycle state.

/// Lifecycle state of a client session.
///
/// A session starts in `Handshaking`, becomes `Established` once the
/// handshake response has been written, and ends in `Closed`. `Closed` is
/// reachable from both other states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum SessionState {
    /// Waiting for, or writing, the opening handshake.
    #[default]
    Handshaking,
    /// Handshake complete; frames flow in both directions.
    Established,
    /// The transport ended, closed or was destroyed.
    Closed,
}

impl SessionState {
    /// Check if the session has not been closed yet.
    #[must_use]
    #[inline]
    pub const fn is_open(&self) -> bool {
        !matches!(self, SessionState::Closed)
    }

    /// Check if messages may be sent in this state.
    ///
    /// Returns `true` only for `Established`.
    #[must_use]
    #[inline]
    pub const fn can_send(&self) -> bool {
        matches!(self, SessionState::Established)
    }
}

impl std::fmt::Display for SessionState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionState::Handshaking => write!(f, "Handshaking"),
            SessionState::Established => write!(f, "Established"),
            SessionState::Closed => write!(f, "Closed"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial_state() {
        assert_eq!(SessionState::default(), SessionState::Handshaking);
    }

    #[test]
    fn test_can_send_in_each_state() {
        assert!(!SessionState::Handshaking.can_send());
        assert!(SessionState::Established.can_send());
        assert!(!SessionState::Closed.can_send());
    }

    #[test]
    fn test_is_open() {
        assert!(SessionState::Handshaking.is_open());
        assert!(SessionState::Established.is_open());
        assert!(!SessionState::Closed.is_open());
    }

    #[test]
    fn test_state_display() {
        assert_eq!(SessionState::Handshaking.to_string(), "Handshaking");
        assert_eq!(SessionState::Established.to_string(), "Established");
        assert_eq!(SessionState::Closed.to_string(), "Closed");
    }
}
