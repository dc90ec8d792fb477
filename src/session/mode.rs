//! Communication mode tag.

/// Relay pattern a session currently takes part in.
///
/// Set when a topology opens its channels. Informational only: nothing in
/// the session changes its behavior based on the mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommunicationMode {
    /// Every member relays to every other member.
    #[default]
    FullDuplex,
    /// Members take turns. Turn-taking is not enforced.
    HalfDuplex,
    /// One announcer relays to receivers; no path back.
    Simplex,
}

impl std::fmt::Display for CommunicationMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CommunicationMode::FullDuplex => write!(f, "full-duplex"),
            CommunicationMode::HalfDuplex => write!(f, "half-duplex"),
            CommunicationMode::Simplex => write!(f, "simplex"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_full_duplex() {
        assert_eq!(CommunicationMode::default(), CommunicationMode::FullDuplex);
    }

    #[test]
    fn test_mode_display() {
        assert_eq!(CommunicationMode::FullDuplex.to_string(), "full-duplex");
        assert_eq!(CommunicationMode::HalfDuplex.to_string(), "half-duplex");
        assert_eq!(CommunicationMode::Simplex.to_string(), "simplex");
    }
}
