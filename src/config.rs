//! Configuration and limits for the relay server.

/// Default bind address, loopback only.
pub const DEFAULT_ADDRESS: &str = "127.0.0.1";

/// Default listening port.
pub const DEFAULT_PORT: u16 = 8080;

/// Resource limits applied to every session.
///
/// These limits bound what a single client can make the server allocate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Limits {
    /// Maximum declared payload length of a single inbound frame.
    ///
    /// Default: 16 MB (16 * 1024 * 1024)
    pub max_frame_size: usize,

    /// Maximum size of the opening handshake request in bytes.
    ///
    /// Default: 8 KB (8192)
    pub max_handshake_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self {
            max_frame_size: 16 * 1024 * 1024, // 16 MB
            max_handshake_size: 8192,
        }
    }
}

impl Limits {
    /// Create new limits with custom values.
    #[must_use]
    pub const fn new(max_frame_size: usize, max_handshake_size: usize) -> Self {
        Self {
            max_frame_size,
            max_handshake_size,
        }
    }

    /// Create limits suitable for small embedded systems.
    ///
    /// - Max frame: 64 KB
    /// - Max handshake: 4 KB
    #[must_use]
    pub const fn embedded() -> Self {
        Self {
            max_frame_size: 64 * 1024,
            max_handshake_size: 4096,
        }
    }
}

/// Relay server configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Address to bind the listener to, as an IP literal or a host name.
    ///
    /// Default: `127.0.0.1`
    pub address: String,

    /// Port to bind the listener to. Port 0 picks an ephemeral port.
    ///
    /// Default: 8080
    pub port: u16,

    /// Per-connection read buffer size (in bytes).
    ///
    /// Default: 8 KB (8192)
    pub read_buffer_size: usize,

    /// Resource limits handed to every session.
    pub limits: Limits,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_ADDRESS.to_string(),
            port: DEFAULT_PORT,
            read_buffer_size: 8192,
            limits: Limits::default(),
        }
    }
}

impl ServerConfig {
    /// Create a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the bind address.
    #[must_use]
    pub fn with_address(mut self, address: impl Into<String>) -> Self {
        self.address = address.into();
        self
    }

    /// Set the bind port.
    #[must_use]
    pub const fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set read buffer size.
    #[must_use]
    pub const fn with_read_buffer_size(mut self, size: usize) -> Self {
        self.read_buffer_size = size;
        self
    }

    /// Set custom limits.
    #[must_use]
    pub const fn with_limits(mut self, limits: Limits) -> Self {
        self.limits = limits;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_limits_default() {
        let limits = Limits::default();
        assert_eq!(limits.max_frame_size, 16 * 1024 * 1024);
        assert_eq!(limits.max_handshake_size, 8192);
    }

    #[test]
    fn test_limits_embedded() {
        let limits = Limits::embedded();
        assert_eq!(limits.max_frame_size, 64 * 1024);
        assert_eq!(limits.max_handshake_size, 4096);
    }

    #[test]
    fn test_config_default() {
        let config = ServerConfig::default();
        assert_eq!(config.address, "127.0.0.1");
        assert_eq!(config.port, 8080);
        assert_eq!(config.read_buffer_size, 8192);
    }

    #[test]
    fn test_config_builder() {
        let config = ServerConfig::new()
            .with_address("0.0.0.0")
            .with_port(9001)
            .with_read_buffer_size(1024)
            .with_limits(Limits::embedded());

        assert_eq!(config.address, "0.0.0.0");
        assert_eq!(config.port, 9001);
        assert_eq!(config.read_buffer_size, 1024);
        assert_eq!(config.limits.max_frame_size, 64 * 1024);
    }
}
