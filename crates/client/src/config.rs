//! Client node configuration

use std::time::Duration;

/// Configuration options for a client node
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Identifier of this client endpoint, carried in every envelope
    pub node_id: String,
    /// Safety-net timeout for awaiting a reply envelope
    pub request_timeout: Duration,
    /// Timeout for the duplex open handshake
    pub open_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            node_id: format!("client-{}", uuid::Uuid::new_v4()),
            request_timeout: Duration::from_secs(10),
            open_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Create a configuration with default timeouts
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the client node identifier
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    /// Set the reply await timeout
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the duplex open handshake timeout
    pub const fn with_open_timeout(mut self, timeout: Duration) -> Self {
        self.open_timeout = timeout;
        self
    }
}
