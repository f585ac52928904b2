//! Server node configuration

use std::time::Duration;

/// Configuration options for a server node
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Identifier of this server endpoint
    pub node_id: String,
    /// Safety-net timeout for awaiting a client answer to a `CMD` query
    pub answer_timeout: Duration,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            node_id: format!("server-{}", uuid::Uuid::new_v4()),
            answer_timeout: Duration::from_secs(20),
        }
    }
}

impl ServerConfig {
    /// Create a configuration with default timeouts
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the server node identifier
    pub fn with_node_id(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    /// Set the client answer timeout
    pub const fn with_answer_timeout(mut self, timeout: Duration) -> Self {
        self.answer_timeout = timeout;
        self
    }
}
