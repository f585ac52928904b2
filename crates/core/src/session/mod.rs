//! Session identifiers, states and the session registry
//!
//! A session is one logical remote-reader conversation, identified end to end
//! by a [`SessionId`]. The [`registry::SessionRegistry`] owns every live
//! session on its side of the link.

pub mod registry;

use std::time::Instant;

use derive_more::Display;

pub use registry::SessionRegistry;

/// Opaque session token, unique per logical conversation
///
/// Generated with a v4 uuid by the side that initiates the session.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Display)]
pub struct SessionId(String);

impl SessionId {
    /// Generate a fresh session id
    pub fn generate() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// The raw token
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for SessionId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for SessionId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

/// Lifecycle state of a session
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The session is live and idle
    Open,
    /// A caller is suspended waiting for the next inbound envelope
    AwaitingReply,
    /// The session ended normally
    Closed,
    /// The session ended on an error or channel loss
    Failed,
}

/// Read-only snapshot of a live session
#[derive(Debug, Clone)]
pub struct SessionInfo {
    /// Session identifier
    pub id: SessionId,
    /// Current lifecycle state
    pub state: SessionState,
    /// Client endpoint that initiated the session, once known
    pub client_node_id: Option<String>,
    /// Reader this session is bound to, if any
    pub reader_name: Option<String>,
    /// Whether a duplex channel is bound and open (async binding only)
    pub channel_open: bool,
    /// When the session was created
    pub created_at: Instant,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_ids_are_unique() {
        let a = SessionId::generate();
        let b = SessionId::generate();
        assert_ne!(a, b);
        assert!(!a.as_str().is_empty());
    }
}
