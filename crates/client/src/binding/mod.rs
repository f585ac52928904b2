//! Transport bindings for the client node
//!
//! A binding moves envelopes between the client node and the server. The
//! [`sync`] binding rides one request/response round trip per exchange; the
//! [`duplex`] binding rides a persistent channel keyed by session id. The
//! node engine is identical over both.

pub mod duplex;
pub mod sync;

use async_trait::async_trait;
use cardlink_core::{Error, MessageEnvelope, SessionId};

pub use duplex::{AsyncClientBinding, AsyncClientHandler, AsyncEndpointClient};
pub use sync::{SyncClientBinding, SyncEndpointClient};

/// Delivery mechanism between the client node and the server
#[async_trait]
pub trait ClientBinding: Send + Sync {
    /// Prepare the session's transport resource
    ///
    /// No-op for the sync binding; opens and awaits the channel handshake for
    /// the duplex binding.
    async fn open(&self, session_id: &SessionId) -> Result<(), Error>;

    /// Send `outbound` (when present) and return the next inbound envelope
    /// for the session
    async fn exchange(
        &self,
        session_id: &SessionId,
        outbound: Option<MessageEnvelope>,
    ) -> Result<MessageEnvelope, Error>;

    /// Release the session's transport resource, best effort
    async fn close(&self, session_id: &SessionId);
}
