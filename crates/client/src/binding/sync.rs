//! Request/response client binding
//!
//! One request carries one envelope and returns a list of zero or more
//! response envelopes. Multi-turn exchanges chain further requests inside the
//! same logical call; undrained response envelopes are queued per session.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::warn;

use cardlink_core::{Error, MessageEnvelope, SessionId};

use crate::binding::ClientBinding;

/// Endpoint contract implemented by the host application
///
/// Typically an HTTP POST carrying one envelope and returning a JSON array of
/// envelopes. The call blocks for the server's reply; retries are a caller
/// concern, the binding never retries implicitly.
#[async_trait]
pub trait SyncEndpointClient: Send + Sync {
    /// Send one request envelope and return the response envelopes
    async fn send_request(&self, message: MessageEnvelope) -> Result<Vec<MessageEnvelope>, Error>;
}

/// Client binding over a [`SyncEndpointClient`]
#[allow(missing_debug_implementations)]
pub struct SyncClientBinding {
    endpoint: Arc<dyn SyncEndpointClient>,
    pending: Mutex<HashMap<SessionId, VecDeque<MessageEnvelope>>>,
}

impl SyncClientBinding {
    /// Create a binding over the given endpoint
    pub fn new(endpoint: Arc<dyn SyncEndpointClient>) -> Self {
        Self {
            endpoint,
            pending: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ClientBinding for SyncClientBinding {
    async fn open(&self, _session_id: &SessionId) -> Result<(), Error> {
        Ok(())
    }

    async fn exchange(
        &self,
        session_id: &SessionId,
        outbound: Option<MessageEnvelope>,
    ) -> Result<MessageEnvelope, Error> {
        if let Some(envelope) = outbound {
            let replies = self.endpoint.send_request(envelope).await?;
            let mut pending = self.pending.lock();
            let queue = pending.entry(session_id.clone()).or_default();
            for reply in replies {
                if reply.session_id() != session_id {
                    warn!(
                        expected = %session_id,
                        received = %reply.session_id(),
                        "response envelope for a different session, dropping"
                    );
                    continue;
                }
                queue.push_back(reply);
            }
        }
        self.pending
            .lock()
            .get_mut(session_id)
            .and_then(VecDeque::pop_front)
            .ok_or_else(|| {
                Error::protocol(format!("server returned no envelope for session {session_id}"))
            })
    }

    async fn close(&self, session_id: &SessionId) {
        self.pending.lock().remove(session_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlink_core::Action;

    struct CannedEndpoint {
        replies: Mutex<VecDeque<Vec<MessageEnvelope>>>,
    }

    #[async_trait]
    impl SyncEndpointClient for CannedEndpoint {
        async fn send_request(
            &self,
            _message: MessageEnvelope,
        ) -> Result<Vec<MessageEnvelope>, Error> {
            Ok(self.replies.lock().pop_front().unwrap_or_default())
        }
    }

    #[tokio::test]
    async fn multi_envelope_responses_drain_in_order() {
        let id = SessionId::from("s-1");
        let endpoint = Arc::new(CannedEndpoint {
            replies: Mutex::new(VecDeque::from([vec![
                MessageEnvelope::new(id.clone(), "n", Action::ReaderEvent),
                MessageEnvelope::new(id.clone(), "n", Action::Terminate),
            ]])),
        });
        let binding = SyncClientBinding::new(endpoint);

        let request = MessageEnvelope::new(id.clone(), "n", Action::Execute);
        let first = binding.exchange(&id, Some(request)).await.unwrap();
        assert_eq!(first.action(), Action::ReaderEvent);
        let second = binding.exchange(&id, None).await.unwrap();
        assert_eq!(second.action(), Action::Terminate);
    }

    #[tokio::test]
    async fn empty_response_is_a_protocol_error() {
        let id = SessionId::from("s-2");
        let endpoint = Arc::new(CannedEndpoint {
            replies: Mutex::new(VecDeque::new()),
        });
        let binding = SyncClientBinding::new(endpoint);

        let request = MessageEnvelope::new(id.clone(), "n", Action::Execute);
        assert!(matches!(
            binding.exchange(&id, Some(request)).await,
            Err(Error::Protocol(_))
        ));
    }

    #[tokio::test]
    async fn foreign_session_envelopes_are_dropped() {
        let id = SessionId::from("s-3");
        let endpoint = Arc::new(CannedEndpoint {
            replies: Mutex::new(VecDeque::from([vec![
                MessageEnvelope::new(SessionId::from("other"), "n", Action::Terminate),
                MessageEnvelope::new(id.clone(), "n", Action::Terminate),
            ]])),
        });
        let binding = SyncClientBinding::new(endpoint);

        let request = MessageEnvelope::new(id.clone(), "n", Action::Execute);
        let reply = binding.exchange(&id, Some(request)).await.unwrap();
        assert_eq!(reply.session_id(), &id);
    }
}
