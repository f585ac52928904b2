//! Persistent duplex server binding
//!
//! The host application implements [`AsyncEndpointServer`] over its transport
//! (e.g. one websocket per session) and forwards inbound traffic to the
//! node's handler surface. A per-session forwarder task drains the session's
//! outbound stream in order, so envelopes for one session keep FIFO while
//! independent sessions proceed concurrently.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::{trace, warn};

use cardlink_core::event::ReaderEvent;
use cardlink_core::{Action, Error, MessageEnvelope, SessionId, SessionRegistry};

use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::node::ServerNode;

/// Endpoint contract implemented by the host application
#[async_trait]
pub trait AsyncEndpointServer: Send + Sync {
    /// Push one envelope to the client over its session channel
    async fn send_message(&self, message: MessageEnvelope) -> Result<(), Error>;
}

/// Server node over a persistent duplex transport
#[allow(missing_debug_implementations)]
pub struct AsyncNodeServer {
    node: ServerNode,
    endpoint: Arc<dyn AsyncEndpointServer>,
}

impl AsyncNodeServer {
    /// Create a duplex server node over the given context and endpoint
    pub fn new(
        context: Arc<ServerContext>,
        endpoint: Arc<dyn AsyncEndpointServer>,
        config: ServerConfig,
    ) -> Self {
        Self {
            node: ServerNode::new(context, config),
            endpoint,
        }
    }

    /// The session registry backing this node
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.node.registry()
    }

    /// A client opened the channel for a session
    ///
    /// Creates the registry entry; both sides treat this as the session
    /// entering OPEN. A duplicate session id fails.
    pub fn on_open(&self, session_id: &SessionId) -> Result<(), Error> {
        trace!(session = %session_id, "channel opened");
        self.node.registry().open(session_id)?;
        self.node.registry().bind_channel(session_id)
    }

    /// An envelope arrived from a client
    ///
    /// Routing is by the session id embedded in the envelope, never by the
    /// physical channel it arrived on.
    pub fn on_message(&self, envelope: MessageEnvelope) -> Result<(), Error> {
        match envelope.action() {
            Action::Execute => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.node.start_session(envelope, tx, false)?;
                self.spawn_forwarder(rx);
                Ok(())
            }
            Action::Response => self.node.deliver(envelope),
            action => Err(Error::protocol(format!(
                "unexpected {action} message on duplex binding"
            ))),
        }
    }

    /// The channel for a session closed; release it and fail any in-flight
    /// operation
    pub fn on_close(&self, session_id: &SessionId) {
        trace!(session = %session_id, "channel closed");
        self.node.registry().close(session_id);
    }

    /// The channel for a session failed; release it and fail any in-flight
    /// operation
    pub fn on_error(&self, session_id: &SessionId, message: &str) {
        warn!(session = %session_id, message, "channel error");
        self.node.registry().fail(session_id);
    }

    /// Push a reader event to every live session bound to `reader_name`
    pub async fn push_reader_event(
        &self,
        reader_name: &str,
        event: &ReaderEvent,
    ) -> Result<(), Error> {
        for session_id in self.node.registry().sessions_for_reader(reader_name) {
            let client_node_id = self
                .node
                .registry()
                .lookup(&session_id)
                .and_then(|info| info.client_node_id)
                .unwrap_or_default();
            let envelope =
                MessageEnvelope::new(session_id, client_node_id, Action::ReaderEvent)
                    .with_target_reader(reader_name)
                    .with_json_body(event)?;
            self.endpoint.send_message(envelope).await?;
        }
        Ok(())
    }

    fn spawn_forwarder(&self, mut outbound: mpsc::UnboundedReceiver<MessageEnvelope>) {
        let endpoint = Arc::clone(&self.endpoint);
        tokio::spawn(async move {
            while let Some(envelope) = outbound.recv().await {
                if let Err(e) = endpoint.send_message(envelope).await {
                    warn!(error = %e, "push failed, dropping session stream");
                    break;
                }
            }
        });
    }
}
