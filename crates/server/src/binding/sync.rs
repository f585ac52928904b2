//! Request/response server binding
//!
//! The HTTP-style call is the unit of delivery: each request envelope is fed
//! to the node, and every envelope the session task wants to send back is
//! collected into the response list. When the task needs a client answer
//! mid-operation it emits a `CMD` envelope; the outbound stream is then
//! parked until the next request carries the `RESP`.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tracing::trace;

use cardlink_core::{Action, Error, MessageEnvelope, SessionId, SessionRegistry};

use crate::config::ServerConfig;
use crate::context::ServerContext;
use crate::node::ServerNode;

/// Server node over a request/response transport
#[allow(missing_debug_implementations)]
pub struct SyncNodeServer {
    node: ServerNode,
    parked: Mutex<HashMap<SessionId, mpsc::UnboundedReceiver<MessageEnvelope>>>,
}

impl SyncNodeServer {
    /// Create a sync server node over the given context
    pub fn new(context: Arc<ServerContext>, config: ServerConfig) -> Self {
        Self {
            node: ServerNode::new(context, config),
            parked: Mutex::new(HashMap::new()),
        }
    }

    /// The session registry backing this node
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        self.node.registry()
    }

    /// Process one request envelope and collect the response envelopes
    ///
    /// An `EXECUTE` creates the session (duplicate ids fail, this binding
    /// guarantees unique session creation per conversation); a `RESP` resumes
    /// a parked session. The returned list ends with either a terminal
    /// envelope or a `CMD` the caller must answer with its next request.
    pub async fn on_request(
        &self,
        envelope: MessageEnvelope,
    ) -> Result<Vec<MessageEnvelope>, Error> {
        self.prune_parked();
        let session_id = envelope.session_id().clone();
        let mut outbound = match envelope.action() {
            Action::Execute => {
                let (tx, rx) = mpsc::unbounded_channel();
                self.node.start_session(envelope, tx, true)?;
                rx
            }
            Action::Response => {
                let rx = self
                    .parked
                    .lock()
                    .remove(&session_id)
                    .ok_or_else(|| Error::SessionNotFound(session_id.clone()))?;
                self.node.deliver(envelope)?;
                rx
            }
            action => {
                return Err(Error::protocol(format!(
                    "unexpected {action} request on sync binding"
                )));
            }
        };

        let mut replies = Vec::new();
        loop {
            match outbound.recv().await {
                Some(envelope) => {
                    let action = envelope.action();
                    trace!(session = %session_id, %action, "collecting response envelope");
                    replies.push(envelope);
                    if action == Action::Command {
                        // The client must answer before the task can continue.
                        self.parked.lock().insert(session_id.clone(), outbound);
                        break;
                    }
                    if action.is_terminal() {
                        break;
                    }
                }
                None => {
                    if replies.is_empty() {
                        return Err(Error::transport(format!(
                            "session {session_id} ended without a reply"
                        )));
                    }
                    break;
                }
            }
        }
        Ok(replies)
    }

    /// Drop parked streams whose session is no longer live
    ///
    /// A client that never answers a `CMD` leaves its stream behind once the
    /// session task times out and releases the registry entry.
    fn prune_parked(&self) {
        let registry = self.node.registry();
        self.parked.lock().retain(|id, _| registry.contains(id));
    }
}
