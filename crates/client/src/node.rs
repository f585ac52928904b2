//! Client protocol engine
//!
//! One engine drives both bindings: a logical call becomes an `EXECUTE`
//! envelope, mid-operation `CMD` queries are answered from the request's
//! pending command batches, and the call resolves on the single terminal
//! `TERMINATE` or `ERROR` envelope. Every exit path releases the binding
//! resource and the registry entry.

use std::collections::VecDeque;
use std::sync::Arc;

use tracing::{debug, trace};

use cardlink_core::event::channel::{ReaderEventReceiver, ReaderEventSender, reader_event_channel};
use cardlink_core::event::ReaderEvent;
use cardlink_core::{
    Action, ClientAnswer, Error, MessageEnvelope, OperationRequest, OperationResult, ReaderCommand,
    RemoteError, ServerQuery, SessionId, SessionRegistry,
};

use crate::binding::{
    AsyncClientBinding, AsyncClientHandler, AsyncEndpointClient, ClientBinding, SyncClientBinding,
    SyncEndpointClient,
};
use crate::config::ClientConfig;

/// One logical remote operation to run
#[derive(Debug, Clone)]
pub struct RemoteRequest {
    /// Plugin the target reader belongs to
    pub plugin_name: String,
    /// Target reader, when the operation addresses one
    pub reader_name: Option<String>,
    /// The operation to execute
    pub operation: OperationRequest,
    /// Further command batches, pulled by the server via `CMD` queries
    pub pending_batches: VecDeque<Vec<ReaderCommand>>,
}

impl RemoteRequest {
    /// Create a request against a plugin
    pub fn new(plugin_name: impl Into<String>, operation: OperationRequest) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            reader_name: None,
            operation,
            pending_batches: VecDeque::new(),
        }
    }

    /// Address a specific reader
    pub fn with_reader(mut self, reader_name: impl Into<String>) -> Self {
        self.reader_name = Some(reader_name.into());
        self
    }

    /// Queue command batches for multi-turn streaming
    pub fn with_pending_batches(mut self, batches: VecDeque<Vec<ReaderCommand>>) -> Self {
        self.pending_batches = batches;
        self
    }
}

/// Client-side protocol node
///
/// Construct with [`ClientNode::sync`] or [`ClientNode::duplex`] depending on
/// the transport binding; the engine behaves identically over both.
#[allow(missing_debug_implementations)]
pub struct ClientNode<B: ClientBinding> {
    binding: B,
    registry: Arc<SessionRegistry>,
    config: ClientConfig,
    reader_events_tx: ReaderEventSender,
    reader_events_rx: ReaderEventReceiver,
}

impl ClientNode<SyncClientBinding> {
    /// Create a node over a request/response endpoint
    pub fn sync(endpoint: Arc<dyn SyncEndpointClient>, config: ClientConfig) -> Self {
        let (reader_events_tx, reader_events_rx) = reader_event_channel();
        Self {
            binding: SyncClientBinding::new(endpoint),
            registry: Arc::new(SessionRegistry::new()),
            config,
            reader_events_tx,
            reader_events_rx,
        }
    }
}

impl ClientNode<AsyncClientBinding> {
    /// Create a node over a persistent duplex endpoint
    pub fn duplex(endpoint: Arc<dyn AsyncEndpointClient>, config: ClientConfig) -> Self {
        let (reader_events_tx, reader_events_rx) = reader_event_channel();
        let registry = Arc::new(SessionRegistry::new());
        let binding = AsyncClientBinding::new(
            endpoint,
            Arc::clone(&registry),
            config.open_timeout,
            config.request_timeout,
        );
        Self {
            binding,
            registry,
            config,
            reader_events_tx,
            reader_events_rx,
        }
    }

    /// The inbound surface the host endpoint forwards transport events to
    pub fn handler(&self) -> AsyncClientHandler {
        AsyncClientHandler::new(Arc::clone(&self.registry), self.reader_events_tx.clone())
    }
}

impl<B: ClientBinding> ClientNode<B> {
    /// Reader events pushed by the server
    pub fn reader_events(&self) -> ReaderEventReceiver {
        self.reader_events_rx.clone()
    }

    /// The session registry backing this node
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Run one remote operation and return its terminal outcome
    ///
    /// Allocates a fresh session id, so the client observes exactly one
    /// terminal outcome per call. The registry entry is released on every
    /// exit path, including transport failures.
    pub async fn execute(&self, request: RemoteRequest) -> Result<OperationResult, Error> {
        let session_id = SessionId::generate();
        self.registry.open(&session_id)?;
        debug!(
            session = %session_id,
            plugin = %request.plugin_name,
            reader = request.reader_name.as_deref().unwrap_or("-"),
            "executing remote operation"
        );
        let result = self.run(&session_id, request).await;
        self.binding.close(&session_id).await;
        match &result {
            Ok(_) => {
                self.registry.close(&session_id);
            }
            Err(e) => {
                debug!(session = %session_id, error = %e, "remote operation failed");
                self.registry.fail(&session_id);
            }
        }
        result
    }

    async fn run(
        &self,
        session_id: &SessionId,
        request: RemoteRequest,
    ) -> Result<OperationResult, Error> {
        self.binding.open(session_id).await?;
        if let Some(reader) = &request.reader_name {
            self.registry.set_reader(session_id, reader)?;
        }

        let mut envelope =
            MessageEnvelope::new(session_id.clone(), &self.config.node_id, Action::Execute)
                .with_target_plugin(&request.plugin_name);
        if let Some(reader) = &request.reader_name {
            envelope = envelope.with_target_reader(reader);
        }
        let mut outbound = Some(envelope.with_json_body(&request.operation)?);
        let mut batches = request.pending_batches;

        loop {
            let inbound = self.binding.exchange(session_id, outbound.take()).await?;
            trace!(session = %session_id, action = %inbound.action(), "envelope received");
            match inbound.action() {
                Action::Terminate => return inbound.body_as::<OperationResult>(),
                Action::Error => {
                    let remote: RemoteError = inbound.body_as()?;
                    return Err(remote.into_error());
                }
                Action::Command => {
                    let query: ServerQuery = inbound.body_as()?;
                    let answer = match query {
                        ServerQuery::NextCommands => {
                            let commands = batches.pop_front().unwrap_or_default();
                            ClientAnswer::Commands {
                                commands,
                                has_more: !batches.is_empty(),
                            }
                        }
                    };
                    outbound = Some(inbound.reply(Action::Response).with_json_body(&answer)?);
                }
                Action::ReaderEvent => {
                    // Sync binding delivers events inside the response list.
                    if let Ok(event) = inbound.body_as::<ReaderEvent>() {
                        let _ = self.reader_events_tx.send(event);
                    }
                }
                action => {
                    return Err(Error::protocol(format!(
                        "unexpected {action} envelope from server"
                    )));
                }
            }
        }
    }
}
