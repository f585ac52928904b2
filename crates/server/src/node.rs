//! Server protocol engine
//!
//! Each session runs as its own task: it parses the `EXECUTE` body, resolves
//! the target reader through the context's plugin table, executes the
//! operation against the real reader and finishes with exactly one terminal
//! envelope. Mid-operation it can pull further command batches from the
//! client with `CMD`/`RESP` exchanges, identically over both bindings. The
//! registry entry is released on every path.
//!
//! Must run inside a tokio runtime; the bindings spawn one task per session.

use std::sync::Arc;

use serde_json::json;
use tokio::sync::mpsc;
use tokio::time::timeout;
use tracing::{debug, error, trace};

use cardlink_core::{
    Action, CardReader, ClientAnswer, Error, ErrorKind, MessageEnvelope, OperationRequest,
    OperationResult, RemoteError, ServerQuery, SessionRegistry,
};

use crate::config::ServerConfig;
use crate::context::{PluginEntry, ServerContext};

/// Server-side protocol node shared by both bindings
#[allow(missing_debug_implementations)]
pub struct ServerNode {
    context: Arc<ServerContext>,
    registry: Arc<SessionRegistry>,
    config: ServerConfig,
}

impl ServerNode {
    /// Create a node over the given context
    pub fn new(context: Arc<ServerContext>, config: ServerConfig) -> Self {
        debug!(node = %config.node_id, "server node created");
        Self {
            context,
            registry: Arc::new(SessionRegistry::new()),
            config,
        }
    }

    /// The session registry backing this node
    pub fn registry(&self) -> &Arc<SessionRegistry> {
        &self.registry
    }

    /// Start the operation task for an `EXECUTE` envelope
    ///
    /// With `open` set the session is created here and a duplicate id fails
    /// with [`Error::DuplicateSession`] (sync binding); otherwise the session
    /// must have been created by the channel-open handshake already.
    /// Outbound envelopes of the task are pushed onto `outbound`.
    pub(crate) fn start_session(
        &self,
        envelope: MessageEnvelope,
        outbound: mpsc::UnboundedSender<MessageEnvelope>,
        open: bool,
    ) -> Result<(), Error> {
        let session_id = envelope.session_id().clone();
        if open {
            self.registry.open(&session_id)?;
        } else if !self.registry.contains(&session_id) {
            return Err(Error::ChannelNotOpen(session_id));
        }
        self.registry
            .set_client_node(&session_id, envelope.client_node_id())?;
        if let Some(reader) = envelope.target_reader_name() {
            self.registry.set_reader(&session_id, reader)?;
        }

        debug!(
            session = %session_id,
            plugin = envelope.target_plugin_name().unwrap_or("-"),
            "session task starting"
        );
        let context = Arc::clone(&self.context);
        let registry = Arc::clone(&self.registry);
        let config = self.config.clone();
        tokio::spawn(run_operation(context, registry, config, envelope, outbound));
        Ok(())
    }

    /// Deliver a client `RESP` envelope to its session task
    pub(crate) fn deliver(&self, envelope: MessageEnvelope) -> Result<(), Error> {
        self.registry.deliver(envelope)
    }
}

/// Run one session's operation to its terminal envelope
async fn run_operation(
    context: Arc<ServerContext>,
    registry: Arc<SessionRegistry>,
    config: ServerConfig,
    first: MessageEnvelope,
    outbound: mpsc::UnboundedSender<MessageEnvelope>,
) {
    let session_id = first.session_id().clone();
    let outcome = execute_operation(&context, &registry, &config, &first, &outbound).await;

    let terminal = match outcome {
        Ok(result) => first.reply(Action::Terminate).with_json_body(&result),
        Err(e) => {
            debug!(session = %session_id, error = %e, "operation failed");
            first
                .reply(Action::Error)
                .with_json_body(&RemoteError::from(&e))
        }
    };
    match terminal {
        Ok(envelope) => {
            if outbound.send(envelope).is_err() {
                debug!(session = %session_id, "binding gone before terminal envelope");
            }
        }
        Err(e) => error!(session = %session_id, error = %e, "terminal envelope lost"),
    }
    // Idempotent: the channel close path may already have released the entry.
    registry.close(&session_id);
}

async fn execute_operation(
    context: &ServerContext,
    registry: &SessionRegistry,
    config: &ServerConfig,
    first: &MessageEnvelope,
    outbound: &mpsc::UnboundedSender<MessageEnvelope>,
) -> Result<OperationResult, Error> {
    let request: OperationRequest = first.body_as()?;
    let plugin_name = first
        .target_plugin_name()
        .ok_or_else(|| Error::protocol("missing target plugin"))?;
    let entry = context
        .plugin(plugin_name)
        .ok_or_else(|| Error::protocol(format!("unknown plugin {plugin_name}")))?;

    match request {
        OperationRequest::GroupReferences => {
            let pool = require_pool(entry, plugin_name)?;
            Ok(OperationResult::success(Some(json!(
                pool.group_references()
            ))))
        }
        OperationRequest::AllocateReader { group_reference } => {
            let pool = require_pool(entry, plugin_name)?;
            let reader = pool.allocate(&group_reference)?;
            registry.set_reader(first.session_id(), reader.name())?;
            Ok(OperationResult::success(Some(
                json!({ "readerName": reader.name() }),
            )))
        }
        OperationRequest::ReleaseReader { reader_name } => {
            let pool = require_pool(entry, plugin_name)?;
            pool.release(&reader_name);
            Ok(OperationResult::success(None))
        }
        OperationRequest::IsCardPresent => {
            let reader = resolve_reader(entry, first)?;
            Ok(OperationResult::success(Some(json!(
                reader.is_card_present()?
            ))))
        }
        OperationRequest::ProcessSelection { scenario } => {
            let reader = resolve_reader(entry, first)?;
            let result = reader.process_selection(&scenario)?;
            Ok(OperationResult::success(Some(serde_json::to_value(result)
                .map_err(|e| Error::protocol(format!("selection result encoding: {e}")))?)))
        }
        OperationRequest::TransmitCommands { commands, has_more } => {
            let reader = resolve_reader(entry, first)?;
            let mut responses = reader.transmit_all(&commands)?;
            let mut more = has_more;
            while more {
                let ClientAnswer::Commands { commands, has_more } =
                    ask_next_commands(registry, config, first, outbound).await?;
                responses.extend(reader.transmit_all(&commands)?);
                more = has_more;
            }
            Ok(OperationResult::success(Some(json!(responses))))
        }
        OperationRequest::ExecuteService { service_id, input } => {
            let reader = resolve_reader(entry, first)?;
            Ok(context
                .dispatcher()
                .dispatch(&service_id, reader.as_ref(), input))
        }
    }
}

fn require_pool<'a>(
    entry: &'a PluginEntry,
    plugin_name: &str,
) -> Result<&'a crate::pool::ReaderPool, Error> {
    match entry {
        PluginEntry::Pooled(pool) => Ok(pool),
        PluginEntry::Registered(_) => Err(Error::protocol(format!(
            "plugin {plugin_name} is not pool-backed"
        ))),
    }
}

fn resolve_reader(
    entry: &PluginEntry,
    envelope: &MessageEnvelope,
) -> Result<Arc<dyn CardReader>, Error> {
    let name = envelope
        .target_reader_name()
        .ok_or_else(|| Error::protocol("missing target reader"))?;
    entry
        .reader(name)
        .ok_or_else(|| Error::protocol(format!("unknown reader {name}")))
}

/// Ask the client for its next command batch and await the answer
async fn ask_next_commands(
    registry: &SessionRegistry,
    config: &ServerConfig,
    first: &MessageEnvelope,
    outbound: &mpsc::UnboundedSender<MessageEnvelope>,
) -> Result<ClientAnswer, Error> {
    let session_id = first.session_id();
    let answer = registry.next_message(session_id)?;
    let query = first
        .reply(Action::Command)
        .with_json_body(&ServerQuery::NextCommands)?;
    trace!(session = %session_id, "requesting next command batch");
    outbound
        .send(query)
        .map_err(|_| Error::transport("binding gone while querying the client"))?;

    match timeout(config.answer_timeout, answer).await {
        Ok(Ok(envelope)) => {
            if envelope.action() != Action::Response {
                return Err(Error::protocol(format!(
                    "expected RESP, received {}",
                    envelope.action()
                )));
            }
            envelope.body_as()
        }
        Ok(Err(_)) => Err(Error::transport(format!(
            "session {session_id} closed while awaiting the client answer"
        ))),
        Err(_) => Err(Error::RemoteExecution {
            kind: ErrorKind::Timeout,
            message: format!(
                "no client answer for session {session_id} within {:?}",
                config.answer_timeout
            ),
        }),
    }
}
