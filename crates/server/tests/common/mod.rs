//! In-memory loopback endpoints wiring a client node to a server node
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use cardlink_client::{
    AsyncClientBinding, AsyncEndpointClient, ClientConfig, ClientNode, SyncClientBinding,
    SyncEndpointClient,
};
use cardlink_core::{Error, MessageEnvelope, SelectionResult, SessionId};
use cardlink_core::stub::StubReader;
use cardlink_server::{
    AsyncEndpointServer, AsyncNodeServer, ReaderPool, ServerConfig, ServerContext, StubPlugin,
    SyncNodeServer,
};

/// Serial number used by the selection scenario fixtures
pub const SERIAL_NUMBER: &str = "0000000011223344";

/// A stub reader with a matched card and a small simulated command table
pub fn stub_reader(name: &str) -> StubReader {
    StubReader::new(name)
        .with_card_present(true)
        .with_selection_result(SelectionResult::matched(serde_json::json!({
            "serialNumber": SERIAL_NUMBER,
        })))
        .with_simulated_command("00B2013C00", "9000")
        .with_simulated_command("00B2014400", "AA9000")
        .with_simulated_command("00B201F400", "BB9000")
}

/// Context with one registered plugin, one pool and one echo service
pub fn build_context() -> Arc<ServerContext> {
    let plugin = StubPlugin::new("stubPlugin").with_reader(Arc::new(stub_reader("readerA")));
    let pool = ReaderPool::new().with_reader("G1", Arc::new(stub_reader("poolReaderA")));
    ServerContext::builder()
        .register_plugin(Arc::new(plugin))
        .register_pool("poolPlugin", Arc::new(pool))
        .register_service(
            "ECHO_USER",
            Arc::new(
                |_reader: &dyn cardlink_core::CardReader,
                 input: Option<&serde_json::Value>|
                 -> Result<serde_json::Value, Error> {
                    Ok(serde_json::json!({
                        "userId": input.and_then(|v| v.get("userId")).cloned(),
                        "successful": true,
                    }))
                },
            ),
        )
        .build()
}

/// Client configuration with test-sized timeouts
pub fn client_config() -> ClientConfig {
    ClientConfig::default()
        .with_node_id("test-client")
        .with_request_timeout(Duration::from_secs(2))
        .with_open_timeout(Duration::from_secs(2))
}

// ---------------------------------------------------------------------------
// Sync loopback
// ---------------------------------------------------------------------------

/// Calls the server node directly instead of going through HTTP
pub struct LoopbackSyncEndpoint {
    server: Arc<SyncNodeServer>,
}

impl LoopbackSyncEndpoint {
    pub fn new(server: Arc<SyncNodeServer>) -> Self {
        Self { server }
    }
}

#[async_trait]
impl SyncEndpointClient for LoopbackSyncEndpoint {
    async fn send_request(&self, message: MessageEnvelope) -> Result<Vec<MessageEnvelope>, Error> {
        // Round trip through the wire form, as a real endpoint would.
        let message = MessageEnvelope::from_json(&message.to_json()?)?;
        self.server.on_request(message).await
    }
}

/// A connected sync client/server pair over the given context
pub fn connect_sync(
    context: Arc<ServerContext>,
) -> (Arc<ClientNode<SyncClientBinding>>, Arc<SyncNodeServer>) {
    let server = Arc::new(SyncNodeServer::new(context, ServerConfig::default()));
    let endpoint = Arc::new(LoopbackSyncEndpoint::new(Arc::clone(&server)));
    let node = Arc::new(ClientNode::sync(endpoint, client_config()));
    (node, server)
}

// ---------------------------------------------------------------------------
// Duplex loopback
// ---------------------------------------------------------------------------

/// Frames exchanged by the in-memory duplex link
pub enum Wire {
    /// Client asks to open the channel for a session
    Open(SessionId),
    /// Server accepted the channel
    Opened(SessionId),
    /// One protocol envelope
    Message(MessageEnvelope),
    /// Either side closed the channel
    Close(SessionId),
}

/// Client endpoint pushing frames onto the in-memory link
pub struct LoopbackClientEndpoint {
    to_server: mpsc::UnboundedSender<Wire>,
}

#[async_trait]
impl AsyncEndpointClient for LoopbackClientEndpoint {
    async fn open_session(&self, session_id: &SessionId) -> Result<(), Error> {
        self.to_server
            .send(Wire::Open(session_id.clone()))
            .map_err(|_| Error::transport("server link down"))
    }

    async fn send_message(&self, message: MessageEnvelope) -> Result<(), Error> {
        let message = MessageEnvelope::from_json(&message.to_json()?)?;
        self.to_server
            .send(Wire::Message(message))
            .map_err(|_| Error::transport("server link down"))
    }

    async fn close_session(&self, session_id: &SessionId) -> Result<(), Error> {
        self.to_server
            .send(Wire::Close(session_id.clone()))
            .map_err(|_| Error::transport("server link down"))
    }
}

/// Server endpoint pushing frames onto the in-memory link
pub struct LoopbackServerEndpoint {
    to_client: mpsc::UnboundedSender<Wire>,
}

impl LoopbackServerEndpoint {
    /// Create an endpoint sending into `to_client`
    pub fn new(to_client: mpsc::UnboundedSender<Wire>) -> Self {
        Self { to_client }
    }
}

#[async_trait]
impl AsyncEndpointServer for LoopbackServerEndpoint {
    async fn send_message(&self, message: MessageEnvelope) -> Result<(), Error> {
        let message = MessageEnvelope::from_json(&message.to_json()?)?;
        self.to_client
            .send(Wire::Message(message))
            .map_err(|_| Error::transport("client link down"))
    }
}

/// A connected duplex client/server pair over the given context
///
/// Spawns one pump task per direction, mimicking a websocket container: the
/// server answers `Open` with `Opened`, and each side's handler surface is
/// fed from its pump.
pub fn connect_duplex(
    context: Arc<ServerContext>,
) -> (Arc<ClientNode<AsyncClientBinding>>, Arc<AsyncNodeServer>) {
    let (to_server, mut from_clients) = mpsc::unbounded_channel();
    let (to_client, mut from_servers) = mpsc::unbounded_channel();

    let client_endpoint = Arc::new(LoopbackClientEndpoint { to_server });
    let server_endpoint = Arc::new(LoopbackServerEndpoint::new(to_client.clone()));

    let node = Arc::new(ClientNode::duplex(client_endpoint, client_config()));
    let server = Arc::new(AsyncNodeServer::new(
        context,
        server_endpoint,
        ServerConfig::default(),
    ));

    let server_pump = Arc::clone(&server);
    tokio::spawn(async move {
        while let Some(wire) = from_clients.recv().await {
            match wire {
                Wire::Open(session_id) => {
                    if server_pump.on_open(&session_id).is_ok() {
                        let _ = to_client.send(Wire::Opened(session_id));
                    }
                }
                Wire::Message(envelope) => {
                    let _ = server_pump.on_message(envelope);
                }
                Wire::Close(session_id) => server_pump.on_close(&session_id),
                Wire::Opened(_) => {}
            }
        }
    });

    let handler = node.handler();
    tokio::spawn(async move {
        while let Some(wire) = from_servers.recv().await {
            match wire {
                Wire::Opened(session_id) => handler.on_open(&session_id),
                Wire::Message(envelope) => handler.on_message(envelope),
                Wire::Close(session_id) => handler.on_close(&session_id),
                Wire::Open(_) => {}
            }
        }
    });

    (node, server)
}
