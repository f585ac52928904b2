//! In-process loopback demo: a client node drives a pooled stub reader
//! through the sync binding.
//!
//! ```bash
//! cargo run --example loopback
//! ```

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::json;

use cardlink_client::{ClientConfig, ClientNode, RemotePlugin, SyncEndpointClient};
use cardlink_core::stub::StubReader;
use cardlink_core::{CardReader, Error, MessageEnvelope, SelectionResult, SelectionScenario};
use cardlink_server::{ReaderPool, ServerConfig, ServerContext, SyncNodeServer};

struct LoopbackEndpoint {
    server: Arc<SyncNodeServer>,
}

#[async_trait]
impl SyncEndpointClient for LoopbackEndpoint {
    async fn send_request(&self, message: MessageEnvelope) -> Result<Vec<MessageEnvelope>, Error> {
        self.server.on_request(message).await
    }
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(
            |_| tracing_subscriber::EnvFilter::new("info,cardlink_core=trace,cardlink_server=debug"),
        ))
        .init();

    // Server side: one pooled stub reader with an inserted card.
    let reader = StubReader::new("stubReader")
        .with_card_present(true)
        .with_selection_result(SelectionResult::matched(json!({
            "serialNumber": "0000000011223344",
        })))
        .with_simulated_command("00B2013C00", "9000");
    let pool = Arc::new(ReaderPool::new().with_reader("group1", Arc::new(reader)));
    let context = ServerContext::builder()
        .register_pool("poolPlugin", Arc::clone(&pool))
        .register_service(
            "READ_EVENT_LOG",
            Arc::new(
                |reader: &dyn CardReader,
                 input: Option<&serde_json::Value>|
                 -> Result<serde_json::Value, Error> {
                    let log = reader.transmit(&cardlink_core::ReaderCommand::new("00B2013C00"))?;
                    Ok(json!({
                        "userId": input.and_then(|v| v.get("userId")).cloned(),
                        "eventLog": log.as_hex(),
                    }))
                },
            ),
        )
        .build();
    let server = Arc::new(SyncNodeServer::new(context, ServerConfig::default()));

    // Client side: a remote pool plugin over the loopback endpoint.
    let endpoint = Arc::new(LoopbackEndpoint {
        server: Arc::clone(&server),
    });
    let node = Arc::new(ClientNode::sync(endpoint, ClientConfig::default()));
    let plugin = RemotePlugin::new("poolPlugin", node);

    // Allocate a reader, run a transaction, release the reader.
    let groups = plugin.group_references().await?;
    println!("group references: {groups:?}");

    let remote_reader = plugin
        .allocate_reader(groups.first().cloned().unwrap_or_default())
        .await?;
    println!("allocated reader: {}", remote_reader.name());

    remote_reader.prepare_selection(SelectionScenario::new(json!({"aid": "AABBCCDDEE"})));
    let selection = remote_reader.process_selection_scenario().await?;
    println!("selection matched: {}", selection.matched);

    let result = remote_reader
        .execute_remote_service("READ_EVENT_LOG", Some(json!({"userId": "alice"})))
        .await?;
    println!("service output: {:?}", result.output);

    plugin.release_reader(remote_reader).await?;
    println!("reader released");
    Ok(())
}
