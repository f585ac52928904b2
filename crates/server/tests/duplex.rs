//! End-to-end scenarios over the persistent duplex binding

mod common;

use std::sync::{Arc, OnceLock};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde_json::json;
use tokio::sync::mpsc;

use cardlink_client::{AsyncClientHandler, AsyncEndpointClient, ClientNode, RemotePlugin};
use cardlink_core::event::ReaderEvent;
use cardlink_core::{
    Action, ClientAnswer, Error, MessageEnvelope, OperationRequest, ReaderCommand,
    SelectionScenario, SessionId,
};
use cardlink_server::{AsyncNodeServer, ServerConfig};

use common::{SERIAL_NUMBER, build_context, client_config, connect_duplex, LoopbackServerEndpoint};

#[tokio::test]
async fn selection_scenario_round_trip() {
    let (node, server) = connect_duplex(build_context());
    let plugin = RemotePlugin::new("stubPlugin", Arc::clone(&node));
    let reader = plugin.reader("readerA");

    reader.prepare_selection(SelectionScenario::new(json!({"aid": "315449432E494341"})));
    let selection = reader.process_selection_scenario().await.unwrap();

    assert!(selection.matched);
    assert_eq!(selection.smart_card.unwrap()["serialNumber"], SERIAL_NUMBER);
    assert!(node.registry().is_empty());
    assert!(server.registry().is_empty());
}

#[tokio::test]
async fn multi_turn_command_streaming_over_the_channel() {
    let (node, server) = connect_duplex(build_context());
    let plugin = RemotePlugin::new("stubPlugin", Arc::clone(&node));
    let reader = plugin.reader("readerA");

    reader.prepare_commands(vec![ReaderCommand::new("00B2013C00")]);
    reader.prepare_commands(vec![ReaderCommand::new("00B2014400")]);

    let responses = reader.transmit_commands().await.unwrap();
    let hex: Vec<&str> = responses.iter().map(|r| r.as_hex()).collect();
    assert_eq!(hex, vec!["9000", "AA9000"]);

    assert!(node.registry().is_empty());
    assert!(server.registry().is_empty());
}

#[tokio::test]
async fn pool_flow_over_the_channel() {
    let (node, _server) = connect_duplex(build_context());
    let plugin = RemotePlugin::new("poolPlugin", Arc::clone(&node));

    let reader = plugin.allocate_reader("G1").await.unwrap();
    assert!(reader.is_card_present().await.unwrap());
    plugin.release_reader(reader).await.unwrap();
}

/// Endpoint whose server vanishes right after receiving the request
struct VanishingEndpoint {
    handler: OnceLock<AsyncClientHandler>,
}

#[async_trait]
impl AsyncEndpointClient for VanishingEndpoint {
    async fn open_session(&self, session_id: &SessionId) -> Result<(), Error> {
        self.handler.get().unwrap().on_open(session_id);
        Ok(())
    }

    async fn send_message(&self, message: MessageEnvelope) -> Result<(), Error> {
        // The remote side drops the channel before any reply.
        self.handler
            .get()
            .unwrap()
            .on_error(message.session_id(), "connection reset by peer");
        Ok(())
    }

    async fn close_session(&self, _session_id: &SessionId) -> Result<(), Error> {
        Ok(())
    }
}

#[tokio::test]
async fn channel_loss_unblocks_the_caller_within_the_timeout() {
    let endpoint = Arc::new(VanishingEndpoint {
        handler: OnceLock::new(),
    });
    let node = Arc::new(ClientNode::duplex(
        Arc::clone(&endpoint) as Arc<dyn AsyncEndpointClient>,
        client_config(),
    ));
    endpoint.handler.set(node.handler()).ok().unwrap();

    let plugin = RemotePlugin::new("stubPlugin", Arc::clone(&node));
    let started = Instant::now();
    let err = plugin.reader("readerA").is_card_present().await.unwrap_err();

    assert!(matches!(err, Error::Transport(_)));
    // Unblocked by the close notification, well before the safety timeout.
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(node.registry().is_empty());
}

#[tokio::test]
async fn duplicate_open_is_rejected() {
    let (_node, server) = connect_duplex(build_context());
    let session_id = SessionId::from("dup-session");
    server.on_open(&session_id).unwrap();
    assert_eq!(
        server.on_open(&session_id).unwrap_err(),
        Error::DuplicateSession(session_id)
    );
}

#[tokio::test]
async fn execute_without_open_channel_fails() {
    let (_node, server) = connect_duplex(build_context());
    let envelope = MessageEnvelope::new(SessionId::from("no-open"), "test-client", Action::Execute)
        .with_target_plugin("stubPlugin")
        .with_json_body(&OperationRequest::IsCardPresent)
        .unwrap();
    assert!(matches!(
        server.on_message(envelope),
        Err(Error::ChannelNotOpen(_))
    ));
}

#[tokio::test]
async fn reader_events_reach_sessions_bound_to_the_reader() {
    // Drive the server node directly so the push happens at a known point:
    // while the session task is parked on a CMD awaiting the next batch.
    let (to_client, mut from_server) = mpsc::unbounded_channel();
    let endpoint = Arc::new(LoopbackServerEndpoint::new(to_client));
    let server = AsyncNodeServer::new(build_context(), endpoint, ServerConfig::default());

    let session_id = SessionId::from("event-session");
    server.on_open(&session_id).unwrap();
    let execute = MessageEnvelope::new(session_id.clone(), "test-client", Action::Execute)
        .with_target_plugin("stubPlugin")
        .with_target_reader("readerA")
        .with_json_body(&OperationRequest::TransmitCommands {
            commands: vec![],
            has_more: true,
        })
        .unwrap();
    server.on_message(execute).unwrap();

    // The task asks for the next batch.
    let common::Wire::Message(query) = from_server.recv().await.unwrap() else {
        panic!("expected a CMD envelope");
    };
    assert_eq!(query.action(), Action::Command);

    // A card shows up while the session is in flight.
    server
        .push_reader_event(
            "readerA",
            &ReaderEvent::CardInserted {
                reader: "readerA".into(),
            },
        )
        .await
        .unwrap();
    let common::Wire::Message(event) = from_server.recv().await.unwrap() else {
        panic!("expected a READER_EVENT envelope");
    };
    assert_eq!(event.action(), Action::ReaderEvent);
    assert_eq!(
        event.body_as::<ReaderEvent>().unwrap(),
        ReaderEvent::CardInserted {
            reader: "readerA".into()
        }
    );

    // Sessions bound to other readers are not notified.
    server
        .push_reader_event(
            "readerB",
            &ReaderEvent::CardRemoved {
                reader: "readerB".into(),
            },
        )
        .await
        .unwrap();

    // Finish the exchange: empty final batch, then the terminal envelope.
    let answer = query
        .reply(Action::Response)
        .with_json_body(&ClientAnswer::Commands {
            commands: vec![],
            has_more: false,
        })
        .unwrap();
    server.on_message(answer).unwrap();

    let common::Wire::Message(terminal) = from_server.recv().await.unwrap() else {
        panic!("expected the terminal envelope");
    };
    assert_eq!(terminal.action(), Action::Terminate);
    assert!(server.registry().is_empty());
}
