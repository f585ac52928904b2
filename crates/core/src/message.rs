//! Message envelope and wire codec
//!
//! The [`MessageEnvelope`] is the atomic protocol unit carried by both
//! transport bindings: an action, a session identifier, the originating
//! client node, an optional target reader/plugin and an opaque serialized
//! body. The codec is transport agnostic; the sync binding carries a JSON
//! array of envelopes per response, the duplex binding one envelope per
//! message.

use std::str::FromStr;

use derive_more::Display;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::session::SessionId;

/// Protocol actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
pub enum Action {
    /// Client opens a logical conversation carrying an operation request
    #[display("EXECUTE")]
    Execute,
    /// Server-to-client mid-operation query
    #[display("CMD")]
    Command,
    /// Client answer to a [`Action::Command`] query
    #[display("RESP")]
    Response,
    /// Server-to-client push notification
    #[display("READER_EVENT")]
    ReaderEvent,
    /// Terminal success reply carrying the operation result
    #[display("TERMINATE")]
    Terminate,
    /// Terminal failure reply carrying a remote error
    #[display("ERROR")]
    Error,
}

impl Action {
    /// Whether this action ends the logical conversation
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::Terminate | Self::Error)
    }
}

impl FromStr for Action {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "EXECUTE" => Ok(Self::Execute),
            "CMD" => Ok(Self::Command),
            "RESP" => Ok(Self::Response),
            "READER_EVENT" => Ok(Self::ReaderEvent),
            "TERMINATE" => Ok(Self::Terminate),
            "ERROR" => Ok(Self::Error),
            other => Err(Error::protocol(format!("unrecognized action: {other}"))),
        }
    }
}

/// Wire-level unit of the protocol
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEnvelope {
    session_id: SessionId,
    client_node_id: String,
    action: Action,
    target_reader_name: Option<String>,
    target_plugin_name: Option<String>,
    body: Option<String>,
}

impl MessageEnvelope {
    /// Create a new envelope for the given session and action
    pub fn new(session_id: SessionId, client_node_id: impl Into<String>, action: Action) -> Self {
        Self {
            session_id,
            client_node_id: client_node_id.into(),
            action,
            target_reader_name: None,
            target_plugin_name: None,
            body: None,
        }
    }

    /// Set the target reader name
    pub fn with_target_reader(mut self, name: impl Into<String>) -> Self {
        self.target_reader_name = Some(name.into());
        self
    }

    /// Set the target plugin name
    pub fn with_target_plugin(mut self, name: impl Into<String>) -> Self {
        self.target_plugin_name = Some(name.into());
        self
    }

    /// Set the raw serialized body
    pub fn with_body(mut self, body: impl Into<String>) -> Self {
        self.body = Some(body.into());
        self
    }

    /// Serialize `value` into the body
    pub fn with_json_body<T: Serialize>(self, value: &T) -> Result<Self, Error> {
        let body = serde_json::to_string(value)
            .map_err(|e| Error::protocol(format!("body serialization failed: {e}")))?;
        Ok(self.with_body(body))
    }

    /// The session this envelope belongs to
    pub const fn session_id(&self) -> &SessionId {
        &self.session_id
    }

    /// The client endpoint that initiated the session
    pub fn client_node_id(&self) -> &str {
        &self.client_node_id
    }

    /// The protocol action
    pub const fn action(&self) -> Action {
        self.action
    }

    /// The target reader name, if any
    pub fn target_reader_name(&self) -> Option<&str> {
        self.target_reader_name.as_deref()
    }

    /// The target plugin name, if any
    pub fn target_plugin_name(&self) -> Option<&str> {
        self.target_plugin_name.as_deref()
    }

    /// The raw body, if any
    pub fn body(&self) -> Option<&str> {
        self.body.as_deref()
    }

    /// Deserialize the body into `T`
    pub fn body_as<T: DeserializeOwned>(&self) -> Result<T, Error> {
        let body = self
            .body
            .as_deref()
            .ok_or_else(|| Error::protocol(format!("missing body in {} envelope", self.action)))?;
        serde_json::from_str(body)
            .map_err(|e| Error::protocol(format!("malformed {} body: {e}", self.action)))
    }

    /// Build a reply envelope for the same session, echoing the routing fields
    pub fn reply(&self, action: Action) -> Self {
        Self {
            session_id: self.session_id.clone(),
            client_node_id: self.client_node_id.clone(),
            action,
            target_reader_name: self.target_reader_name.clone(),
            target_plugin_name: self.target_plugin_name.clone(),
            body: None,
        }
    }

    /// Encode to the JSON wire form
    pub fn to_json(&self) -> Result<String, Error> {
        let wire = WireEnvelope {
            session_id: self.session_id.to_string(),
            client_node_id: self.client_node_id.clone(),
            action: self.action.to_string(),
            target_reader_name: self.target_reader_name.clone(),
            target_plugin_name: self.target_plugin_name.clone(),
            body: self.body.clone(),
        };
        serde_json::to_string(&wire)
            .map_err(|e| Error::protocol(format!("envelope serialization failed: {e}")))
    }

    /// Decode from the JSON wire form
    ///
    /// Session id and action are mandatory; an unrecognized action string
    /// fails with a protocol error rather than being dropped.
    pub fn from_json(data: &str) -> Result<Self, Error> {
        let wire: WireEnvelope = serde_json::from_str(data)
            .map_err(|e| Error::protocol(format!("malformed envelope: {e}")))?;
        if wire.session_id.is_empty() {
            return Err(Error::protocol("missing session id"));
        }
        let action = wire.action.parse()?;
        Ok(Self {
            session_id: SessionId::from(wire.session_id),
            client_node_id: wire.client_node_id,
            action,
            target_reader_name: wire.target_reader_name,
            target_plugin_name: wire.target_plugin_name,
            body: wire.body,
        })
    }
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WireEnvelope {
    session_id: String,
    #[serde(default)]
    client_node_id: String,
    #[serde(default)]
    action: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_reader_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    target_plugin_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    body: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> MessageEnvelope {
        MessageEnvelope::new(SessionId::from("s-1"), "node-1", Action::Execute)
            .with_target_reader("readerA")
            .with_target_plugin("pluginA")
            .with_body("{\"x\":1}")
    }

    #[test]
    fn codec_round_trips_losslessly() {
        let envelope = sample();
        let json = envelope.to_json().unwrap();
        let decoded = MessageEnvelope::from_json(&json).unwrap();
        assert_eq!(decoded, envelope);
    }

    #[test]
    fn body_is_optional() {
        let envelope = MessageEnvelope::new(SessionId::from("s-2"), "node-1", Action::Terminate);
        let decoded = MessageEnvelope::from_json(&envelope.to_json().unwrap()).unwrap();
        assert_eq!(decoded.body(), None);
    }

    #[test]
    fn unknown_action_is_a_protocol_error() {
        let data = "{\"sessionId\":\"s-3\",\"clientNodeId\":\"n\",\"action\":\"FLUSH\"}";
        let err = MessageEnvelope::from_json(data).unwrap_err();
        assert!(matches!(err, Error::Protocol(ref m) if m.contains("FLUSH")));
    }

    #[test]
    fn missing_session_id_is_rejected() {
        let data = "{\"sessionId\":\"\",\"clientNodeId\":\"n\",\"action\":\"EXECUTE\"}";
        assert!(matches!(
            MessageEnvelope::from_json(data),
            Err(Error::Protocol(_))
        ));
    }

    #[test]
    fn reply_echoes_routing_fields() {
        let reply = sample().reply(Action::Terminate);
        assert_eq!(reply.session_id(), &SessionId::from("s-1"));
        assert_eq!(reply.target_reader_name(), Some("readerA"));
        assert_eq!(reply.target_plugin_name(), Some("pluginA"));
        assert_eq!(reply.body(), None);
        assert!(reply.action().is_terminal());
    }
}
