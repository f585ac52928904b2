//! Opaque selection and command payloads
//!
//! The protocol layer transports these without interpreting them: the
//! selection scenario is a program for the card-access library on the reader
//! side, and commands/responses are raw hex exchanges.

use serde::{Deserialize, Serialize};

/// Opaque card selection program
///
/// Built by the card-access library on the client, executed against the real
/// reader on the server. The protocol layer never looks inside.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionScenario(serde_json::Value);

impl SelectionScenario {
    /// Wrap a serialized selection program
    pub const fn new(program: serde_json::Value) -> Self {
        Self(program)
    }

    /// The raw program
    pub const fn raw(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Outcome of running a selection scenario
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionResult {
    /// Whether a card matched the scenario
    pub matched: bool,
    /// Decoded smart-card handle, opaque to the protocol layer
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub smart_card: Option<serde_json::Value>,
}

impl SelectionResult {
    /// A successful match carrying the decoded card handle
    pub const fn matched(smart_card: serde_json::Value) -> Self {
        Self {
            matched: true,
            smart_card: Some(smart_card),
        }
    }

    /// No card matched the scenario
    pub const fn no_match() -> Self {
        Self {
            matched: false,
            smart_card: None,
        }
    }
}

/// One raw command for the reader, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderCommand(String);

impl ReaderCommand {
    /// Wrap a hex-encoded command
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex form
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}

/// One raw reader response, hex encoded
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReaderResponse(String);

impl ReaderResponse {
    /// Wrap a hex-encoded response
    pub fn new(hex: impl Into<String>) -> Self {
        Self(hex.into())
    }

    /// The hex form
    pub fn as_hex(&self) -> &str {
        &self.0
    }
}
