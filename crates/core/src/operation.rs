//! Operation payloads carried inside envelope bodies

use serde::{Deserialize, Serialize};

use crate::error::{ErrorKind, RemoteError};
use crate::selection::{ReaderCommand, SelectionScenario};

/// Request carried in the body of an `EXECUTE` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationRequest {
    /// Allocate one exclusive reader from a group
    AllocateReader {
        /// Group to allocate from
        group_reference: String,
    },
    /// Return an allocated reader to its pool
    ReleaseReader {
        /// Name of the allocated reader
        reader_name: String,
    },
    /// List the group references currently known to the pool
    GroupReferences,
    /// Check card presence on the target reader
    IsCardPresent,
    /// Run a selection scenario on the target reader
    ProcessSelection {
        /// The opaque selection program
        scenario: SelectionScenario,
    },
    /// Execute raw commands on the target reader
    ///
    /// When `has_more` is set the server pulls further batches with a
    /// `CMD`/`NEXT_COMMANDS` query instead of requiring the whole program up
    /// front.
    TransmitCommands {
        /// First batch of commands
        commands: Vec<ReaderCommand>,
        /// Whether the client holds further batches
        has_more: bool,
    },
    /// Run a registered business service against the target reader
    ExecuteService {
        /// Identifier the handler is registered under
        service_id: String,
        /// Caller-supplied input payload
        #[serde(default, skip_serializing_if = "Option::is_none")]
        input: Option<serde_json::Value>,
    },
}

/// Server-to-client query carried in the body of a `CMD` envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ServerQuery {
    /// Ask for the next batch of reader commands
    NextCommands,
}

/// Client answer carried in the body of a `RESP` envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ClientAnswer {
    /// The next batch of reader commands
    Commands {
        /// Commands in this batch; empty when the program is exhausted
        commands: Vec<ReaderCommand>,
        /// Whether further batches remain
        has_more: bool,
    },
}

/// Terminal outcome of a remote operation, carried in a `TERMINATE` envelope
///
/// Business failures ride here as `successful = false` so clients can branch
/// on domain outcomes; only protocol/transport/reader failures use `ERROR`
/// envelopes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OperationResult {
    /// Whether the operation succeeded
    pub successful: bool,
    /// Operation output payload
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<serde_json::Value>,
    /// Failure description when unsuccessful
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RemoteError>,
    /// Echo of the caller-supplied input context on failure paths
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub context: Option<serde_json::Value>,
}

impl OperationResult {
    /// A successful result carrying `output`
    pub const fn success(output: Option<serde_json::Value>) -> Self {
        Self {
            successful: true,
            output,
            error: None,
            context: None,
        }
    }

    /// An unsuccessful result
    pub fn failure(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            successful: false,
            output: None,
            error: Some(RemoteError::new(kind, message)),
            context: None,
        }
    }

    /// Attach the caller-supplied input context
    pub fn with_context(mut self, context: Option<serde_json::Value>) -> Self {
        self.context = context;
        self
    }

    /// Decode the output payload into `T`
    pub fn output_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, crate::Error> {
        let output = self
            .output
            .as_ref()
            .ok_or_else(|| crate::Error::protocol("missing operation output"))?;
        serde_json::from_value(output.clone())
            .map_err(|e| crate::Error::protocol(format!("malformed operation output: {e}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn request_wire_form_is_tagged() {
        let request = OperationRequest::AllocateReader {
            group_reference: "G1".into(),
        };
        let json = serde_json::to_string(&request).unwrap();
        assert!(json.contains("\"type\":\"ALLOCATE_READER\""));
        let back: OperationRequest = serde_json::from_str(&json).unwrap();
        assert_eq!(back, request);
    }

    #[test]
    fn failure_result_keeps_context() {
        let result = OperationResult::failure(ErrorKind::UnknownService, "no such service")
            .with_context(Some(serde_json::json!({"userId": "alice"})));
        assert!(!result.successful);
        assert_eq!(result.error.as_ref().unwrap().kind, ErrorKind::UnknownService);
        assert_eq!(result.context.unwrap()["userId"], "alice");
    }

    #[test]
    fn output_decodes_into_typed_values() {
        let result = OperationResult::success(Some(serde_json::json!({"readerName": "r1"})));
        #[derive(Deserialize)]
        #[serde(rename_all = "camelCase")]
        struct Out {
            reader_name: String,
        }
        let out: Out = result.output_as().unwrap();
        assert_eq!(out.reader_name, "r1");
    }
}
