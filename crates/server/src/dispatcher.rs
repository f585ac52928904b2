//! Service dispatcher
//!
//! Routes an `EXECUTE_SERVICE` request to the business handler registered
//! under its service identifier. Handler failures are captured into a normal
//! unsuccessful result rather than a protocol error, so clients can
//! distinguish "your business logic failed" from "the protocol broke".

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, warn};

use cardlink_core::{CardReader, Error, ErrorKind, OperationResult};

/// Business routine registered under a service identifier
pub trait RemoteServiceHandler: Send + Sync {
    /// Run the routine against the resolved reader
    fn execute(
        &self,
        reader: &dyn CardReader,
        input: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, Error>;
}

impl<F> RemoteServiceHandler for F
where
    F: Fn(&dyn CardReader, Option<&serde_json::Value>) -> Result<serde_json::Value, Error>
        + Send
        + Sync,
{
    fn execute(
        &self,
        reader: &dyn CardReader,
        input: Option<&serde_json::Value>,
    ) -> Result<serde_json::Value, Error> {
        self(reader, input)
    }
}

/// Registry of business handlers keyed by service identifier
#[derive(Default)]
#[allow(missing_debug_implementations)]
pub struct ServiceDispatcher {
    handlers: HashMap<String, Arc<dyn RemoteServiceHandler>>,
}

impl ServiceDispatcher {
    /// Create an empty dispatcher
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler under `service_id`, replacing any previous one
    pub fn register(
        &mut self,
        service_id: impl Into<String>,
        handler: Arc<dyn RemoteServiceHandler>,
    ) {
        self.handlers.insert(service_id.into(), handler);
    }

    /// Whether a handler is registered under `service_id`
    pub fn contains(&self, service_id: &str) -> bool {
        self.handlers.contains_key(service_id)
    }

    /// Run the handler registered under `service_id`
    ///
    /// Always returns a well-formed result: unknown identifiers and handler
    /// failures come back unsuccessful, carrying the caller's input context.
    pub fn dispatch(
        &self,
        service_id: &str,
        reader: &dyn CardReader,
        input: Option<serde_json::Value>,
    ) -> OperationResult {
        let Some(handler) = self.handlers.get(service_id) else {
            debug!(service = service_id, "no handler registered");
            return OperationResult::failure(
                ErrorKind::UnknownService,
                format!("no handler registered for service {service_id}"),
            )
            .with_context(input);
        };
        match handler.execute(reader, input.as_ref()) {
            Ok(output) => OperationResult::success(Some(output)),
            Err(e) => {
                warn!(service = service_id, error = %e, "handler failed");
                OperationResult::failure(e.kind(), e.to_string()).with_context(input)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use cardlink_core::stub::StubReader;
    use serde_json::json;

    fn dispatcher() -> ServiceDispatcher {
        let mut dispatcher = ServiceDispatcher::new();
        dispatcher.register(
            "ECHO_USER",
            Arc::new(
                |_reader: &dyn CardReader,
                 input: Option<&serde_json::Value>|
                 -> Result<serde_json::Value, Error> {
                    Ok(json!({ "userId": input.and_then(|v| v.get("userId")).cloned() }))
                },
            ),
        );
        dispatcher.register(
            "ALWAYS_FAILS",
            Arc::new(
                |_reader: &dyn CardReader,
                 _input: Option<&serde_json::Value>|
                 -> Result<serde_json::Value, Error> {
                    Err(Error::reader("card removed mid-transaction"))
                },
            ),
        );
        dispatcher
    }

    #[test]
    fn dispatches_to_the_registered_handler() {
        let reader = StubReader::new("r1").with_card_present(true);
        let result = dispatcher().dispatch("ECHO_USER", &reader, Some(json!({"userId": "alice"})));
        assert!(result.successful);
        assert_eq!(result.output.unwrap()["userId"], "alice");
    }

    #[test]
    fn unknown_service_is_a_domain_outcome() {
        let reader = StubReader::new("r1");
        let result = dispatcher().dispatch("UNKNOWN", &reader, Some(json!({"userId": "bob"})));
        assert!(!result.successful);
        assert_eq!(result.error.unwrap().kind, ErrorKind::UnknownService);
        assert_eq!(result.context.unwrap()["userId"], "bob");
    }

    #[test]
    fn handler_failure_keeps_the_input_context() {
        let reader = StubReader::new("r1");
        let result = dispatcher().dispatch("ALWAYS_FAILS", &reader, Some(json!({"userId": "eve"})));
        assert!(!result.successful);
        assert_eq!(
            result.error.as_ref().unwrap().kind,
            ErrorKind::ReaderCommunication
        );
        assert_eq!(result.context.unwrap()["userId"], "eve");
    }
}
