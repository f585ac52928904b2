//! Remote reader facade
//!
//! Looks like a local reader to business code; every operation is forwarded
//! through the client node to the real reader on the server side. Prepared
//! selection scenarios and command batches are held here until the matching
//! operation runs.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use cardlink_core::{
    Error, OperationRequest, OperationResult, ReaderCommand, ReaderResponse, SelectionResult,
    SelectionScenario,
};

use crate::binding::ClientBinding;
use crate::node::{ClientNode, RemoteRequest};
use crate::plugin::unwrap_result;

/// Client-visible proxy for a server-side reader
#[allow(missing_debug_implementations)]
pub struct RemoteReader<B: ClientBinding> {
    plugin_name: String,
    name: String,
    node: Arc<ClientNode<B>>,
    scenario: Mutex<Option<SelectionScenario>>,
    prepared: Mutex<VecDeque<Vec<ReaderCommand>>>,
}

impl<B: ClientBinding> RemoteReader<B> {
    pub(crate) fn new(
        plugin_name: impl Into<String>,
        name: impl Into<String>,
        node: Arc<ClientNode<B>>,
    ) -> Self {
        Self {
            plugin_name: plugin_name.into(),
            name: name.into(),
            node,
            scenario: Mutex::new(None),
            prepared: Mutex::new(VecDeque::new()),
        }
    }

    /// Name of the remote reader
    pub fn name(&self) -> &str {
        &self.name
    }

    fn request(&self, operation: OperationRequest) -> RemoteRequest {
        RemoteRequest::new(&self.plugin_name, operation).with_reader(&self.name)
    }

    /// Whether a card is present in the remote reader
    pub async fn is_card_present(&self) -> Result<bool, Error> {
        let result = self
            .node
            .execute(self.request(OperationRequest::IsCardPresent))
            .await?;
        unwrap_result(result)?.output_as()
    }

    /// Stage a selection scenario for [`Self::process_selection_scenario`]
    pub fn prepare_selection(&self, scenario: SelectionScenario) {
        *self.scenario.lock() = Some(scenario);
    }

    /// Queue a batch of commands for [`Self::transmit_commands`]
    pub fn prepare_commands(&self, batch: Vec<ReaderCommand>) {
        self.prepared.lock().push_back(batch);
    }

    /// Run the staged selection scenario on the remote reader
    pub async fn process_selection_scenario(&self) -> Result<SelectionResult, Error> {
        let scenario = self
            .scenario
            .lock()
            .take()
            .ok_or_else(|| Error::protocol("no selection scenario prepared"))?;
        let result = self
            .node
            .execute(self.request(OperationRequest::ProcessSelection { scenario }))
            .await?;
        unwrap_result(result)?.output_as()
    }

    /// Execute the queued command batches on the remote reader
    ///
    /// The first batch travels with the request; the server pulls the rest
    /// one batch at a time within the same session.
    pub async fn transmit_commands(&self) -> Result<Vec<ReaderResponse>, Error> {
        let mut batches = std::mem::take(&mut *self.prepared.lock());
        let commands = batches.pop_front().unwrap_or_default();
        let has_more = !batches.is_empty();
        let request = self
            .request(OperationRequest::TransmitCommands { commands, has_more })
            .with_pending_batches(batches);
        let result = self.node.execute(request).await?;
        unwrap_result(result)?.output_as()
    }

    /// Run a registered business service against the remote reader
    ///
    /// The result is returned as-is, successful or not, so callers can branch
    /// on domain outcomes instead of catching protocol errors.
    pub async fn execute_remote_service(
        &self,
        service_id: impl Into<String>,
        input: Option<serde_json::Value>,
    ) -> Result<OperationResult, Error> {
        self.node
            .execute(self.request(OperationRequest::ExecuteService {
                service_id: service_id.into(),
                input,
            }))
            .await
    }
}
