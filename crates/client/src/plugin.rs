//! Remote plugin facade
//!
//! Looks like a local plugin to business code; every operation is forwarded
//! through the client node. Pool-backed plugins additionally expose the
//! allocate/release surface.

use std::collections::BTreeSet;
use std::sync::Arc;

use serde::Deserialize;

use cardlink_core::{Error, OperationRequest, OperationResult, RemoteError};

use crate::binding::ClientBinding;
use crate::node::{ClientNode, RemoteRequest};
use crate::reader::RemoteReader;

/// Client-visible proxy for a server-side plugin
#[allow(missing_debug_implementations)]
pub struct RemotePlugin<B: ClientBinding> {
    name: String,
    node: Arc<ClientNode<B>>,
}

impl<B: ClientBinding> RemotePlugin<B> {
    /// Create a proxy for the plugin registered under `name` on the server
    pub fn new(name: impl Into<String>, node: Arc<ClientNode<B>>) -> Self {
        Self {
            name: name.into(),
            node,
        }
    }

    /// Name of the remote plugin
    pub fn name(&self) -> &str {
        &self.name
    }

    /// A proxy for a reader registered with this plugin
    pub fn reader(&self, name: impl Into<String>) -> RemoteReader<B> {
        RemoteReader::new(&self.name, name, Arc::clone(&self.node))
    }

    /// Reader group references currently known to the server-side pool
    pub async fn group_references(&self) -> Result<BTreeSet<String>, Error> {
        let result = self
            .node
            .execute(RemoteRequest::new(&self.name, OperationRequest::GroupReferences))
            .await?;
        let result = unwrap_result(result)?;
        result.output_as()
    }

    /// Allocate one exclusive reader from `group_reference`
    pub async fn allocate_reader(
        &self,
        group_reference: impl Into<String>,
    ) -> Result<RemoteReader<B>, Error> {
        let result = self
            .node
            .execute(RemoteRequest::new(
                &self.name,
                OperationRequest::AllocateReader {
                    group_reference: group_reference.into(),
                },
            ))
            .await?;
        let result = unwrap_result(result)?;
        let output: AllocateOutput = result.output_as()?;
        Ok(self.reader(output.reader_name))
    }

    /// Return an allocated reader to its pool
    pub async fn release_reader(&self, reader: RemoteReader<B>) -> Result<(), Error> {
        let result = self
            .node
            .execute(RemoteRequest::new(
                &self.name,
                OperationRequest::ReleaseReader {
                    reader_name: reader.name().to_owned(),
                },
            ))
            .await?;
        unwrap_result(result).map(|_| ())
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct AllocateOutput {
    reader_name: String,
}

/// Surface an unsuccessful result as the typed error it carries
pub(crate) fn unwrap_result(result: OperationResult) -> Result<OperationResult, Error> {
    if result.successful {
        Ok(result)
    } else {
        Err(result
            .error
            .map(RemoteError::into_error)
            .unwrap_or_else(|| Error::protocol("unsuccessful result without error detail")))
    }
}
