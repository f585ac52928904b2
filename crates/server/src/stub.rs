//! Stub plugin for tests and examples

use std::collections::HashMap;
use std::sync::Arc;

use cardlink_core::CardReader;

use crate::context::ServerPlugin;

/// A plugin with a fixed, manually plugged reader set
#[derive(Debug, Default)]
pub struct StubPlugin {
    name: String,
    readers: HashMap<String, Arc<dyn CardReader>>,
}

impl StubPlugin {
    /// Create an empty stub plugin
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            readers: HashMap::new(),
        }
    }

    /// Add a reader, keyed by its own name
    pub fn with_reader(mut self, reader: Arc<dyn CardReader>) -> Self {
        self.readers.insert(reader.name().to_owned(), reader);
        self
    }
}

impl ServerPlugin for StubPlugin {
    fn name(&self) -> &str {
        &self.name
    }

    fn reader_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self.readers.keys().cloned().collect();
        names.sort();
        names
    }

    fn reader(&self, name: &str) -> Option<Arc<dyn CardReader>> {
        self.readers.get(name).map(Arc::clone)
    }
}
