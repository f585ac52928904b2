//! Server context
//!
//! Explicitly constructed, passed-down object holding the plugin table and
//! the service dispatcher. Built once at startup, dropped at shutdown; there
//! is no process-wide registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use cardlink_core::CardReader;

use crate::dispatcher::{RemoteServiceHandler, ServiceDispatcher};
use crate::pool::ReaderPool;

/// A named set of local readers
pub trait ServerPlugin: Send + Sync + fmt::Debug {
    /// Name the plugin is registered under
    fn name(&self) -> &str;

    /// Names of the readers this plugin manages
    fn reader_names(&self) -> Vec<String>;

    /// Look up a reader by name
    fn reader(&self, name: &str) -> Option<Arc<dyn CardReader>>;
}

/// How a target plugin resolves readers
///
/// An explicit capability set per entry: regular plugins answer direct reader
/// lookups, pool-backed plugins additionally carry the allocation surface.
#[derive(Debug, Clone)]
pub enum PluginEntry {
    /// Plugin with a fixed reader set
    Registered(Arc<dyn ServerPlugin>),
    /// Pool-backed plugin with allocate/release semantics
    Pooled(Arc<ReaderPool>),
}

impl PluginEntry {
    /// Look up a reader by name within this entry
    pub fn reader(&self, name: &str) -> Option<Arc<dyn CardReader>> {
        match self {
            Self::Registered(plugin) => plugin.reader(name),
            Self::Pooled(pool) => pool.reader(name),
        }
    }
}

/// Shared server-side state: plugin table and dispatcher
#[allow(missing_debug_implementations)]
pub struct ServerContext {
    plugins: HashMap<String, PluginEntry>,
    dispatcher: ServiceDispatcher,
}

impl ServerContext {
    /// Start building a context
    pub fn builder() -> ServerContextBuilder {
        ServerContextBuilder::default()
    }

    /// Look up a plugin entry by name
    pub fn plugin(&self, name: &str) -> Option<&PluginEntry> {
        self.plugins.get(name)
    }

    /// The service dispatcher
    pub const fn dispatcher(&self) -> &ServiceDispatcher {
        &self.dispatcher
    }
}

/// Builder for [`ServerContext`]
#[derive(Default)]
#[allow(missing_debug_implementations)]
pub struct ServerContextBuilder {
    plugins: HashMap<String, PluginEntry>,
    dispatcher: ServiceDispatcher,
}

impl ServerContextBuilder {
    /// Register a plugin with a fixed reader set
    pub fn register_plugin(mut self, plugin: Arc<dyn ServerPlugin>) -> Self {
        self.plugins
            .insert(plugin.name().to_owned(), PluginEntry::Registered(plugin));
        self
    }

    /// Register a pool-backed plugin under `name`
    pub fn register_pool(mut self, name: impl Into<String>, pool: Arc<ReaderPool>) -> Self {
        self.plugins.insert(name.into(), PluginEntry::Pooled(pool));
        self
    }

    /// Register a business handler under `service_id`
    pub fn register_service(
        mut self,
        service_id: impl Into<String>,
        handler: Arc<dyn RemoteServiceHandler>,
    ) -> Self {
        self.dispatcher.register(service_id, handler);
        self
    }

    /// Finish building
    pub fn build(self) -> Arc<ServerContext> {
        Arc::new(ServerContext {
            plugins: self.plugins,
            dispatcher: self.dispatcher,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stub::StubPlugin;
    use cardlink_core::stub::StubReader;

    #[test]
    fn resolves_plugins_by_name() {
        let plugin = Arc::new(
            StubPlugin::new("stubPlugin").with_reader(Arc::new(StubReader::new("readerA"))),
        );
        let pool = Arc::new(ReaderPool::new());
        let context = ServerContext::builder()
            .register_plugin(plugin)
            .register_pool("poolPlugin", pool)
            .build();

        assert!(matches!(
            context.plugin("stubPlugin"),
            Some(PluginEntry::Registered(_))
        ));
        assert!(matches!(
            context.plugin("poolPlugin"),
            Some(PluginEntry::Pooled(_))
        ));
        assert!(context.plugin("missing").is_none());

        let entry = context.plugin("stubPlugin").unwrap();
        assert!(entry.reader("readerA").is_some());
        assert!(entry.reader("readerB").is_none());
    }
}
