//! Server side of the cardlink remote reader session protocol
//!
//! The server resolves each incoming operation to a local reader, either
//! registered with a plugin or allocated from a [`pool::ReaderPool`],
//! executes it, and replies with exactly one terminal envelope per session.
//! Business routines register with the [`dispatcher::ServiceDispatcher`] and
//! are routed by the service identifier carried in the request.
//!
//! Everything hangs off an explicitly constructed [`context::ServerContext`];
//! there is no process-wide registry. Wire the context into a
//! [`binding::SyncNodeServer`] (request/response transports) or a
//! [`binding::AsyncNodeServer`] (persistent duplex transports).
//!
//! ## Example
//!
//! ```ignore
//! let pool = Arc::new(ReaderPool::new().with_reader("group1", reader));
//! let context = ServerContext::builder()
//!     .register_pool("pool-plugin", pool)
//!     .register_service("DEBIT", Arc::new(debit_handler))
//!     .build();
//! let server = SyncNodeServer::new(context, ServerConfig::default());
//! // feed request envelopes: server.on_request(envelope).await
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod binding;
pub mod config;
pub mod context;
pub mod dispatcher;
pub mod node;
pub mod pool;
pub mod stub;

pub use binding::{AsyncEndpointServer, AsyncNodeServer, SyncNodeServer};
pub use config::ServerConfig;
pub use context::{PluginEntry, ServerContext, ServerContextBuilder, ServerPlugin};
pub use dispatcher::{RemoteServiceHandler, ServiceDispatcher};
pub use node::ServerNode;
pub use pool::ReaderPool;
pub use stub::StubPlugin;
