//! Client side of the cardlink remote reader session protocol
//!
//! Business code talks to a [`plugin::RemotePlugin`] / [`reader::RemoteReader`]
//! facade that looks like a local plugin and reader; every operation is
//! packaged into message envelopes by the [`node::ClientNode`] and carried by
//! either transport binding:
//!
//! - [`binding::SyncEndpointClient`]: one request/response round trip per
//!   exchange (HTTP-style)
//! - [`binding::AsyncEndpointClient`]: a persistent duplex channel per
//!   session (websocket-style), with inbound traffic forwarded to the
//!   [`binding::AsyncClientHandler`]
//!
//! ## Example
//!
//! ```ignore
//! let node = Arc::new(ClientNode::sync(endpoint, ClientConfig::default()));
//! let plugin = RemotePlugin::new("pool-plugin", node);
//! let reader = plugin.allocate_reader("group1").await?;
//! reader.prepare_selection(scenario);
//! let selection = reader.process_selection_scenario().await?;
//! plugin.release_reader(reader).await?;
//! ```
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod binding;
pub mod config;
pub mod node;
pub mod plugin;
pub mod reader;

pub use binding::{
    AsyncClientBinding, AsyncClientHandler, AsyncEndpointClient, ClientBinding, SyncClientBinding,
    SyncEndpointClient,
};
pub use config::ClientConfig;
pub use node::{ClientNode, RemoteRequest};
pub use plugin::RemotePlugin;
pub use reader::RemoteReader;
