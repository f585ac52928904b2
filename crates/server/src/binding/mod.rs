//! Transport bindings for the server node
//!
//! The [`sync`] binding turns each request into a drained batch of response
//! envelopes; the [`duplex`] binding pushes envelopes over a persistent
//! channel as the session tasks produce them.

pub mod duplex;
pub mod sync;

pub use duplex::{AsyncEndpointServer, AsyncNodeServer};
pub use sync::SyncNodeServer;
