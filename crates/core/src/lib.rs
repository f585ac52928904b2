//! Core types for the cardlink remote reader session protocol
//!
//! Cardlink lets a client process drive a smart-card reader attached to a
//! different process or host, multiplexing many independent reader sessions
//! over a shared transport. This crate provides the pieces both sides share:
//!
//! - The [`message::MessageEnvelope`] wire unit and its JSON codec
//! - The [`session::SessionRegistry`] tracking live sessions
//! - The [`reader::CardReader`] capability trait for local readers
//! - Operation payloads and the protocol error taxonomy
//! - Typed event channels replacing observer callbacks
//!
//! The client and server protocol engines live in the `cardlink-client` and
//! `cardlink-server` crates.
#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![forbid(unsafe_code)]
#![warn(missing_docs, rustdoc::missing_crate_level_docs)]

pub mod error;
pub mod event;
pub mod message;
pub mod operation;
pub mod reader;
pub mod selection;
pub mod session;
pub mod stub;

pub use error::{Error, ErrorKind, RemoteError};
pub use message::{Action, MessageEnvelope};
pub use operation::{ClientAnswer, OperationRequest, OperationResult, ServerQuery};
pub use reader::CardReader;
pub use selection::{ReaderCommand, ReaderResponse, SelectionResult, SelectionScenario};
pub use session::{SessionId, SessionInfo, SessionRegistry, SessionState};

/// Prelude module containing commonly used traits and types
pub mod prelude {
    pub use crate::error::{Error, ErrorKind, RemoteError};
    pub use crate::event::{PluginEvent, ReaderEvent, SessionEvent};
    pub use crate::message::{Action, MessageEnvelope};
    pub use crate::operation::{ClientAnswer, OperationRequest, OperationResult, ServerQuery};
    pub use crate::reader::CardReader;
    pub use crate::selection::{ReaderCommand, ReaderResponse, SelectionResult, SelectionScenario};
    pub use crate::session::{SessionId, SessionRegistry, SessionState};
}

#[cfg(test)]
mod tests {
    use super::*;

    // Test the basic types are re-exported correctly
    #[test]
    fn test_reexports() {
        let id = SessionId::generate();
        let envelope = MessageEnvelope::new(id.clone(), "node-1", Action::Execute);
        assert_eq!(envelope.session_id(), &id);
        assert!(!envelope.action().is_terminal());
    }
}
