//! Typed protocol events
//!
//! Components publish these onto channels instead of invoking observer
//! callbacks, which keeps ordering and backpressure explicit. Channel
//! constructors live in [`channel`].

pub mod channel;

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

pub use channel::{
    PluginEventReceiver, PluginEventSender, ReaderEventReceiver, ReaderEventSender,
    SessionEventReceiver, SessionEventSender,
};

/// Card presence notifications for a reader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ReaderEvent {
    /// A card entered the reader
    CardInserted {
        /// Name of the reader
        reader: String,
    },
    /// The card left the reader
    CardRemoved {
        /// Name of the reader
        reader: String,
    },
    /// The reader itself disappeared
    Unplugged {
        /// Name of the reader
        reader: String,
    },
}

impl ReaderEvent {
    /// The reader this event concerns
    pub fn reader(&self) -> &str {
        match self {
            Self::CardInserted { reader }
            | Self::CardRemoved { reader }
            | Self::Unplugged { reader } => reader,
        }
    }
}

/// Session lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session entered the registry
    Opened {
        /// Session identifier
        session_id: SessionId,
    },
    /// A session ended normally
    Closed {
        /// Session identifier
        session_id: SessionId,
    },
    /// A session ended on an error or channel loss
    Failed {
        /// Session identifier
        session_id: SessionId,
    },
}

/// Pool lifecycle notifications
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginEvent {
    /// A pooled reader was handed out
    ReaderAllocated {
        /// Name of the reader
        reader: String,
        /// Group it was allocated from
        group_reference: String,
    },
    /// A pooled reader was returned
    ReaderReleased {
        /// Name of the reader
        reader: String,
    },
}
