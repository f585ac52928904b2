//! Core error type for the remote reader session protocol
//!
//! All error variants are consolidated here to simplify error handling and
//! facilitate bubbling up through the call stack. The [`RemoteError`] type is
//! the wire-carried counterpart used inside `ERROR` envelopes and unsuccessful
//! operation results.

use serde::{Deserialize, Serialize};

use crate::session::SessionId;

/// Core error type that encompasses all possible errors in the protocol layer
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    //
    // Protocol related errors
    //
    /// Malformed or unrecognized protocol message
    #[error("Protocol error: {0}")]
    Protocol(String),

    /// A session with this id is already live
    #[error("Duplicate session: {0}")]
    DuplicateSession(SessionId),

    /// No live session with this id
    #[error("Session not found: {0}")]
    SessionNotFound(SessionId),

    //
    // Transport related errors
    //
    /// The duplex channel for this session is not open
    #[error("Channel not open for session {0}")]
    ChannelNotOpen(SessionId),

    /// Channel dropped or I/O failure before a terminal reply
    #[error("Transport error: {0}")]
    Transport(String),

    //
    // Server resource errors
    //
    /// No unallocated reader matches the group reference
    #[error("No available reader in group {0}")]
    NoAvailableReader(String),

    /// No handler registered under the service identifier
    #[error("Unknown service: {0}")]
    UnknownService(String),

    //
    // Remote execution errors
    //
    /// Failure surfaced from the remote side of a session
    #[error("Remote execution error ({kind}): {message}")]
    RemoteExecution {
        /// Kind of failure carried on the wire
        kind: ErrorKind,
        /// Human readable description
        message: String,
    },

    /// Card communication failure raised by a local reader
    #[error("Reader error: {0}")]
    Reader(String),
}

impl Error {
    /// Create a new protocol error
    pub fn protocol<S: Into<String>>(message: S) -> Self {
        Self::Protocol(message.into())
    }

    /// Create a new transport error
    pub fn transport<S: Into<String>>(message: S) -> Self {
        Self::Transport(message.into())
    }

    /// Create a new reader error
    pub fn reader<S: Into<String>>(message: S) -> Self {
        Self::Reader(message.into())
    }

    /// The wire-level kind corresponding to this error
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::Protocol(_) | Self::DuplicateSession(_) | Self::SessionNotFound(_) => {
                ErrorKind::Protocol
            }
            Self::ChannelNotOpen(_) | Self::Transport(_) => ErrorKind::Internal,
            Self::NoAvailableReader(_) => ErrorKind::NoAvailableReader,
            Self::UnknownService(_) => ErrorKind::UnknownService,
            Self::RemoteExecution { kind, .. } => *kind,
            Self::Reader(_) => ErrorKind::ReaderCommunication,
        }
    }
}

/// Failure kinds carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    /// Card communication failed while driving the reader
    ReaderCommunication,
    /// The selection scenario could not be executed
    SelectionFailed,
    /// No unallocated reader matched the requested group
    NoAvailableReader,
    /// No handler registered under the service identifier
    UnknownService,
    /// Malformed or unexpected protocol message
    Protocol,
    /// The await-timeout safety net fired before a terminal reply
    Timeout,
    /// Unclassified server-side failure
    Internal,
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::ReaderCommunication => "READER_COMMUNICATION",
            Self::SelectionFailed => "SELECTION_FAILED",
            Self::NoAvailableReader => "NO_AVAILABLE_READER",
            Self::UnknownService => "UNKNOWN_SERVICE",
            Self::Protocol => "PROTOCOL",
            Self::Timeout => "TIMEOUT",
            Self::Internal => "INTERNAL",
        };
        f.write_str(name)
    }
}

/// Wire-carried failure description
///
/// Travels in the body of `ERROR` envelopes and in the `error` field of
/// unsuccessful operation results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteError {
    /// Kind of failure
    pub kind: ErrorKind,
    /// Human readable description
    pub message: String,
}

impl RemoteError {
    /// Create a new remote error
    pub fn new<S: Into<String>>(kind: ErrorKind, message: S) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// Convert into the client-facing typed error
    ///
    /// `NO_AVAILABLE_READER` and `UNKNOWN_SERVICE` map back to their dedicated
    /// variants so callers can match on them directly.
    pub fn into_error(self) -> Error {
        match self.kind {
            ErrorKind::NoAvailableReader => Error::NoAvailableReader(self.message),
            ErrorKind::UnknownService => Error::UnknownService(self.message),
            kind => Error::RemoteExecution {
                kind,
                message: self.message,
            },
        }
    }
}

impl From<&Error> for RemoteError {
    fn from(error: &Error) -> Self {
        Self::new(error.kind(), error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remote_error_round_trips_typed_variants() {
        let err = RemoteError::new(ErrorKind::NoAvailableReader, "group1");
        assert_eq!(err.into_error(), Error::NoAvailableReader("group1".into()));

        let err = RemoteError::new(ErrorKind::ReaderCommunication, "card removed");
        assert!(matches!(
            err.into_error(),
            Error::RemoteExecution {
                kind: ErrorKind::ReaderCommunication,
                ..
            }
        ));
    }

    #[test]
    fn kind_serializes_screaming_snake() {
        let json = serde_json::to_string(&ErrorKind::NoAvailableReader).unwrap();
        assert_eq!(json, "\"NO_AVAILABLE_READER\"");
    }
}
