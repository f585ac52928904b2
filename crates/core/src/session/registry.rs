//! Registry of live sessions
//!
//! The registry is the single shared-mutable structure of the protocol layer.
//! The map lock is only held for bookkeeping; waiting for inbound envelopes
//! happens on per-session oneshot receivers, so operations on independent
//! sessions never contend and the delivery callback hands off to the waiting
//! caller instead of running its continuation inline.

use std::collections::{HashMap, VecDeque};
use std::time::Instant;

use parking_lot::Mutex;
use tokio::sync::oneshot;
use tracing::{debug, trace, warn};

use crate::error::Error;
use crate::event::{SessionEvent, SessionEventSender};
use crate::message::MessageEnvelope;
use crate::session::{SessionId, SessionInfo, SessionState};

/// Tracks every live session on one side of the link
#[derive(Debug, Default)]
pub struct SessionRegistry {
    sessions: Mutex<HashMap<SessionId, SessionSlot>>,
    events: Option<SessionEventSender>,
}

#[derive(Debug)]
struct SessionSlot {
    state: SessionState,
    client_node_id: Option<String>,
    reader_name: Option<String>,
    channel_open: bool,
    created_at: Instant,
    waiter: Option<oneshot::Sender<MessageEnvelope>>,
    open_waiter: Option<oneshot::Sender<()>>,
    inbox: VecDeque<MessageEnvelope>,
}

impl SessionSlot {
    fn new() -> Self {
        Self {
            state: SessionState::Open,
            client_node_id: None,
            reader_name: None,
            channel_open: false,
            created_at: Instant::now(),
            waiter: None,
            open_waiter: None,
            inbox: VecDeque::new(),
        }
    }
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry that publishes lifecycle events onto `events`
    pub fn with_events(events: SessionEventSender) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            events: Some(events),
        }
    }

    /// Create a session in state OPEN
    ///
    /// Fails with [`Error::DuplicateSession`] if the id is already live.
    pub fn open(&self, id: &SessionId) -> Result<(), Error> {
        {
            let mut sessions = self.sessions.lock();
            if sessions.contains_key(id) {
                return Err(Error::DuplicateSession(id.clone()));
            }
            sessions.insert(id.clone(), SessionSlot::new());
        }
        trace!(session = %id, "session opened");
        self.emit(SessionEvent::Opened {
            session_id: id.clone(),
        });
        Ok(())
    }

    /// Whether a session with this id is live
    pub fn contains(&self, id: &SessionId) -> bool {
        self.sessions.lock().contains_key(id)
    }

    /// Associate a transport channel with the session (async binding only)
    ///
    /// Marks the channel open and wakes a pending [`Self::wait_channel_open`]
    /// caller.
    pub fn bind_channel(&self, id: &SessionId) -> Result<(), Error> {
        let open_waiter = {
            let mut sessions = self.sessions.lock();
            let slot = sessions
                .get_mut(id)
                .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
            slot.channel_open = true;
            slot.open_waiter.take()
        };
        trace!(session = %id, "channel bound");
        if let Some(tx) = open_waiter {
            let _ = tx.send(());
        }
        Ok(())
    }

    /// Whether the session's channel is bound and open
    pub fn channel_open(&self, id: &SessionId) -> bool {
        self.sessions
            .lock()
            .get(id)
            .is_some_and(|slot| slot.channel_open)
    }

    /// Obtain a receiver resolved once the session's channel is open
    ///
    /// Resolves immediately if the channel is already bound. The receiver
    /// fails if the session is closed before the channel opens.
    pub fn wait_channel_open(&self, id: &SessionId) -> Result<oneshot::Receiver<()>, Error> {
        let (tx, rx) = oneshot::channel();
        let mut sessions = self.sessions.lock();
        let slot = sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
        if slot.channel_open {
            let _ = tx.send(());
        } else {
            slot.open_waiter = Some(tx);
        }
        Ok(rx)
    }

    /// Record the client endpoint that initiated the session
    pub fn set_client_node(&self, id: &SessionId, client_node_id: &str) -> Result<(), Error> {
        let mut sessions = self.sessions.lock();
        let slot = sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
        slot.client_node_id = Some(client_node_id.to_owned());
        Ok(())
    }

    /// Bind the session to a reader name
    pub fn set_reader(&self, id: &SessionId, reader_name: &str) -> Result<(), Error> {
        let mut sessions = self.sessions.lock();
        let slot = sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
        slot.reader_name = Some(reader_name.to_owned());
        Ok(())
    }

    /// Live sessions currently bound to `reader_name`
    pub fn sessions_for_reader(&self, reader_name: &str) -> Vec<SessionId> {
        self.sessions
            .lock()
            .iter()
            .filter(|(_, slot)| slot.reader_name.as_deref() == Some(reader_name))
            .map(|(id, _)| id.clone())
            .collect()
    }

    /// Snapshot of a live session
    pub fn lookup(&self, id: &SessionId) -> Option<SessionInfo> {
        self.sessions.lock().get(id).map(|slot| SessionInfo {
            id: id.clone(),
            state: slot.state,
            client_node_id: slot.client_node_id.clone(),
            reader_name: slot.reader_name.clone(),
            channel_open: slot.channel_open,
            created_at: slot.created_at,
        })
    }

    /// Obtain a receiver for the next inbound envelope of this session
    ///
    /// Yields a buffered envelope immediately when one is queued, otherwise
    /// installs the session's reply waker and transitions the session to
    /// AWAITING_REPLY. The receiver fails if the session is closed before an
    /// envelope arrives. At most one consumer may wait per session.
    pub fn next_message(&self, id: &SessionId) -> Result<oneshot::Receiver<MessageEnvelope>, Error> {
        let (tx, rx) = oneshot::channel();
        let mut sessions = self.sessions.lock();
        let slot = sessions
            .get_mut(id)
            .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
        if slot.waiter.is_some() {
            return Err(Error::protocol(format!(
                "concurrent awaits on session {id}"
            )));
        }
        if let Some(envelope) = slot.inbox.pop_front() {
            let _ = tx.send(envelope);
        } else {
            slot.state = SessionState::AwaitingReply;
            slot.waiter = Some(tx);
        }
        Ok(rx)
    }

    /// Route an inbound envelope to its session by embedded session id
    ///
    /// Wakes the session's waiter when one is installed, otherwise appends to
    /// the per-session FIFO so ordering is preserved. Envelopes for unknown
    /// (already closed) sessions fail with [`Error::SessionNotFound`]; callers
    /// treat that as a late duplicate and drop it.
    pub fn deliver(&self, envelope: MessageEnvelope) -> Result<(), Error> {
        let id = envelope.session_id().clone();
        let waiter = {
            let mut sessions = self.sessions.lock();
            let slot = sessions
                .get_mut(&id)
                .ok_or_else(|| Error::SessionNotFound(id.clone()))?;
            match slot.waiter.take() {
                Some(tx) => {
                    slot.state = SessionState::Open;
                    Some((tx, envelope))
                }
                None => {
                    slot.inbox.push_back(envelope);
                    None
                }
            }
        };
        if let Some((tx, envelope)) = waiter {
            trace!(session = %id, action = %envelope.action(), "delivering to waiter");
            if tx.send(envelope).is_err() {
                debug!(session = %id, "waiter gone before delivery");
            }
        }
        Ok(())
    }

    /// Close a session and release its entry
    ///
    /// Idempotent: closing an unknown or already-closed session is a no-op,
    /// because transport-level close notifications can race with
    /// protocol-level close. Any pending waiter is dropped, which fails the
    /// suspended caller with a transport error instead of hanging it.
    pub fn close(&self, id: &SessionId) -> bool {
        self.remove(id, SessionState::Closed)
    }

    /// Close a session on an error path
    ///
    /// Same release semantics as [`Self::close`], reported as FAILED.
    pub fn fail(&self, id: &SessionId) -> bool {
        self.remove(id, SessionState::Failed)
    }

    fn remove(&self, id: &SessionId, state: SessionState) -> bool {
        let slot = self.sessions.lock().remove(id);
        match slot {
            Some(slot) => {
                if slot.waiter.is_some() {
                    warn!(session = %id, "session closed while a caller was awaiting");
                }
                trace!(session = %id, ?state, "session released");
                self.emit(match state {
                    SessionState::Failed => SessionEvent::Failed {
                        session_id: id.clone(),
                    },
                    _ => SessionEvent::Closed {
                        session_id: id.clone(),
                    },
                });
                true
            }
            None => false,
        }
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.lock().len()
    }

    /// Whether no session is live
    pub fn is_empty(&self) -> bool {
        self.sessions.lock().is_empty()
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}
