//! Persistent duplex client binding
//!
//! A long-lived channel keyed by session id carries push messages both
//! directions. The host application implements [`AsyncEndpointClient`] over
//! its transport (e.g. a websocket per session) and forwards inbound traffic
//! to the [`AsyncClientHandler`]. Routing is by the session id embedded in
//! each envelope, never by physical channel identity.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, trace, warn};

use cardlink_core::event::{ReaderEvent, ReaderEventSender};
use cardlink_core::{Action, Error, ErrorKind, MessageEnvelope, SessionId, SessionRegistry};

use crate::binding::ClientBinding;

/// Endpoint contract implemented by the host application
#[async_trait]
pub trait AsyncEndpointClient: Send + Sync {
    /// Open the underlying channel for a session
    ///
    /// The session id travels as a connection parameter; the server answers
    /// by signalling `on_open` back through the handler.
    async fn open_session(&self, session_id: &SessionId) -> Result<(), Error>;

    /// Push one envelope over the open channel
    async fn send_message(&self, message: MessageEnvelope) -> Result<(), Error>;

    /// Close the underlying channel for a session
    async fn close_session(&self, session_id: &SessionId) -> Result<(), Error>;
}

/// Inbound surface the host endpoint forwards transport events to
#[derive(Clone)]
#[allow(missing_debug_implementations)]
pub struct AsyncClientHandler {
    registry: Arc<SessionRegistry>,
    reader_events: ReaderEventSender,
}

impl AsyncClientHandler {
    pub(crate) fn new(registry: Arc<SessionRegistry>, reader_events: ReaderEventSender) -> Self {
        Self {
            registry,
            reader_events,
        }
    }

    /// The server accepted the channel; the session is now OPEN
    pub fn on_open(&self, session_id: &SessionId) {
        trace!(session = %session_id, "channel opened");
        if let Err(e) = self.registry.bind_channel(session_id) {
            debug!(session = %session_id, error = %e, "open signal for unknown session");
        }
    }

    /// An envelope arrived from the server
    ///
    /// Reader events are published straight onto the client's event channel;
    /// everything else is handed off to the caller suspended on the session.
    /// Runs on the transport's execution context and never executes the
    /// caller's continuation inline.
    pub fn on_message(&self, envelope: MessageEnvelope) {
        if envelope.action() == Action::ReaderEvent {
            match envelope.body_as::<ReaderEvent>() {
                Ok(event) => {
                    let _ = self.reader_events.send(event);
                }
                Err(e) => warn!(error = %e, "malformed reader event, dropping"),
            }
            return;
        }
        let session_id = envelope.session_id().clone();
        if let Err(e) = self.registry.deliver(envelope) {
            debug!(session = %session_id, error = %e, "late envelope dropped");
        }
    }

    /// The channel closed; release the session and unblock any waiter
    pub fn on_close(&self, session_id: &SessionId) {
        trace!(session = %session_id, "channel closed");
        self.registry.close(session_id);
    }

    /// The channel failed; release the session and unblock any waiter
    pub fn on_error(&self, session_id: &SessionId, message: &str) {
        warn!(session = %session_id, message, "channel error");
        self.registry.fail(session_id);
    }
}

/// Client binding over an [`AsyncEndpointClient`]
#[allow(missing_debug_implementations)]
pub struct AsyncClientBinding {
    endpoint: Arc<dyn AsyncEndpointClient>,
    registry: Arc<SessionRegistry>,
    open_timeout: Duration,
    request_timeout: Duration,
}

impl AsyncClientBinding {
    pub(crate) fn new(
        endpoint: Arc<dyn AsyncEndpointClient>,
        registry: Arc<SessionRegistry>,
        open_timeout: Duration,
        request_timeout: Duration,
    ) -> Self {
        Self {
            endpoint,
            registry,
            open_timeout,
            request_timeout,
        }
    }
}

#[async_trait]
impl ClientBinding for AsyncClientBinding {
    async fn open(&self, session_id: &SessionId) -> Result<(), Error> {
        let opened = self.registry.wait_channel_open(session_id)?;
        self.endpoint.open_session(session_id).await?;
        match timeout(self.open_timeout, opened).await {
            Ok(Ok(())) => Ok(()),
            Ok(Err(_)) => Err(Error::transport(format!(
                "session {session_id} closed during open handshake"
            ))),
            Err(_) => Err(Error::ChannelNotOpen(session_id.clone())),
        }
    }

    async fn exchange(
        &self,
        session_id: &SessionId,
        outbound: Option<MessageEnvelope>,
    ) -> Result<MessageEnvelope, Error> {
        if outbound.is_some() && !self.registry.channel_open(session_id) {
            return Err(Error::ChannelNotOpen(session_id.clone()));
        }
        let reply = self.registry.next_message(session_id)?;
        if let Some(envelope) = outbound {
            self.endpoint.send_message(envelope).await?;
        }
        match timeout(self.request_timeout, reply).await {
            Ok(Ok(envelope)) => Ok(envelope),
            Ok(Err(_)) => Err(Error::transport(format!(
                "channel for session {session_id} dropped before a terminal reply"
            ))),
            Err(_) => Err(Error::RemoteExecution {
                kind: ErrorKind::Timeout,
                message: format!(
                    "no reply for session {session_id} within {:?}",
                    self.request_timeout
                ),
            }),
        }
    }

    async fn close(&self, session_id: &SessionId) {
        if let Err(e) = self.endpoint.close_session(session_id).await {
            debug!(session = %session_id, error = %e, "error while closing channel");
        }
    }
}
