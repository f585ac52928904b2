//! Channel-based event delivery

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};

use crate::event::{PluginEvent, ReaderEvent, SessionEvent};

/// Sender for reader events
pub type ReaderEventSender = Sender<ReaderEvent>;
/// Receiver for reader events
pub type ReaderEventReceiver = Receiver<ReaderEvent>;

/// Sender for session events
pub type SessionEventSender = Sender<SessionEvent>;
/// Receiver for session events
pub type SessionEventReceiver = Receiver<SessionEvent>;

/// Sender for plugin events
pub type PluginEventSender = Sender<PluginEvent>;
/// Receiver for plugin events
pub type PluginEventReceiver = Receiver<PluginEvent>;

/// Create an unbounded channel for reader events
pub fn reader_event_channel() -> (ReaderEventSender, ReaderEventReceiver) {
    unbounded()
}

/// Create an unbounded channel for session events
pub fn session_event_channel() -> (SessionEventSender, SessionEventReceiver) {
    unbounded()
}

/// Create an unbounded channel for plugin events
pub fn plugin_event_channel() -> (PluginEventSender, PluginEventReceiver) {
    unbounded()
}

/// Create a bounded channel with the specified capacity for reader events
pub fn bounded_reader_event_channel(capacity: usize) -> (ReaderEventSender, ReaderEventReceiver) {
    bounded(capacity)
}

/// Create a bounded channel with the specified capacity for session events
pub fn bounded_session_event_channel(
    capacity: usize,
) -> (SessionEventSender, SessionEventReceiver) {
    bounded(capacity)
}

/// Create a bounded channel with the specified capacity for plugin events
pub fn bounded_plugin_event_channel(capacity: usize) -> (PluginEventSender, PluginEventReceiver) {
    bounded(capacity)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_flow_through_channels() {
        let (tx, rx) = reader_event_channel();
        tx.send(ReaderEvent::CardInserted {
            reader: "readerA".into(),
        })
        .unwrap();
        let event = rx.recv().unwrap();
        assert_eq!(event.reader(), "readerA");
    }

    #[test]
    fn bounded_channel_applies_backpressure() {
        let (tx, rx) = bounded_plugin_event_channel(1);
        tx.send(PluginEvent::ReaderReleased {
            reader: "r1".into(),
        })
        .unwrap();
        assert!(
            tx.try_send(PluginEvent::ReaderReleased {
                reader: "r2".into(),
            })
            .is_err()
        );
        drop(rx);
    }
}
