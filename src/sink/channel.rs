//! Sink forwarding events to another task, e.g. a GUI event loop.

use super::FrontEndSink;
use crate::scan_event::ScanEvent;
use crate::tag_uid::TagUid;
use tokio::sync::mpsc;

/// Events delivered by [`ChannelSink`].
#[derive(Debug, Clone, PartialEq)]
pub enum SinkEvent {
    Arrived(TagUid),
    Removed,
    LookupResult(ScanEvent),
}

/// Forwards every callback as a [`SinkEvent`].
///
/// Sending never blocks; once the receiver is dropped events are discarded.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: mpsc::UnboundedSender<SinkEvent>,
}

impl ChannelSink {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<SinkEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    fn send(&self, event: SinkEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("sink receiver dropped, discarding event");
        }
    }
}

impl FrontEndSink for ChannelSink {
    fn on_arrived(&mut self, uid: &TagUid) {
        self.send(SinkEvent::Arrived(uid.clone()));
    }

    fn on_removed(&mut self) {
        self.send(SinkEvent::Removed);
    }

    fn on_lookup_result(&mut self, event: &ScanEvent) {
        self.send(SinkEvent::LookupResult(event.clone()));
    }
}
