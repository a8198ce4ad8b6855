//! Tag presence tracking.
//!
//! The reader is polled on a fixed cadence and reports the UID of whatever
//! tag is in the field on every poll. This module turns that stream of raw
//! readings into discrete arrival/removal events so a tag resting on the
//! reader is only looked up once.

use crate::tag_uid::TagUid;

/// Whether a tag is currently on the reader, and which one.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum PresenceState {
    #[default]
    Absent,
    Present(TagUid),
}

/// A change in tag presence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    /// A tag that is not the current one was read.
    Arrived(TagUid),
    /// The current tag is no longer read.
    Removed,
}

/// State machine tracking the tag currently on the reader.
///
/// A different UID replaces the current one without an intermediate
/// `Removed`: at the poll cadence used the reader cannot always observe the
/// empty field between two tags.
#[derive(Debug, Default)]
pub struct PresenceTracker {
    state: PresenceState,
}

impl PresenceTracker {
    /// Create a tracker in the `Absent` state.
    ///
    /// # Example
    /// ```
    /// use nfc_spool_scanner::presence::{PresenceEvent, PresenceTracker};
    /// use nfc_spool_scanner::TagUid;
    ///
    /// let mut tracker = PresenceTracker::new();
    /// let uid = TagUid::new([0x04, 0xA2, 0x3B, 0x11]);
    ///
    /// assert_eq!(tracker.observe(Some(uid.clone())), Some(PresenceEvent::Arrived(uid.clone())));
    /// assert_eq!(tracker.observe(Some(uid)), None);
    /// assert_eq!(tracker.observe(None), Some(PresenceEvent::Removed));
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    /// Feed the outcome of one poll and return the event it causes, if any.
    pub fn observe(&mut self, reading: Option<TagUid>) -> Option<PresenceEvent> {
        match (&self.state, reading) {
            (PresenceState::Present(current), Some(uid)) if *current == uid => None,
            (_, Some(uid)) => {
                self.state = PresenceState::Present(uid.clone());
                Some(PresenceEvent::Arrived(uid))
            }
            (PresenceState::Present(_), None) => {
                self.state = PresenceState::Absent;
                Some(PresenceEvent::Removed)
            }
            (PresenceState::Absent, None) => None,
        }
    }
}
