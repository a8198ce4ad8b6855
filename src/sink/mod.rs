//! Front-end sinks for scan events.
//!
//! The scan loop reports everything it observes through [`FrontEndSink`]
//! and never reads front-end state back. A console front-end renders the
//! events as text; graphical front-ends receive them over a channel.

pub mod channel;
pub mod console;

use crate::scan_event::ScanEvent;
use crate::tag_uid::TagUid;

/// Receiver of scan loop events.
///
/// Implementations must not block: they are called from the scan loop
/// itself. Failures are handled (logged) by the implementation.
pub trait FrontEndSink: Send {
    /// A new tag was placed on the reader; its lookup has been started.
    fn on_arrived(&mut self, uid: &TagUid);

    /// The tag left the reader.
    fn on_removed(&mut self);

    /// A lookup finished.
    fn on_lookup_result(&mut self, event: &ScanEvent);
}
