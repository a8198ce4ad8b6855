//! `nfc-spool-scanner` library.
//!
//! The binary (`src/main.rs`) is responsible for configuration, CLI parsing
//! and process exit codes. The scan service lives in [`crate::app`] where it
//! can be tested deterministically with an injected scanner, lookup and sink.

pub mod app;
pub mod config;
pub mod logging;
pub mod lookup;
pub mod presence;
pub mod scan_event;
pub mod scanner;
pub mod sink;
pub mod tag_uid;

#[cfg(test)]
mod test_utils;

// Re-export commonly used types at the crate root
pub use app::{Options, RunError, SessionStats, run_with_sink};
pub use config::{Config, LoadOutcome};
pub use lookup::{Lookup, LookupClient, LookupResult, SpoolRecord, TransportError};
pub use presence::{PresenceEvent, PresenceTracker};
pub use scan_event::ScanEvent;
pub use scanner::{Backend, PollResult, ReadError, ScanError, parse_duration};
pub use sink::FrontEndSink;
pub use sink::console::ConsoleSink;
pub use tag_uid::{TagFamily, TagUid};
