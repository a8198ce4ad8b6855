//! Scan event handed to front-ends.

use crate::lookup::LookupResult;
use crate::tag_uid::TagUid;
use std::time::SystemTime;

/// A completed scan: the tag that arrived, when, and what the lookup found.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanEvent {
    pub uid: TagUid,
    /// Time the tag arrived on the reader (not when the lookup finished)
    pub timestamp: SystemTime,
    pub result: LookupResult,
}
