//! Tag scanning for contactless readers.
//!
//! This module holds the backend-independent parts of scanning: reader
//! selection, decoding of the GET-UID response, classification of reader
//! faults and the blocking poll loop. Backends only have to provide a
//! [`TagReader`] and a `start_scan` entry point.

#[cfg(feature = "pcsc")]
pub mod pcsc;

pub mod stdin;

use crate::tag_uid::{ParseUidError, TagUid};
use std::time::Duration;
use thiserror::Error;
use tokio::sync::mpsc;

/// No contactless reader is attached to the system.
#[derive(Error, Debug, Clone, PartialEq)]
#[error("no smart card reader found")]
pub struct NoReaderError;

/// A poll failed for a reason other than "no tag present".
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ReadError {
    /// The reader or smart card service reported an unexpected failure
    #[error("reader error: {0}")]
    Reader(String),
    /// The smart card service is gone; the backend keeps trying to reconnect
    #[error("smart card service unavailable: {0}")]
    Unavailable(String),
    /// A simulated identifier could not be parsed
    #[error("invalid tag input: {0}")]
    InvalidInput(#[from] ParseUidError),
}

/// Outcome of a single poll: the UID on the reader, nothing, or a read failure.
pub type PollResult = Result<Option<TagUid>, ReadError>;

/// Error type for starting a scanner backend.
#[derive(Error, Debug)]
pub enum ScanError {
    #[error(transparent)]
    NoReader(#[from] NoReaderError),
    /// Smart card service unavailable or reader enumeration failed
    #[error("smart card service error: {0}")]
    Reader(String),
}

/// Delay between two polls of the reader.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(300);

/// How long a single poll waits for a card to enter the field.
pub const DEFAULT_CARD_TIMEOUT: Duration = Duration::from_secs(1);

/// Channel buffer size for poll results.
pub const POLL_CHANNEL_BUFFER_SIZE: usize = 16;

/// Reader names containing one of these (case-insensitive) are preferred.
pub const READER_KEYWORDS: [&str; 3] = ["acr122", "acr 122", "nfc"];

/// PC/SC pseudo-APDU asking the reader for the UID of the card in the field.
pub const GET_UID_APDU: [u8; 5] = [0xFF, 0xCA, 0x00, 0x00, 0x00];

/// Status words signalling success (SW1 SW2).
pub const SW_SUCCESS: (u8, u8) = (0x90, 0x00);

/// Consecutive sharing violations after which a warning is logged.
pub const SHARING_VIOLATION_WARN_THRESHOLD: u32 = 20;

/// Available scanner backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Backend {
    /// PC/SC smart card service (ACR122U and compatible readers)
    #[cfg(feature = "pcsc")]
    Pcsc,
    /// Read tag UIDs typed on standard input (no hardware required)
    Stdin,
}

impl Default for Backend {
    fn default() -> Self {
        #[cfg(feature = "pcsc")]
        return Backend::Pcsc;
        #[cfg(not(feature = "pcsc"))]
        return Backend::Stdin;
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            #[cfg(feature = "pcsc")]
            Backend::Pcsc => write!(f, "pcsc"),
            Backend::Stdin => write!(f, "stdin"),
        }
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            #[cfg(feature = "pcsc")]
            "pcsc" | "reader" => Ok(Backend::Pcsc),
            "stdin" | "simulate" => Ok(Backend::Stdin),
            _ => Err(format!("Unknown backend: {}", s)),
        }
    }
}

/// Timing of the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollSettings {
    pub interval: Duration,
    pub card_timeout: Duration,
}

impl Default for PollSettings {
    fn default() -> Self {
        Self {
            interval: DEFAULT_POLL_INTERVAL,
            card_timeout: DEFAULT_CARD_TIMEOUT,
        }
    }
}

/// The reader chosen from an enumeration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReaderSelection {
    /// Position in the enumerated list
    pub index: usize,
    pub name: String,
    /// `false` when no name matched [`READER_KEYWORDS`] and the first reader was taken
    pub matched: bool,
}

/// Pick a reader from the enumerated names.
///
/// Prefers the first name matching [`READER_KEYWORDS`], falls back to the
/// first reader so compatible hardware sold under another name still works,
/// and fails only when nothing is attached.
pub fn select_reader<S: AsRef<str>>(names: &[S]) -> Result<ReaderSelection, NoReaderError> {
    let matching = names.iter().position(|name| {
        let lower = name.as_ref().to_lowercase();
        READER_KEYWORDS.iter().any(|keyword| lower.contains(keyword))
    });

    match (matching, names.first()) {
        (Some(index), _) => {
            let name = names[index].as_ref().to_string();
            tracing::info!(reader = %name, "found matching reader");
            Ok(ReaderSelection {
                index,
                name,
                matched: true,
            })
        }
        (None, Some(first)) => {
            let name = first.as_ref().to_string();
            tracing::warn!(reader = %name, "no ACR122U reader found, using first reader");
            Ok(ReaderSelection {
                index: 0,
                name,
                matched: false,
            })
        }
        (None, None) => Err(NoReaderError),
    }
}

/// Decode the reader's response to [`GET_UID_APDU`].
///
/// The last two bytes are the status words. Only `90 00` carries a UID; any
/// other status means a card is present but does not support the command,
/// which is treated like an empty field.
pub fn decode_uid_response(response: &[u8]) -> Option<TagUid> {
    let split = response.len().checked_sub(2)?;
    let (payload, status) = response.split_at(split);

    if (status[0], status[1]) == SW_SUCCESS && !payload.is_empty() {
        Some(TagUid::from(payload))
    } else {
        tracing::debug!(
            sw1 = format_args!("{:02X}", status[0]),
            sw2 = format_args!("{:02X}", status[1]),
            "reading the UID failed"
        );
        None
    }
}

/// Reader failure classes relevant to the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReaderFault {
    /// No card in the field (or it left mid-transaction)
    NoCard,
    /// Waiting for a card timed out
    Timeout,
    /// Another process (often the OS card service) holds the reader
    SharingViolation,
    Other(String),
}

/// Counts sharing violations so that a reader persistently held by another
/// process shows up in the logs. Diagnostic only: the violation itself is
/// still reported to the loop as "no tag".
#[derive(Debug, Default)]
pub struct SharingViolationMonitor {
    consecutive: u32,
    total: u64,
}

impl SharingViolationMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one violation. Returns `true` if this one triggered the warning,
    /// which happens once per run of consecutive violations.
    pub fn record(&mut self) -> bool {
        self.consecutive += 1;
        self.total += 1;
        tracing::trace!(
            consecutive = self.consecutive,
            total = self.total,
            "sharing violation"
        );

        let warn = self.consecutive == SHARING_VIOLATION_WARN_THRESHOLD;
        if warn {
            tracing::warn!(
                consecutive = self.consecutive,
                "reader keeps reporting sharing violations, is another program using it?"
            );
        }
        warn
    }

    pub fn reset(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }

    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Map a reader fault onto a poll outcome.
///
/// Timeouts, an empty field and sharing violations are part of normal
/// polling and become `Ok(None)`.
pub fn classify_fault(fault: ReaderFault, monitor: &mut SharingViolationMonitor) -> PollResult {
    match fault {
        ReaderFault::SharingViolation => {
            monitor.record();
            Ok(None)
        }
        ReaderFault::NoCard | ReaderFault::Timeout => {
            monitor.reset();
            Ok(None)
        }
        ReaderFault::Other(cause) => {
            monitor.reset();
            Err(ReadError::Reader(cause))
        }
    }
}

/// A source of tag readings polled by [`run_poll_loop`].
pub trait TagReader {
    fn poll_once(&mut self) -> PollResult;
}

/// Poll `reader` until the receiving side of `tx` is dropped.
///
/// Blocking: run it on a dedicated thread (`spawn_blocking`). The loop exits
/// after the poll during which the receiver went away.
pub fn run_poll_loop<R: TagReader>(
    reader: &mut R,
    tx: mpsc::Sender<PollResult>,
    interval: Duration,
) {
    loop {
        let result = reader.poll_once();
        if tx.blocking_send(result).is_err() {
            tracing::debug!("poll receiver closed, stopping poll loop");
            break;
        }
        std::thread::sleep(interval);
    }
}

/// Parse a duration such as `300ms`, `1s`, `2m`; a bare number is seconds.
///
/// # Examples
/// ```
/// use nfc_spool_scanner::scanner::parse_duration;
/// use std::time::Duration;
///
/// assert_eq!(parse_duration("300ms").unwrap(), Duration::from_millis(300));
/// assert_eq!(parse_duration("2").unwrap(), Duration::from_secs(2));
/// ```
pub fn parse_duration(src: &str) -> Result<Duration, String> {
    let src = src.trim();
    if src.is_empty() {
        return Err("empty duration string".to_string());
    }

    // "ms" must be tried before "m" and "s"
    const UNITS: [(&str, u64); 4] = [("ms", 1), ("h", 3_600_000), ("m", 60_000), ("s", 1_000)];

    let (number, millis_per_unit) = UNITS
        .iter()
        .find_map(|(suffix, factor)| src.strip_suffix(suffix).map(|n| (n, *factor)))
        .unwrap_or((src, 1_000));

    let value: u64 = number
        .trim()
        .parse()
        .map_err(|_| format!("invalid duration: {}", src))?;

    value
        .checked_mul(millis_per_unit)
        .map(Duration::from_millis)
        .ok_or_else(|| format!("duration too large: {}", src))
}

/// Start polling with the specified backend.
///
/// Locates the reader first, so a missing reader is reported here rather than
/// through the returned channel.
pub async fn start_scan(
    backend: Backend,
    settings: PollSettings,
) -> Result<mpsc::Receiver<PollResult>, ScanError> {
    match backend {
        #[cfg(feature = "pcsc")]
        Backend::Pcsc => pcsc::start_scan(settings).await,
        Backend::Stdin => stdin::start_scan(settings).await,
    }
}
