//! Plain-text console front-end.

use super::FrontEndSink;
use crate::lookup::{LookupResult, SpoolRecord};
use crate::scan_event::ScanEvent;
use crate::tag_uid::TagUid;
use std::io::{self, Write};

/// Terminal bell.
const BELL: &str = "\x07";

/// Bells rung for a known spool.
const FOUND_BELLS: usize = 2;

/// Bells rung for a tag with no spool attached.
const UNKNOWN_BELLS: usize = 3;

/// Renders scan events as human-readable text.
pub struct ConsoleSink<W> {
    out: W,
    sound: bool,
    scan_count: u64,
}

impl<W: Write + Send> ConsoleSink<W> {
    /// Create a sink writing to `out`; `sound` rings the terminal bell on results.
    pub fn new(out: W, sound: bool) -> Self {
        Self {
            out,
            sound,
            scan_count: 0,
        }
    }

    pub fn into_inner(self) -> W {
        self.out
    }

    fn bell(&mut self, count: usize) -> io::Result<()> {
        if self.sound {
            write!(self.out, "{}", BELL.repeat(count))?;
        }
        Ok(())
    }

    fn write_arrived(&mut self, uid: &TagUid) -> io::Result<()> {
        self.scan_count += 1;
        writeln!(
            self.out,
            "Scan #{} - UID: {} ({})",
            self.scan_count,
            uid,
            uid.family()
        )?;
        self.out.flush()
    }

    fn write_removed(&mut self) -> io::Result<()> {
        writeln!(self.out, "Tag removed - ready for next scan")?;
        writeln!(self.out)?;
        self.out.flush()
    }

    fn write_spool(&mut self, spool: &SpoolRecord) -> io::Result<()> {
        writeln!(self.out, "Spool found: #{}", spool.id)?;

        let material = spool.material.as_deref().unwrap_or("N/A");
        let details: Vec<&str> = [spool.filament_type.as_deref(), spool.color_name.as_deref()]
            .into_iter()
            .flatten()
            .collect();
        if details.is_empty() {
            writeln!(self.out, "  Material:  {material}")?;
        } else {
            writeln!(self.out, "  Material:  {material} ({})", details.join(", "))?;
        }

        write!(
            self.out,
            "  Weight:    {}g / {}g",
            spool.remaining_weight, spool.total_weight
        )?;
        match spool.remaining_percent() {
            Some(percent) => writeln!(self.out, " ({percent:.0}%)")?,
            None => writeln!(self.out)?,
        }

        writeln!(
            self.out,
            "  Location:  {}",
            spool.location.as_deref().unwrap_or("not set")
        )
    }

    fn write_result(&mut self, event: &ScanEvent) -> io::Result<()> {
        match &event.result {
            LookupResult::Found { spool, .. } => {
                self.write_spool(spool)?;
                self.bell(FOUND_BELLS)?;
            }
            LookupResult::NotFound => {
                writeln!(self.out, "Unknown tag UID: {}", event.uid)?;
                writeln!(
                    self.out,
                    "  No spool registered for this tag, register it in the web app"
                )?;
                self.bell(UNKNOWN_BELLS)?;
            }
            LookupResult::TransportError(err) => {
                writeln!(self.out, "Lookup failed for {}: {}", event.uid, err)?;
            }
        }
        self.out.flush()
    }
}

impl<W: Write + Send> FrontEndSink for ConsoleSink<W> {
    fn on_arrived(&mut self, uid: &TagUid) {
        if let Err(err) = self.write_arrived(uid) {
            tracing::warn!(%err, "failed to write to console");
        }
    }

    fn on_removed(&mut self) {
        if let Err(err) = self.write_removed() {
            tracing::warn!(%err, "failed to write to console");
        }
    }

    fn on_lookup_result(&mut self, event: &ScanEvent) {
        if let Err(err) = self.write_result(event) {
            tracing::warn!(%err, "failed to write to console");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lookup::TransportError;
    use crate::test_utils::{TEST_UID, found, spool};
    use std::time::SystemTime;

    fn event(result: LookupResult) -> ScanEvent {
        ScanEvent {
            uid: TagUid::new(TEST_UID),
            timestamp: SystemTime::UNIX_EPOCH,
            result,
        }
    }

    fn render(sound: bool, f: impl FnOnce(&mut ConsoleSink<Vec<u8>>)) -> String {
        let mut sink = ConsoleSink::new(Vec::new(), sound);
        f(&mut sink);
        String::from_utf8(sink.into_inner()).unwrap()
    }

    #[test]
    fn test_arrivals_are_numbered() {
        let out = render(false, |sink| {
            sink.on_arrived(&TagUid::new(TEST_UID));
            sink.on_removed();
            sink.on_arrived(&TagUid::new([0x01, 0x02, 0x03, 0x04]));
        });

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[0], "Scan #1 - UID: 04A23B11000007 (NTAG213)");
        assert_eq!(lines[1], "Tag removed - ready for next scan");
        assert_eq!(lines[3], "Scan #2 - UID: 01020304 (unknown (4 byte UID))");
    }

    #[test]
    fn test_found_spool() {
        let out = render(false, |sink| {
            sink.on_lookup_result(&event(found(5, "PLA", 450.0, 1000.0)));
        });

        assert!(out.contains("Spool found: #5"));
        assert!(out.contains("Material:  PLA\n"));
        assert!(out.contains("Weight:    450g / 1000g (45%)"));
        assert!(out.contains("Location:  not set"));
        assert!(!out.contains(BELL));
    }

    #[test]
    fn test_found_spool_with_details() {
        let mut record = spool(9, "PETG", 812.5, 1000.0);
        record.filament_type = Some("PETG Basic".to_string());
        record.color_name = Some("Black".to_string());
        record.location = Some("Shelf B".to_string());

        let out = render(false, |sink| {
            sink.on_lookup_result(&event(LookupResult::Found {
                spool: record,
                nfc_info: None,
            }));
        });

        assert!(out.contains("Material:  PETG (PETG Basic, Black)"));
        assert!(out.contains("Weight:    812.5g / 1000g (81%)"));
        assert!(out.contains("Location:  Shelf B"));
    }

    #[test]
    fn test_unknown_tag() {
        let out = render(false, |sink| {
            sink.on_lookup_result(&event(LookupResult::NotFound));
        });
        assert!(out.starts_with("Unknown tag UID: 04A23B11000007\n"));
    }

    #[test]
    fn test_transport_error() {
        let out = render(false, |sink| {
            sink.on_lookup_result(&event(LookupResult::TransportError(
                TransportError::Status {
                    code: 500,
                    excerpt: "Database error".to_string(),
                },
            )));
        });
        assert_eq!(out, "Lookup failed for 04A23B11000007: HTTP 500: Database error\n");
    }

    #[test]
    fn test_bells_only_with_sound() {
        let found_out = render(true, |sink| {
            sink.on_lookup_result(&event(found(5, "PLA", 450.0, 1000.0)));
        });
        assert_eq!(found_out.matches(BELL).count(), FOUND_BELLS);

        let unknown_out = render(true, |sink| {
            sink.on_lookup_result(&event(LookupResult::NotFound));
        });
        assert_eq!(unknown_out.matches(BELL).count(), UNKNOWN_BELLS);

        let error_out = render(true, |sink| {
            sink.on_lookup_result(&event(LookupResult::TransportError(
                TransportError::Network("connection refused".to_string()),
            )));
        });
        assert!(!error_out.contains(BELL));
    }
}
