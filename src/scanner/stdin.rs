//! Simulation backend reading tag UIDs from standard input.
//!
//! Every line entered is treated as a tag being placed on the reader and
//! taken off again, so typing the same UID twice performs two lookups.
//! `quit`, `exit`, `q`, an empty line or end of input stop the scan.

use super::{POLL_CHANNEL_BUFFER_SIZE, PollResult, PollSettings, ReadError, ScanError};
use crate::tag_uid::TagUid;
use std::io::BufRead;
use tokio::sync::mpsc;

const QUIT_COMMANDS: [&str; 3] = ["quit", "exit", "q"];

/// Interpret one line of input. `None` ends the simulation.
fn parse_line(line: &str) -> Option<Result<TagUid, ReadError>> {
    let line = line.trim();
    if line.is_empty() || QUIT_COMMANDS.contains(&line.to_lowercase().as_str()) {
        return None;
    }
    Some(line.parse::<TagUid>().map_err(ReadError::from))
}

fn feed<R: BufRead>(input: R, tx: mpsc::Sender<PollResult>) {
    for line in input.lines() {
        let line = match line {
            Ok(line) => line,
            Err(err) => {
                tracing::warn!(%err, "failed to read input");
                break;
            }
        };

        let outcome = match parse_line(&line) {
            Some(Ok(uid)) => vec![Ok(Some(uid)), Ok(None)],
            Some(Err(err)) => vec![Err(err)],
            None => break,
        };
        for result in outcome {
            if tx.blocking_send(result).is_err() {
                return;
            }
        }
    }
    tracing::debug!("simulation input finished");
}

/// Start a simulated scan over an arbitrary line source.
pub fn start_scan_from<R>(input: R) -> mpsc::Receiver<PollResult>
where
    R: BufRead + Send + 'static,
{
    let (tx, rx) = mpsc::channel(POLL_CHANNEL_BUFFER_SIZE);
    tokio::task::spawn_blocking(move || feed(input, tx));
    rx
}

/// Start a simulated scan reading from the process's standard input.
pub async fn start_scan(_settings: PollSettings) -> Result<mpsc::Receiver<PollResult>, ScanError> {
    tracing::info!("simulation mode: enter tag UIDs as hex, 'quit' to stop");
    Ok(start_scan_from(std::io::BufReader::new(std::io::stdin())))
}
