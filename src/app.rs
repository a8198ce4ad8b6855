//! Core scan service for `nfc-spool-scanner`.
//!
//! This module is intentionally decoupled from CLI parsing, configuration
//! files and process exit codes so it can be tested deterministically with
//! an injected scanner, lookup and sink.

use crate::config::DEFAULT_CONFIG_FILE;
use crate::lookup::{Lookup, LookupResult};
use crate::presence::{PresenceEvent, PresenceTracker};
use crate::scan_event::ScanEvent;
use crate::scanner::{Backend, PollResult, PollSettings, ReadError, ScanError};
use crate::sink::FrontEndSink;
use crate::tag_uid::TagUid;
use clap::Parser;
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::{JoinError, JoinSet};

/// Command line options of the console scanner.
#[derive(Parser, Debug, Clone)]
#[command(author, about, version)]
pub struct Options {
    /// Configuration file with KEY=VALUE lines (API_URL, SCANNER_ID, ENABLE_SOUND, DEBUG_MODE)
    #[arg(long, default_value = DEFAULT_CONFIG_FILE)]
    pub config: PathBuf,

    /// Where tag UIDs are read from
    #[arg(long, default_value_t, value_enum)]
    pub backend: Backend,

    /// Delay between two reader polls.
    /// Accepts duration with suffix: 300ms, 1s.
    #[arg(long, default_value = "300ms", value_parser = crate::scanner::parse_duration)]
    pub poll_interval: Duration,

    /// Verbose output (debug logging)
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,
}

/// Errors returned by the scan service.
#[derive(Error, Debug)]
pub enum RunError {
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("failed to create lookup client: {0}")]
    Client(#[from] reqwest::Error),
}

/// Scanner abstraction to enable deterministic unit tests without a reader.
pub trait Scanner: Send + Sync {
    fn start_scan(
        &self,
        backend: Backend,
        settings: PollSettings,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<PollResult>, ScanError>> + Send + '_>>;
}

/// Real scanner implementation that delegates to the compiled-in backends.
#[derive(Debug, Default, Clone, Copy)]
pub struct RealScanner;

impl Scanner for RealScanner {
    fn start_scan(
        &self,
        backend: Backend,
        settings: PollSettings,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<PollResult>, ScanError>> + Send + '_>>
    {
        Box::pin(async move { crate::scanner::start_scan(backend, settings).await })
    }
}

/// Counters for the current run.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SessionStats {
    /// Tag arrivals (each one triggers a lookup)
    pub scans: u64,
    pub removals: u64,
    pub found: u64,
    pub not_found: u64,
    /// Lookups that ended in a transport error
    pub failed: u64,
}

impl SessionStats {
    fn record(&mut self, result: &LookupResult) {
        match result {
            LookupResult::Found { .. } => self.found += 1,
            LookupResult::NotFound => self.not_found += 1,
            LookupResult::TransportError(_) => self.failed += 1,
        }
    }
}

fn spawn_lookup(lookups: &mut JoinSet<ScanEvent>, lookup: Arc<dyn Lookup>, uid: TagUid) {
    let timestamp = SystemTime::now();
    lookups.spawn(async move {
        let result = lookup.lookup(&uid).await;
        ScanEvent {
            uid,
            timestamp,
            result,
        }
    });
}

fn deliver(
    joined: Result<ScanEvent, JoinError>,
    stats: &mut SessionStats,
    sink: &mut dyn FrontEndSink,
) {
    let event = match joined {
        Ok(event) => event,
        Err(err) => {
            stats.failed += 1;
            tracing::error!(%err, "lookup task failed");
            return;
        }
    };

    match &event.result {
        LookupResult::Found { spool, .. } => {
            tracing::info!(uid = %event.uid, spool = %spool.id, "spool found")
        }
        LookupResult::NotFound => tracing::info!(uid = %event.uid, "no spool registered for tag"),
        LookupResult::TransportError(err) => {
            tracing::warn!(uid = %event.uid, %err, "lookup failed")
        }
    }

    stats.record(&event.result);
    sink.on_lookup_result(&event);
}

/// Run the scan service until `shutdown` completes or the scanner stops.
///
/// - Every poll result goes through a [`PresenceTracker`]; arrivals and
///   removals are reported to `sink` straight away.
/// - Each arrival starts a lookup on its own task, so a slow service never
///   delays noticing the next tag. Results are reported as they complete.
/// - Read errors are logged and polling continues.
/// - On `shutdown`, pending lookups are abandoned. If the scanner ends by
///   itself (end of simulated input), pending lookups are awaited first.
pub async fn run_with_sink<F>(
    options: &Options,
    scanner: &dyn Scanner,
    lookup: Arc<dyn Lookup>,
    sink: &mut dyn FrontEndSink,
    shutdown: F,
) -> Result<SessionStats, RunError>
where
    F: Future<Output = ()>,
{
    let settings = PollSettings {
        interval: options.poll_interval,
        ..PollSettings::default()
    };
    let mut polls = scanner.start_scan(options.backend, settings).await?;

    let mut tracker = PresenceTracker::new();
    let mut lookups = JoinSet::new();
    let mut stats = SessionStats::default();

    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            () = &mut shutdown => {
                tracing::info!(pending_lookups = lookups.len(), "shutting down");
                return Ok(stats);
            }
            poll = polls.recv() => match poll {
                Some(Ok(reading)) => match tracker.observe(reading) {
                    Some(PresenceEvent::Arrived(uid)) => {
                        stats.scans += 1;
                        tracing::info!(
                            scan = stats.scans,
                            uid = %uid,
                            family = %uid.family(),
                            "tag arrived"
                        );
                        sink.on_arrived(&uid);
                        spawn_lookup(&mut lookups, Arc::clone(&lookup), uid);
                    }
                    Some(PresenceEvent::Removed) => {
                        stats.removals += 1;
                        tracing::debug!("tag removed");
                        sink.on_removed();
                    }
                    None => {}
                },
                // the backend reports the outage once; don't repeat it every poll
                Some(Err(err @ ReadError::Unavailable(_))) => {
                    tracing::debug!(%err, "tag read failed")
                }
                Some(Err(err)) => tracing::warn!(%err, "tag read failed"),
                None => break,
            },
            Some(joined) = lookups.join_next(), if !lookups.is_empty() => {
                deliver(joined, &mut stats, sink);
            }
        }
    }

    tracing::debug!(pending_lookups = lookups.len(), "scanner stopped");
    loop {
        tokio::select! {
            () = &mut shutdown => break,
            joined = lookups.join_next() => match joined {
                Some(joined) => deliver(joined, &mut stats, sink),
                None => break,
            },
        }
    }

    Ok(stats)
}
