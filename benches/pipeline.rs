//! Benchmarks for the scan pipeline.
//!
//! The app benchmarks feed canned poll results through `run_with_sink` with
//! a fake scanner and an in-memory lookup, the same way the tests in app.rs
//! drive the service loop.

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use nfc_spool_scanner::app::{Options, Scanner, run_with_sink};
use nfc_spool_scanner::lookup::{Lookup, LookupResult};
use nfc_spool_scanner::scanner::PollSettings;
use nfc_spool_scanner::{Backend, ConsoleSink, PollResult, PresenceTracker, ScanError, TagUid};
use std::future::Future;
use std::path::PathBuf;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Runtime;
use tokio::sync::mpsc;

fn tag(index: u8) -> TagUid {
    TagUid::new([0x04, 0xA2, 0x3B, index, 0x00, 0x00, 0x07])
}

/// Place `tags` distinct tags in turn, each seen for `dwell` polls and
/// followed by an empty poll.
fn sessions(tags: u8, dwell: usize) -> Vec<PollResult> {
    let mut polls = Vec::new();
    for i in 0..tags {
        polls.extend(std::iter::repeat_n(Ok(Some(tag(i))), dwell));
        polls.push(Ok(None));
    }
    polls
}

struct FakeScanner {
    results: Vec<PollResult>,
}

impl Scanner for FakeScanner {
    fn start_scan(
        &self,
        _backend: Backend,
        _settings: PollSettings,
    ) -> Pin<Box<dyn Future<Output = Result<mpsc::Receiver<PollResult>, ScanError>> + Send + '_>>
    {
        let results = self.results.clone();
        Box::pin(async move {
            let (tx, rx) = mpsc::channel::<PollResult>(results.len().max(1));
            tokio::spawn(async move {
                for r in results {
                    let _ = tx.send(r).await;
                }
            });
            Ok(rx)
        })
    }
}

/// Answers every lookup immediately with "not registered".
struct InstantLookup;

impl Lookup for InstantLookup {
    fn lookup<'a>(
        &'a self,
        _uid: &'a TagUid,
    ) -> Pin<Box<dyn Future<Output = LookupResult> + Send + 'a>> {
        Box::pin(async { LookupResult::NotFound })
    }
}

fn default_options() -> Options {
    Options {
        config: PathBuf::from("config.ini"),
        backend: Backend::Stdin,
        poll_interval: Duration::from_millis(300),
        verbose: false,
    }
}

/// Presence tracking alone: mostly "same tag still present" polls.
fn bench_presence_tracker(c: &mut Criterion) {
    let mut group = c.benchmark_group("presence_tracker");
    let polls: Vec<Option<TagUid>> = sessions(10, 50)
        .into_iter()
        .map(|r| r.ok().flatten())
        .collect();

    group.throughput(Throughput::Elements(polls.len() as u64));
    group.bench_function("10_tags_50_polls_each", |b| {
        b.iter(|| {
            let mut tracker = PresenceTracker::new();
            let mut events = 0usize;
            for reading in &polls {
                if tracker.observe(black_box(reading.clone())).is_some() {
                    events += 1;
                }
            }
            black_box(events)
        })
    });

    group.finish();
}

/// Full service loop: poll stream -> tracker -> lookup -> console sink
fn bench_app_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("app_pipeline");
    let rt = Runtime::new().unwrap();
    let lookup: Arc<dyn Lookup> = Arc::new(InstantLookup);

    for tags in [1u8, 10, 50] {
        let polls = sessions(tags, 5);
        group.throughput(Throughput::Elements(tags as u64));
        group.bench_with_input(BenchmarkId::from_parameter(tags), &polls, |b, polls| {
            b.iter(|| {
                let scanner = FakeScanner {
                    results: polls.clone(),
                };
                let options = default_options();
                let mut sink = ConsoleSink::new(Vec::<u8>::with_capacity(256), false);

                let stats = rt.block_on(async {
                    run_with_sink(
                        &options,
                        &scanner,
                        Arc::clone(&lookup),
                        &mut sink,
                        std::future::pending(),
                    )
                    .await
                    .unwrap()
                });

                debug_assert_eq!(stats.scans, tags as u64);
                black_box(sink.into_inner())
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_presence_tracker, bench_app_pipeline);
criterion_main!(benches);
