//! Log output setup.
//!
//! Logs go to stderr so stdout only carries the console front-end's output.
//! `RUST_LOG` overrides the default filter.

use tracing::Subscriber;
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

fn default_filter(debug: bool) -> &'static str {
    if debug {
        "nfc_spool_scanner=debug,info"
    } else {
        "nfc_spool_scanner=info"
    }
}

fn subscriber(filter: EnvFilter) -> impl Subscriber + Send + Sync {
    tracing_subscriber::registry().with(filter).with(
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_target(false)
            .with_thread_ids(false)
            .with_file(false)
            .with_line_number(false)
            .compact(),
    )
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(debug: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter(debug)));

    let _ = subscriber(filter).try_init();
}
