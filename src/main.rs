use clap::Parser;
use nfc_spool_scanner::app::{self, Options, RealScanner, RunError, SessionStats};
use nfc_spool_scanner::config::{Config, LoadOutcome};
use nfc_spool_scanner::logging;
use nfc_spool_scanner::lookup::LookupClient;
use nfc_spool_scanner::scanner::ScanError;
use nfc_spool_scanner::sink::console::ConsoleSink;
use std::panic::{self, PanicHookInfo};
use std::sync::Arc;

/// Exit codes for the application
const EXIT_SUCCESS: i32 = 0;
const EXIT_ERROR: i32 = 1;
const EXIT_PANIC: i32 = 2;

fn report_config(config: &Config, outcome: &LoadOutcome, options: &Options) {
    let path = options.config.display();
    match outcome {
        LoadOutcome::Loaded => tracing::info!(%path, "configuration loaded"),
        LoadOutcome::Missing => {
            tracing::warn!(%path, "configuration file not found, using defaults")
        }
        LoadOutcome::Fallback(err) => {
            tracing::warn!(%err, "configuration file unusable, using defaults")
        }
    }
    tracing::info!(
        api_url = %config.api_url,
        scanner_id = %config.scanner_id,
        sound = config.enable_sound,
        backend = %options.backend,
        "scanner starting"
    );
}

fn print_troubleshooting() {
    eprintln!("Troubleshooting:");
    eprintln!("  - check the reader is plugged in (lsusb)");
    eprintln!("  - make sure the smart card service is running (pcscd)");
    eprintln!("  - unload conflicting kernel drivers (pn533_usb, nfc)");
    eprintln!("  - or try without hardware: --backend stdin");
}

/// Wire configuration, lookup client and console together and run until
/// Ctrl+C or the end of simulated input.
async fn run(options: Options, config: Config) -> Result<SessionStats, RunError> {
    let lookup = LookupClient::new(&config.api_url, &config.scanner_id)?;
    tracing::debug!(endpoint = lookup.endpoint(), "lookup client ready");

    let mut sink = ConsoleSink::new(std::io::stdout(), config.enable_sound);
    let shutdown = async {
        if let Err(err) = tokio::signal::ctrl_c().await {
            tracing::error!(%err, "failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    app::run_with_sink(&options, &RealScanner, Arc::new(lookup), &mut sink, shutdown).await
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    // Set up panic hook to ensure clean exit codes for process managers
    // (e.g., systemd) that monitor exit status
    panic::set_hook(Box::new(move |info: &PanicHookInfo| {
        eprintln!("Panic! {}", info);
        std::process::exit(EXIT_PANIC);
    }));

    let options = Options::parse();
    let (config, outcome) = Config::load_or_default(&options.config);
    logging::init(options.verbose || config.debug_mode);
    report_config(&config, &outcome, &options);

    match run(options, config).await {
        Ok(stats) => {
            println!("Total scans: {}", stats.scans);
            tracing::info!(
                scans = stats.scans,
                found = stats.found,
                not_found = stats.not_found,
                failed = stats.failed,
                "scanner stopped"
            );
            std::process::exit(EXIT_SUCCESS);
        }
        Err(why) => {
            eprintln!("error: {}", why);
            if matches!(why, RunError::Scan(ScanError::NoReader(_))) {
                print_troubleshooting();
            }
            std::process::exit(EXIT_ERROR);
        }
    }
}
