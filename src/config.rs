//! Scanner configuration from a `KEY=VALUE` file (`config.ini`).
//!
//! ```text
//! # inventory server
//! API_URL=https://filament.example.org
//! SCANNER_ID=workshop_01
//! ENABLE_SOUND=1
//! DEBUG_MODE=0
//! ```
//!
//! Blank lines and `#` comments are skipped, unknown keys ignored. A missing
//! or broken file never stops the scanner: defaults are used instead.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use url::Url;

pub const DEFAULT_CONFIG_FILE: &str = "config.ini";
pub const DEFAULT_API_URL: &str = "http://localhost:8000";
pub const DEFAULT_SCANNER_ID: &str = "acr122u_001";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("invalid value for {key} on line {line}: {reason}")]
    InvalidValue {
        key: String,
        line: usize,
        reason: String,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Base URL of the inventory service (lookups go to `<api_url>/nfc_lookup.php`)
    pub api_url: String,
    /// Identifies this scanner to the service
    pub scanner_id: String,
    pub enable_sound: bool,
    pub debug_mode: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            scanner_id: DEFAULT_SCANNER_ID.to_string(),
            enable_sound: true,
            debug_mode: false,
        }
    }
}

/// How [`Config::load_or_default`] arrived at its result.
#[derive(Debug)]
pub enum LoadOutcome {
    Loaded,
    /// No file at the path; defaults used
    Missing,
    /// The file could not be used; defaults used
    Fallback(ConfigError),
}

impl Config {
    /// Parse configuration text. Keys not present keep their defaults.
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        let mut config = Config::default();

        for (index, raw) in content.lines().enumerate() {
            let line = raw.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let Some((key, value)) = line.split_once('=') else {
                continue;
            };
            let (key, value) = (key.trim(), value.trim());
            let invalid = |reason: String| ConfigError::InvalidValue {
                key: key.to_string(),
                line: index + 1,
                reason,
            };

            match key {
                "API_URL" => {
                    let url = Url::parse(value).map_err(|e| invalid(e.to_string()))?;
                    if !matches!(url.scheme(), "http" | "https") {
                        return Err(invalid(format!("unsupported scheme '{}'", url.scheme())));
                    }
                    config.api_url = value.to_string();
                }
                "SCANNER_ID" => {
                    if value.is_empty() {
                        return Err(invalid("scanner id must not be empty".to_string()));
                    }
                    config.scanner_id = value.to_string();
                }
                "ENABLE_SOUND" => config.enable_sound = value == "1",
                "DEBUG_MODE" => config.debug_mode = value == "1",
                _ => {}
            }
        }

        Ok(config)
    }

    /// Read and parse the file at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::parse(&content)
    }

    /// Like [`Config::load`], but falls back to defaults on any problem.
    ///
    /// Logging is usually configured from the result, so reporting the
    /// outcome is left to the caller.
    pub fn load_or_default(path: &Path) -> (Self, LoadOutcome) {
        match Self::load(path) {
            Ok(config) => (config, LoadOutcome::Loaded),
            Err(ConfigError::Io { source, .. }) if source.kind() == io::ErrorKind::NotFound => {
                (Config::default(), LoadOutcome::Missing)
            }
            Err(err) => (Config::default(), LoadOutcome::Fallback(err)),
        }
    }
}
