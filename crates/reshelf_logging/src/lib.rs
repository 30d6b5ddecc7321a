//! Logging and home-directory resolution for the reshelf binary.
//!
//! Everything goes to one file, `<home>/logs/reshelf.log`. A run that finds
//! the file over [`MAX_LOG_BYTES`] moves it to `reshelf.log.1` first, so at
//! most one previous generation is kept. The console layer writes to stderr,
//! leaving stdout to reports.

use anyhow::{Context, Result};
use std::fs::{self, File, OpenOptions};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const DEFAULT_LOG_FILTER: &str = "reshelf=info";
const LOG_FILE_NAME: &str = "reshelf.log";
const PREVIOUS_LOG_FILE_NAME: &str = "reshelf.log.1";

/// Size at which the log is set aside at startup.
pub const MAX_LOG_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Debug, Clone, Copy, Default)]
pub struct LogConfig {
    /// Mirror the file filter on the console (`-v`)
    pub verbose: bool,
    /// Warnings only on the console, for `--json` runs
    pub quiet_console: bool,
}

/// Install the global subscriber. Returns the log file path.
pub fn init_logging(config: LogConfig) -> Result<PathBuf> {
    let dir = logs_dir();
    let file = open_log_file(&dir)
        .with_context(|| format!("Failed to open log file in {}", dir.display()))?;

    let file_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let console_filter = if config.quiet_console && !config.verbose {
        EnvFilter::new("warn")
    } else {
        file_filter.clone()
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(Arc::new(file))
                .with_ansi(false)
                .with_filter(file_filter),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false)
                .with_filter(console_filter),
        )
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(dir.join(LOG_FILE_NAME))
}

/// Resolve the reshelf home directory.
///
/// Priority:
/// 1) RESHELF_HOME
/// 2) ~/.reshelf
/// 3) ./.reshelf
pub fn reshelf_home() -> PathBuf {
    if let Ok(override_path) = std::env::var("RESHELF_HOME") {
        return PathBuf::from(override_path);
    }
    dirs::home_dir()
        .map(|home| home.join(".reshelf"))
        .unwrap_or_else(|| PathBuf::from(".").join(".reshelf"))
}

/// ~/.reshelf/logs
pub fn logs_dir() -> PathBuf {
    reshelf_home().join("logs")
}

/// Open `dir/reshelf.log` for appending, setting an oversized log aside.
fn open_log_file(dir: &Path) -> io::Result<File> {
    fs::create_dir_all(dir)?;
    let current = dir.join(LOG_FILE_NAME);

    match fs::metadata(&current) {
        Ok(meta) if meta.len() > MAX_LOG_BYTES => {
            // rename replaces the previous generation
            fs::rename(&current, dir.join(PREVIOUS_LOG_FILE_NAME))?;
        }
        Ok(_) => {}
        Err(err) if err.kind() == io::ErrorKind::NotFound => {}
        Err(err) => return Err(err),
    }

    OpenOptions::new().create(true).append(true).open(current)
}
