//! Logging initialization.
//!
//! With `--verbose` logs go to stderr at debug level. Otherwise they are
//! appended to `logs/storyline.log` inside the library directory so command
//! output on stdout stays pure JSON.

use std::path::{Path, PathBuf};
use storyline_util::log::{LogConfig, LogLevel};
use tracing_subscriber::EnvFilter;

/// Initialize logging. Returns the log file path if logging to a file.
pub fn init_logging(verbose: bool, level: LogLevel, data_dir: &Path) -> Option<PathBuf> {
    if verbose {
        storyline_util::log::init(LogConfig {
            print: true,
            level: LogLevel::Debug,
            include_location: false,
        });
        return None;
    }

    let log_dir = get_log_dir(data_dir);
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Warning: Could not create log directory: {e}");
        return None;
    }

    let log_file = log_dir.join("storyline.log");
    let file = match std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&log_file)
    {
        Ok(f) => f,
        Err(e) => {
            eprintln!("Warning: Could not open log file: {e}");
            return None;
        }
    };

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level.as_str()));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(false)
        .with_writer(file)
        .try_init();

    Some(log_file)
}

/// Log directory for a library.
pub fn get_log_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("logs")
}
