//! Logging initialization.
//!
//! Logs go to stderr unless a log file is given, so that command output on
//! stdout stays clean.

use postkeep_util::{LogConfig, LogLevel};
use std::path::PathBuf;

/// Initialize logging from the command line flags and the configured level.
pub fn init_logging(
    verbose: bool,
    level: Option<LogLevel>,
    file: Option<PathBuf>,
) -> anyhow::Result<()> {
    postkeep_util::log::init(LogConfig {
        level: level.unwrap_or_default(),
        verbose,
        include_location: verbose,
        file,
    })?;
    Ok(())
}
