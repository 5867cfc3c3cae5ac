//! Logging setup using tracing.
//!
//! Logs go to stderr (or a file) so that stdout stays free for the progress
//! lines the commands print.

use std::path::PathBuf;
use std::sync::Mutex;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Environment variable that overrides the computed filter.
pub const LOG_ENV: &str = "POSTKEEP_LOG";

/// Workspace crates whose level follows the configured level.
const CRATES: [&str; 5] = [
    "postkeep",
    "postkeep_core",
    "postkeep_cms",
    "postkeep_snapshot",
    "postkeep_util",
];

/// Log level configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Trace,
    Debug,
    Info,
    #[default]
    Warn,
    Error,
}

impl LogLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            LogLevel::Trace => "trace",
            LogLevel::Debug => "debug",
            LogLevel::Info => "info",
            LogLevel::Warn => "warn",
            LogLevel::Error => "error",
        }
    }

    /// Parse a log level from a string.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "trace" => Some(LogLevel::Trace),
            "debug" => Some(LogLevel::Debug),
            "info" => Some(LogLevel::Info),
            "warn" | "warning" => Some(LogLevel::Warn),
            "error" => Some(LogLevel::Error),
            _ => None,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Default)]
pub struct LogConfig {
    /// Level for workspace crates.
    pub level: LogLevel,
    /// Raise workspace crates to debug regardless of `level`.
    pub verbose: bool,
    /// Whether to include file/line info in logs.
    pub include_location: bool,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl LogConfig {
    /// Filter directive for the workspace crates.
    pub fn directive(&self) -> String {
        let level = if self.verbose {
            LogLevel::Debug
        } else {
            self.level
        };
        CRATES
            .iter()
            .map(|c| format!("{c}={}", level.as_str()))
            .collect::<Vec<_>>()
            .join(",")
    }
}

/// Initialize logging with the given configuration.
///
/// This should be called once at application startup; later calls are
/// ignored.
pub fn init(config: LogConfig) -> std::io::Result<()> {
    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(config.directive()));

    let registry = tracing_subscriber::registry().with(filter);

    let layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_file(config.include_location)
        .with_line_number(config.include_location);

    let result = match &config.file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            registry
                .with(layer.with_ansi(false).with_writer(Mutex::new(file)))
                .try_init()
        }
        None => registry.with(layer.with_writer(std::io::stderr)).try_init(),
    };

    if result.is_err() {
        tracing::debug!("Logging already initialized");
    }
    Ok(())
}
