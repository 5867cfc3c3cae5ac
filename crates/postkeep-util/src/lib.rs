//! Shared utilities for postkeep.
//!
//! - Logging setup with tracing
//! - Well-known directories

pub mod log;
pub mod path;

pub use log::{LogConfig, LogLevel};
