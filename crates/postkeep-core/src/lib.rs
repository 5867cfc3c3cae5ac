//! Core of postkeep.
//!
//! This crate ties the snapshot store and the site client together:
//! - Configuration loading and merging
//! - Guarded edits that snapshot every field before overwriting it
//! - Portfolio mirror export
//! - Full-site JSON backups

pub mod backup;
pub mod config;
pub mod edit;
pub mod error;
pub mod export;
pub mod html;

pub use backup::{backup_site, BackupSummary};
pub use config::Config;
pub use edit::{EditOp, EditOutcome, EditReport, GuardedEditor};
pub use error::{ConfigError, CoreError, CoreResult};
pub use export::{refresh_mirror, MirrorReport};
