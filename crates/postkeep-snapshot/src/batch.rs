//! Restoring many posts in one run.
//!
//! Each item is restored on its own; a failure is recorded and the batch
//! moves on to the next item.

use crate::{PostField, PostId, SnapshotError, SnapshotResult, SnapshotStore};
use serde::Serialize;
use std::path::PathBuf;
use tracing::{info, warn};

/// Which snapshot to restore a post from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RestoreSource {
    /// A specific snapshot file.
    Path(PathBuf),
    /// The newest snapshot of a field in the store.
    Latest(PostField),
}

/// One post to restore.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RestoreItem {
    pub post_id: PostId,
    pub source: RestoreSource,
}

impl RestoreItem {
    pub fn from_path(post_id: PostId, path: impl Into<PathBuf>) -> Self {
        Self {
            post_id,
            source: RestoreSource::Path(path.into()),
        }
    }

    pub fn latest(post_id: PostId, field: PostField) -> Self {
        Self {
            post_id,
            source: RestoreSource::Latest(field),
        }
    }
}

/// Parse a restore plan.
///
/// One item per line, `<post id> <snapshot path>`. Blank lines and lines
/// starting with `#` are ignored. Paths may contain spaces.
pub fn parse_plan(text: &str) -> SnapshotResult<Vec<RestoreItem>> {
    let mut items = Vec::new();
    for (lineno, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let (id, path) = line
            .split_once(char::is_whitespace)
            .map(|(id, path)| (id, path.trim()))
            .filter(|(_, path)| !path.is_empty())
            .ok_or_else(|| {
                SnapshotError::invalid_key(format!(
                    "plan line {}: expected `<post id> <path>`",
                    lineno + 1
                ))
            })?;
        items.push(RestoreItem::from_path(id.parse()?, path));
    }
    Ok(items)
}

/// A failed batch item.
#[derive(Debug, Clone, Serialize)]
pub struct BatchFailure {
    pub post_id: PostId,
    pub error: String,
}

/// Outcome of a batch restore.
#[derive(Debug, Clone, Default, Serialize)]
pub struct BatchReport {
    /// Restored posts with the snapshot each was restored from.
    pub succeeded: Vec<(PostId, PathBuf)>,
    pub failed: Vec<BatchFailure>,
}

impl BatchReport {
    pub fn success_count(&self) -> usize {
        self.succeeded.len()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn total(&self) -> usize {
        self.success_count() + self.failure_count()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

impl SnapshotStore {
    /// Restore every item in order, continuing past failures.
    pub async fn restore_batch(&self, items: &[RestoreItem]) -> BatchReport {
        let mut report = BatchReport::default();

        for item in items {
            let result = match &item.source {
                RestoreSource::Path(path) => self.restore(item.post_id, path).await,
                RestoreSource::Latest(field) => self.restore_latest(item.post_id, *field).await,
            };

            match result {
                Ok(snapshot) => report.succeeded.push((item.post_id, snapshot.path)),
                Err(e) => {
                    warn!(post_id = %item.post_id, error = %e, "Batch item failed");
                    report.failed.push(BatchFailure {
                        post_id: item.post_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            succeeded = report.success_count(),
            failed = report.failure_count(),
            "Batch restore finished"
        );
        report
    }
}
