//! Snapshot data structures.

use crate::{SnapshotError, SnapshotResult};
use chrono::{Duration, Local, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Label used when the caller does not name the triggering operation.
pub const DEFAULT_LABEL: &str = "backup";

const TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";

/// Numeric identifier of a remote post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PostId(pub u64);

impl std::fmt::Display for PostId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl FromStr for PostId {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.trim()
            .parse::<u64>()
            .map(PostId)
            .map_err(|_| SnapshotError::invalid_key(format!("not a post id: {s:?}")))
    }
}

/// A mutable field of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostField {
    Content,
    Excerpt,
    Title,
    Status,
    /// SEO meta description stored in post meta.
    Seo,
}

impl PostField {
    pub const ALL: [PostField; 5] = [
        PostField::Content,
        PostField::Excerpt,
        PostField::Title,
        PostField::Status,
        PostField::Seo,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PostField::Content => "content",
            PostField::Excerpt => "excerpt",
            PostField::Title => "title",
            PostField::Status => "status",
            PostField::Seo => "seo",
        }
    }

    /// File extension used for snapshots of this field.
    pub fn extension(&self) -> &'static str {
        match self {
            PostField::Content | PostField::Excerpt | PostField::Title => "html",
            PostField::Status | PostField::Seo => "txt",
        }
    }
}

impl std::fmt::Display for PostField {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostField {
    type Err = SnapshotError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PostField::ALL
            .into_iter()
            .find(|f| f.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| SnapshotError::invalid_key(format!("unknown field: {s}")))
    }
}

/// Identity of a snapshot: which post field, why, and when.
///
/// Rendered as a file name:
/// ```text
/// post{id}_{field}_{label}_{YYYYMMDD}_{HHMMSS}_{mmm}.{ext}
/// ```
/// The millisecond component is optional when parsing.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SnapshotKey {
    pub post_id: PostId,
    pub field: PostField,
    pub label: String,
    /// Local capture time, millisecond precision.
    pub captured_at: NaiveDateTime,
}

impl SnapshotKey {
    /// Create a key stamped with the current local time.
    pub fn new(post_id: PostId, field: PostField, label: &str) -> SnapshotResult<Self> {
        Self::at(post_id, field, label, Local::now().naive_local())
    }

    /// Create a key with an explicit capture time.
    pub fn at(
        post_id: PostId,
        field: PostField,
        label: &str,
        captured_at: NaiveDateTime,
    ) -> SnapshotResult<Self> {
        validate_label(label)?;
        Ok(Self {
            post_id,
            field,
            label: label.to_string(),
            captured_at: truncate_to_millis(captured_at),
        })
    }

    /// The same key, one millisecond later.
    pub fn next_tick(&self) -> Self {
        Self {
            captured_at: self.captured_at + Duration::milliseconds(1),
            ..self.clone()
        }
    }

    pub fn file_name(&self) -> String {
        format!(
            "post{}_{}_{}_{}_{:03}.{}",
            self.post_id,
            self.field,
            self.label,
            self.captured_at.format(TIMESTAMP_FORMAT),
            self.captured_at.nanosecond() / 1_000_000,
            self.field.extension()
        )
    }

    /// Parse a key from a snapshot file name (the path's directory is ignored).
    pub fn parse(path: &Path) -> SnapshotResult<Self> {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .ok_or_else(|| SnapshotError::invalid_key(path.display().to_string()))?;
        let invalid = || SnapshotError::invalid_key(stem.to_string());

        let parts: Vec<&str> = stem.split('_').collect();
        if parts.len() != 5 && parts.len() != 6 {
            return Err(invalid());
        }

        let post_id = parts[0]
            .strip_prefix("post")
            .and_then(|id| id.parse::<u64>().ok())
            .map(PostId)
            .ok_or_else(invalid)?;
        let field = parts[1].parse::<PostField>()?;
        let label = parts[2];

        let mut captured_at = NaiveDateTime::parse_from_str(
            &format!("{}_{}", parts[3], parts[4]),
            TIMESTAMP_FORMAT,
        )
        .map_err(|_| invalid())?;
        if let Some(millis) = parts.get(5) {
            let millis: i64 = millis.parse().map_err(|_| invalid())?;
            if !(0..1000).contains(&millis) {
                return Err(invalid());
            }
            captured_at += Duration::milliseconds(millis);
        }

        Self::at(post_id, field, label, captured_at)
    }
}

impl std::fmt::Display for SnapshotKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "post {} {} [{}] @ {}",
            self.post_id,
            self.field,
            self.label,
            self.captured_at.format("%Y-%m-%d %H:%M:%S%.3f")
        )
    }
}

/// A captured copy of one post field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Parsed key, or `None` for operator-chosen file names.
    pub key: Option<SnapshotKey>,

    /// Where the snapshot lives on disk.
    pub path: PathBuf,

    /// Field value at capture time, verbatim.
    pub content: String,
}

impl Snapshot {
    /// Field this snapshot restores. Unkeyed files restore content.
    pub fn field(&self) -> PostField {
        self.key
            .as_ref()
            .map(|k| k.field)
            .unwrap_or(PostField::Content)
    }
}

fn validate_label(label: &str) -> SnapshotResult<()> {
    let valid = !label.is_empty()
        && label
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-');
    if valid {
        Ok(())
    } else {
        Err(SnapshotError::invalid_key(format!(
            "label must match [a-z0-9-]+: {label:?}"
        )))
    }
}

fn truncate_to_millis(t: NaiveDateTime) -> NaiveDateTime {
    let millis = t.nanosecond() / 1_000_000;
    t.with_nanosecond(millis * 1_000_000).unwrap_or(t)
}
