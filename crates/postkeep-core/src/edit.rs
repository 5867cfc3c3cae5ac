//! Guarded edits: fetch, capture, then write.
//!
//! Every mutation of a remote post goes through [`GuardedEditor`]. The
//! current value of each field about to be overwritten is captured to the
//! snapshot store first; if the capture fails, the remote is not touched.

use crate::html::strip_tags;
use crate::CoreResult;
use postkeep_cms::PostStatus;
use postkeep_snapshot::{BatchFailure, PostField, PostId, SnapshotStore};
use regex::Regex;
use serde::Serialize;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Excerpts this short (after stripping tags) are not worth migrating.
const MIN_SEO_DESCRIPTION_CHARS: usize = 10;

/// Label used for snapshots taken by the excerpt migration.
const SEO_MIGRATION_LABEL: &str = "seo";

/// A mutation that can be applied to one post.
#[derive(Debug, Clone)]
pub enum EditOp {
    /// Regex replace over the content field.
    Replace {
        pattern: Regex,
        replacement: String,
        label: String,
    },
    /// Overwrite one field.
    Set {
        field: PostField,
        value: String,
        label: String,
    },
    /// Change the publication status.
    Status(PostStatus),
    /// Move the excerpt into the SEO description and clear the excerpt.
    MigrateExcerptToSeo,
}

/// What an edit did to one post.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EditOutcome {
    /// The post was written; `snapshots` hold the previous values.
    Updated {
        post_id: PostId,
        snapshots: Vec<PathBuf>,
    },
    /// The post already had the desired value. Nothing was written.
    Unchanged { post_id: PostId },
    /// The edit did not apply to this post.
    Skipped { post_id: PostId, reason: String },
}

impl EditOutcome {
    pub fn post_id(&self) -> PostId {
        match self {
            EditOutcome::Updated { post_id, .. }
            | EditOutcome::Unchanged { post_id }
            | EditOutcome::Skipped { post_id, .. } => *post_id,
        }
    }

    pub fn is_updated(&self) -> bool {
        matches!(self, EditOutcome::Updated { .. })
    }
}

/// Outcome of an edit applied to many posts.
#[derive(Debug, Clone, Default, Serialize)]
pub struct EditReport {
    pub outcomes: Vec<EditOutcome>,
    pub failed: Vec<BatchFailure>,
}

impl EditReport {
    pub fn updated_count(&self) -> usize {
        self.outcomes.iter().filter(|o| o.is_updated()).count()
    }

    pub fn failure_count(&self) -> usize {
        self.failed.len()
    }

    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Applies edits to remote posts, snapshotting before every write.
pub struct GuardedEditor {
    store: SnapshotStore,
}

impl GuardedEditor {
    pub fn new(store: SnapshotStore) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    /// Apply `op` to one post.
    pub async fn apply(&self, post_id: PostId, op: &EditOp) -> CoreResult<EditOutcome> {
        match op {
            EditOp::Replace {
                pattern,
                replacement,
                label,
            } => {
                self.replace_in_content(post_id, pattern, replacement, label)
                    .await
            }
            EditOp::Set {
                field,
                value,
                label,
            } => self.set_field(post_id, *field, value, label).await,
            EditOp::Status(status) => self.set_status(post_id, *status).await,
            EditOp::MigrateExcerptToSeo => self.migrate_excerpt_to_seo(post_id).await,
        }
    }

    /// Apply `op` to each post in order. Failures are recorded and the
    /// remaining posts are still processed.
    pub async fn apply_batch(&self, post_ids: &[PostId], op: &EditOp) -> EditReport {
        let mut report = EditReport::default();

        for &post_id in post_ids {
            match self.apply(post_id, op).await {
                Ok(outcome) => report.outcomes.push(outcome),
                Err(e) => {
                    warn!(post_id = %post_id, error = %e, "Edit failed");
                    report.failed.push(BatchFailure {
                        post_id,
                        error: e.to_string(),
                    });
                }
            }
        }

        info!(
            total = post_ids.len(),
            updated = report.updated_count(),
            failed = report.failure_count(),
            "Batch edit finished"
        );
        report
    }

    /// Regex replace over the content field.
    pub async fn replace_in_content(
        &self,
        post_id: PostId,
        pattern: &Regex,
        replacement: &str,
        label: &str,
    ) -> CoreResult<EditOutcome> {
        let current = self
            .store
            .remote()
            .fetch_field(post_id, PostField::Content)
            .await?;

        let matches = pattern.find_iter(&current).count();
        let updated = pattern.replace_all(&current, replacement);
        if matches == 0 || updated == current {
            debug!(post_id = %post_id, "Pattern changes nothing");
            return Ok(EditOutcome::Unchanged { post_id });
        }
        let updated = updated.into_owned();

        let snapshot = self
            .store
            .capture(post_id, PostField::Content, label, &current)
            .await?;
        self.store
            .remote()
            .replace_field(post_id, PostField::Content, &updated)
            .await?;

        info!(post_id = %post_id, matches, "Replaced in content");
        Ok(EditOutcome::Updated {
            post_id,
            snapshots: vec![snapshot.path],
        })
    }

    /// Overwrite one field.
    pub async fn set_field(
        &self,
        post_id: PostId,
        field: PostField,
        value: &str,
        label: &str,
    ) -> CoreResult<EditOutcome> {
        let current = self.store.remote().fetch_field(post_id, field).await?;
        if current == value {
            debug!(post_id = %post_id, field = %field, "Field already set");
            return Ok(EditOutcome::Unchanged { post_id });
        }

        let snapshot = self.store.capture(post_id, field, label, &current).await?;
        self.store
            .remote()
            .replace_field(post_id, field, value)
            .await?;

        info!(post_id = %post_id, field = %field, "Field updated");
        Ok(EditOutcome::Updated {
            post_id,
            snapshots: vec![snapshot.path],
        })
    }

    /// Change the publication status. The snapshot is labelled with the
    /// target status.
    pub async fn set_status(&self, post_id: PostId, status: PostStatus) -> CoreResult<EditOutcome> {
        self.set_field(post_id, PostField::Status, status.as_str(), status.as_str())
            .await
    }

    /// Move the tag-stripped excerpt into the SEO description and clear the
    /// excerpt, in one remote request.
    ///
    /// Posts whose stripped excerpt is ten characters or shorter are skipped.
    pub async fn migrate_excerpt_to_seo(&self, post_id: PostId) -> CoreResult<EditOutcome> {
        let remote = self.store.remote();
        let excerpt = remote.fetch_field(post_id, PostField::Excerpt).await?;
        let description = strip_tags(&excerpt);

        if description.chars().count() <= MIN_SEO_DESCRIPTION_CHARS {
            return Ok(EditOutcome::Skipped {
                post_id,
                reason: format!(
                    "excerpt has {} characters, need more than {MIN_SEO_DESCRIPTION_CHARS}",
                    description.chars().count()
                ),
            });
        }

        let seo = remote.fetch_field(post_id, PostField::Seo).await?;

        let mut snapshots = Vec::new();
        for (field, value) in [(PostField::Excerpt, &excerpt), (PostField::Seo, &seo)] {
            let snapshot = self
                .store
                .capture(post_id, field, SEO_MIGRATION_LABEL, value)
                .await?;
            snapshots.push(snapshot.path);
        }

        remote
            .replace_fields(
                post_id,
                &[(PostField::Seo, description), (PostField::Excerpt, String::new())],
            )
            .await?;

        info!(post_id = %post_id, "Moved excerpt to SEO description");
        Ok(EditOutcome::Updated { post_id, snapshots })
    }

}

#[cfg(test)]
mod tests {
    use super::*;
    use postkeep_snapshot::MemoryRemote;
    use std::sync::Arc;

    async fn editor_with(remote: Arc<MemoryRemote>) -> (GuardedEditor, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path().join("snapshots"), remote)
            .await
            .unwrap();
        (GuardedEditor::new(store), dir)
    }

    #[tokio::test]
    async fn test_replace_captures_before_write() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert(
            PostId(7),
            PostField::Content,
            r#"<a href="http://old.example/x">x</a>"#,
        );
        let (editor, _dir) = editor_with(remote.clone()).await;

        let pattern = Regex::new(r"http://old\.example").unwrap();
        let outcome = editor
            .replace_in_content(PostId(7), &pattern, "https://new.example", "links")
            .await
            .unwrap();

        let EditOutcome::Updated { snapshots, .. } = outcome else {
            panic!("expected update");
        };
        assert_eq!(snapshots.len(), 1);
        let saved = std::fs::read_to_string(&snapshots[0]).unwrap();
        assert_eq!(saved, r#"<a href="http://old.example/x">x</a>"#);
        assert_eq!(
            remote.value(PostId(7), PostField::Content).as_deref(),
            Some(r#"<a href="https://new.example/x">x</a>"#)
        );
    }

    #[tokio::test]
    async fn test_no_match_writes_nothing() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert(PostId(7), PostField::Content, "<p>plain</p>");
        let (editor, _dir) = editor_with(remote.clone()).await;

        let pattern = Regex::new("absent").unwrap();
        let outcome = editor
            .replace_in_content(PostId(7), &pattern, "x", "links")
            .await
            .unwrap();

        assert_eq!(outcome, EditOutcome::Unchanged { post_id: PostId(7) });
        assert_eq!(remote.write_count(), 0);
        assert!(editor.store().list().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_set_status_skips_noop() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert(PostId(3), PostField::Status, "publish");
        let (editor, _dir) = editor_with(remote.clone()).await;

        let outcome = editor
            .set_status(PostId(3), PostStatus::Publish)
            .await
            .unwrap();
        assert!(!outcome.is_updated());

        let outcome = editor
            .set_status(PostId(3), PostStatus::Draft)
            .await
            .unwrap();
        assert!(outcome.is_updated());
        assert_eq!(
            remote.value(PostId(3), PostField::Status).as_deref(),
            Some("draft")
        );

        let snapshots = editor.store().list().await.unwrap();
        assert_eq!(snapshots.len(), 1);
        assert_eq!(snapshots[0].key.field, PostField::Status);
        assert_eq!(snapshots[0].key.label, "draft");
    }

    #[tokio::test]
    async fn test_capture_failure_aborts_before_write() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert(PostId(5), PostField::Title, "Old title");
        let (editor, dir) = editor_with(remote.clone()).await;

        // Replace the snapshot directory with a plain file.
        let snapshot_dir = dir.path().join("snapshots");
        std::fs::remove_dir(&snapshot_dir).unwrap();
        std::fs::write(&snapshot_dir, "not a directory").unwrap();

        let result = editor
            .set_field(PostId(5), PostField::Title, "New title", "title")
            .await;

        assert!(result.is_err());
        assert_eq!(remote.write_count(), 0);
        assert_eq!(
            remote.value(PostId(5), PostField::Title).as_deref(),
            Some("Old title")
        );
    }

    #[tokio::test]
    async fn test_migrate_excerpt_to_seo() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert(
            PostId(11),
            PostField::Excerpt,
            "<p>A summary long enough to keep</p>",
        );
        let (editor, _dir) = editor_with(remote.clone()).await;

        let outcome = editor.migrate_excerpt_to_seo(PostId(11)).await.unwrap();

        let EditOutcome::Updated { snapshots, .. } = outcome else {
            panic!("expected update");
        };
        assert_eq!(snapshots.len(), 2);
        assert_eq!(
            remote.value(PostId(11), PostField::Seo).as_deref(),
            Some("A summary long enough to keep")
        );
        assert_eq!(
            remote.value(PostId(11), PostField::Excerpt).as_deref(),
            Some("")
        );

        // Both fields go out in a single request.
        let writes = remote.writes();
        assert_eq!(writes.len(), 1);
        assert_eq!(writes[0].1.len(), 2);
    }

    #[tokio::test]
    async fn test_migrate_skips_short_excerpt() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert(PostId(12), PostField::Excerpt, "<p>tiny</p>");
        let (editor, _dir) = editor_with(remote.clone()).await;

        let outcome = editor.migrate_excerpt_to_seo(PostId(12)).await.unwrap();

        assert!(matches!(outcome, EditOutcome::Skipped { .. }));
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_remote_rejection_keeps_snapshot() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert(PostId(8), PostField::Content, "<p>before</p>");
        remote.fail_writes(PostId(8), 403);
        let (editor, _dir) = editor_with(remote.clone()).await;

        let err = editor
            .set_field(PostId(8), PostField::Content, "<p>after</p>", "backup")
            .await
            .unwrap_err();

        assert!(err.to_string().contains("403"));
        let snapshots = editor.store().list_for(PostId(8)).await.unwrap();
        assert_eq!(snapshots.len(), 1);
    }

    #[tokio::test]
    async fn test_batch_continues_past_failures() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert(PostId(1), PostField::Status, "draft");
        remote.insert(PostId(3), PostField::Status, "publish");
        let (editor, _dir) = editor_with(remote.clone()).await;

        let report = editor
            .apply_batch(
                &[PostId(1), PostId(2), PostId(3)],
                &EditOp::Status(PostStatus::Publish),
            )
            .await;

        assert_eq!(report.outcomes.len(), 2);
        assert_eq!(report.updated_count(), 1);
        assert_eq!(report.failure_count(), 1);
        assert!(!report.is_clean());
        assert_eq!(report.failed[0].post_id, PostId(2));
        assert_eq!(
            remote.value(PostId(1), PostField::Status).as_deref(),
            Some("publish")
        );
    }

    #[tokio::test]
    async fn test_apply_set_snapshots_old_value() {
        let remote = Arc::new(MemoryRemote::new());
        remote.insert(PostId(8), PostField::Title, "Old title");
        let (editor, _dir) = editor_with(remote.clone()).await;

        let op = EditOp::Set {
            field: PostField::Title,
            value: "New title".to_string(),
            label: "title".to_string(),
        };
        let outcome = editor.apply(PostId(8), &op).await.unwrap();

        let EditOutcome::Updated { snapshots, .. } = outcome else {
            panic!("expected an update, got {outcome:?}");
        };
        assert_eq!(snapshots.len(), 1);
        assert_eq!(std::fs::read_to_string(&snapshots[0]).unwrap(), "Old title");
        assert_eq!(
            remote.value(PostId(8), PostField::Title).as_deref(),
            Some("New title")
        );

        let again = editor.apply(PostId(8), &op).await.unwrap();
        assert!(matches!(again, EditOutcome::Unchanged { .. }));
    }
}
