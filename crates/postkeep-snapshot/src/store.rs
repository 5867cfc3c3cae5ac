//! Snapshot storage implementation.

use crate::{
    PostField, PostId, RemoteContent, Snapshot, SnapshotError, SnapshotKey, SnapshotResult,
};
use similar::{ChangeTag, TextDiff};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

/// How many times a capture steps past an existing file before giving up.
const MAX_COLLISIONS: u32 = 1000;

/// A snapshot found on disk, without its content loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub key: SnapshotKey,
    pub path: PathBuf,
    /// Size in bytes.
    pub size: u64,
}

/// Storage for post field snapshots.
///
/// Snapshots are flat files in one directory, one file per capture:
/// ```text
/// base_dir/
///   post42_content_backup_20250806_131322_123.html
///   post42_status_publish_20250806_140001_000.txt
/// ```
/// Files are never overwritten or deleted by the store.
pub struct SnapshotStore {
    /// Directory holding snapshot files.
    base_dir: PathBuf,

    /// Where restores are written to.
    remote: Arc<dyn RemoteContent>,
}

impl SnapshotStore {
    /// Create a new snapshot store, creating `base_dir` if needed.
    pub async fn new(
        base_dir: impl Into<PathBuf>,
        remote: Arc<dyn RemoteContent>,
    ) -> SnapshotResult<Self> {
        let base_dir = base_dir.into();
        fs::create_dir_all(&base_dir).await?;
        debug!(dir = %base_dir.display(), "Snapshot store opened");
        Ok(Self { base_dir, remote })
    }

    pub fn base_dir(&self) -> &Path {
        &self.base_dir
    }

    pub fn remote(&self) -> &Arc<dyn RemoteContent> {
        &self.remote
    }

    /// Write `content` verbatim to a new snapshot file stamped with the
    /// current time.
    pub async fn capture(
        &self,
        post_id: PostId,
        field: PostField,
        label: &str,
        content: &str,
    ) -> SnapshotResult<Snapshot> {
        let key = SnapshotKey::new(post_id, field, label)?;
        self.capture_at(key, content).await
    }

    /// Write `content` under an explicit key.
    ///
    /// If a file with that name already exists the capture time is advanced
    /// one millisecond at a time until a free name is found.
    pub async fn capture_at(&self, key: SnapshotKey, content: &str) -> SnapshotResult<Snapshot> {
        fs::create_dir_all(&self.base_dir).await?;

        let mut key = key;
        for _ in 0..MAX_COLLISIONS {
            let path = self.base_dir.join(key.file_name());
            match write_new(&path, content).await {
                Ok(()) => {
                    info!(
                        post_id = %key.post_id,
                        field = %key.field,
                        path = %path.display(),
                        bytes = content.len(),
                        "Captured snapshot"
                    );
                    return Ok(Snapshot {
                        key: Some(key),
                        path,
                        content: content.to_string(),
                    });
                }
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                    debug!(path = %path.display(), "Snapshot name taken, stepping forward");
                    key = key.next_tick();
                }
                Err(e) => return Err(SnapshotError::Io(e)),
            }
        }

        Err(SnapshotError::operation_failed(format!(
            "no free snapshot name for post {} after {MAX_COLLISIONS} attempts",
            key.post_id
        )))
    }

    /// Read the current remote value of a field and capture it.
    pub async fn fetch_and_capture(
        &self,
        post_id: PostId,
        field: PostField,
        label: &str,
    ) -> SnapshotResult<Snapshot> {
        let current = self.remote.fetch_field(post_id, field).await?;
        self.capture(post_id, field, label, &current).await
    }

    /// Load a snapshot file fully into memory.
    ///
    /// A path that exists as given is used as is. Otherwise a relative path
    /// is looked up inside the store directory.
    pub async fn read(&self, path: &Path) -> SnapshotResult<Snapshot> {
        let path = self.resolve(path).await;
        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(SnapshotError::not_found(path));
            }
            Err(e) => return Err(SnapshotError::Io(e)),
        };
        let content = String::from_utf8(bytes).map_err(|_| SnapshotError::NotText(path.clone()))?;

        Ok(Snapshot {
            key: SnapshotKey::parse(&path).ok(),
            path,
            content,
        })
    }

    /// List all snapshots in the store, newest first.
    ///
    /// Files whose names do not parse as snapshot keys are skipped.
    pub async fn list(&self) -> SnapshotResult<Vec<SnapshotInfo>> {
        let mut snapshots = Vec::new();

        let mut entries = match fs::read_dir(&self.base_dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(snapshots),
            Err(e) => return Err(SnapshotError::Io(e)),
        };

        while let Some(entry) = entries.next_entry().await? {
            let metadata = entry.metadata().await?;
            if !metadata.is_file() {
                continue;
            }
            let path = entry.path();
            match SnapshotKey::parse(&path) {
                Ok(key) => snapshots.push(SnapshotInfo {
                    key,
                    path,
                    size: metadata.len(),
                }),
                Err(_) => debug!(path = %path.display(), "Skipping non-snapshot file"),
            }
        }

        snapshots.sort_by(|a, b| {
            b.key
                .captured_at
                .cmp(&a.key.captured_at)
                .then_with(|| b.path.cmp(&a.path))
        });

        Ok(snapshots)
    }

    /// List snapshots of one post, newest first.
    pub async fn list_for(&self, post_id: PostId) -> SnapshotResult<Vec<SnapshotInfo>> {
        let all = self.list().await?;
        Ok(all
            .into_iter()
            .filter(|s| s.key.post_id == post_id)
            .collect())
    }

    /// The most recent snapshot of a post field.
    pub async fn latest_for(
        &self,
        post_id: PostId,
        field: PostField,
    ) -> SnapshotResult<Option<SnapshotInfo>> {
        let all = self.list_for(post_id).await?;
        Ok(all.into_iter().find(|s| s.key.field == field))
    }

    /// Push a snapshot back to the remote post.
    ///
    /// The snapshot is read completely before the remote is touched; a
    /// missing or unreadable file fails without any remote call. Remote
    /// failures are logged and returned, never retried.
    pub async fn restore(&self, post_id: PostId, path: &Path) -> SnapshotResult<Snapshot> {
        let snapshot = self.read(path).await?;

        if let Some(key) = &snapshot.key {
            if key.post_id != post_id {
                return Err(SnapshotError::PostMismatch {
                    path: snapshot.path.clone(),
                    expected: post_id,
                    found: key.post_id,
                });
            }
        }

        let field = snapshot.field();
        if let Err(e) = self
            .remote
            .replace_field(post_id, field, &snapshot.content)
            .await
        {
            warn!(
                post_id = %post_id,
                field = %field,
                path = %snapshot.path.display(),
                error = %e,
                "Restore failed"
            );
            return Err(e.into());
        }

        info!(
            post_id = %post_id,
            field = %field,
            path = %snapshot.path.display(),
            "Restored snapshot"
        );
        Ok(snapshot)
    }

    /// Restore the newest snapshot of a post field.
    pub async fn restore_latest(
        &self,
        post_id: PostId,
        field: PostField,
    ) -> SnapshotResult<Snapshot> {
        let latest = self
            .latest_for(post_id, field)
            .await?
            .ok_or_else(|| SnapshotError::NoSnapshotFor {
                post_id,
                field: field.to_string(),
            })?;
        self.restore(post_id, &latest.path).await
    }

    /// Unified diff from a snapshot to the current remote value of its field.
    pub async fn diff(&self, post_id: PostId, path: &Path) -> SnapshotResult<String> {
        let snapshot = self.read(path).await?;
        let current = self.remote.fetch_field(post_id, snapshot.field()).await?;

        let name = snapshot
            .path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        Ok(generate_diff(
            &snapshot.content,
            &current,
            &name,
            &format!("post {post_id} ({})", snapshot.field()),
        ))
    }

    async fn resolve(&self, path: &Path) -> PathBuf {
        if fs::try_exists(path).await.unwrap_or(false) || path.is_absolute() {
            return path.to_path_buf();
        }
        let in_store = self.base_dir.join(path);
        if fs::try_exists(&in_store).await.unwrap_or(false) {
            return in_store;
        }
        path.to_path_buf()
    }
}

/// Create `path` exclusively and write `content` to it.
async fn write_new(path: &Path, content: &str) -> std::io::Result<()> {
    let mut file = fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)
        .await?;
    file.write_all(content.as_bytes()).await?;
    file.sync_all().await?;
    Ok(())
}

/// Generate a unified diff between two strings.
fn generate_diff(old: &str, new: &str, old_name: &str, new_name: &str) -> String {
    let diff = TextDiff::from_lines(old, new);
    let mut output = String::new();

    output.push_str(&format!("--- {old_name}\n"));
    output.push_str(&format!("+++ {new_name}\n"));

    for (idx, group) in diff.grouped_ops(3).iter().enumerate() {
        if idx > 0 {
            output.push_str("...\n");
        }

        for op in group {
            for change in diff.iter_changes(op) {
                let sign = match change.tag() {
                    ChangeTag::Delete => "-",
                    ChangeTag::Insert => "+",
                    ChangeTag::Equal => " ",
                };

                output.push_str(sign);
                output.push_str(change.value());
                if !change.value().ends_with('\n') {
                    output.push('\n');
                }
            }
        }
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{MemoryRemote, RemoteError};
    use chrono::NaiveDate;
    use tempfile::TempDir;

    async fn setup_test() -> (TempDir, Arc<MemoryRemote>, SnapshotStore) {
        let dir = TempDir::new().unwrap();
        let remote = Arc::new(MemoryRemote::new());
        let store = SnapshotStore::new(dir.path().join("backups"), remote.clone())
            .await
            .unwrap();
        (dir, remote, store)
    }

    fn key_at(post: u64, field: PostField, minute: u32) -> SnapshotKey {
        let at = NaiveDate::from_ymd_opt(2025, 8, 6)
            .and_then(|d| d.and_hms_opt(13, minute, 0))
            .unwrap();
        SnapshotKey::at(PostId(post), field, "backup", at).unwrap()
    }

    #[tokio::test]
    async fn test_capture_and_restore_round_trip() {
        let (_dir, remote, store) = setup_test().await;
        let original = "<h2>見出し</h2>\n<p>本文 &amp; more</p>\n";
        remote.insert(PostId(7), PostField::Content, "something else");

        let snapshot = store
            .capture(PostId(7), PostField::Content, "backup", original)
            .await
            .unwrap();
        store.restore(PostId(7), &snapshot.path).await.unwrap();

        let value = remote
            .fetch_field(PostId(7), PostField::Content)
            .await
            .unwrap();
        assert_eq!(value, original);
    }

    #[tokio::test]
    async fn test_capture_never_overwrites() {
        let (_dir, _remote, store) = setup_test().await;
        let key = key_at(42, PostField::Content, 13);

        let first = store.capture_at(key.clone(), "first").await.unwrap();
        let second = store.capture_at(key, "second").await.unwrap();

        assert_ne!(first.path, second.path);
        assert_eq!(fs::read_to_string(&first.path).await.unwrap(), "first");
        assert_eq!(fs::read_to_string(&second.path).await.unwrap(), "second");
    }

    #[tokio::test]
    async fn test_rapid_captures_get_distinct_files() {
        let (_dir, _remote, store) = setup_test().await;

        let mut paths = Vec::new();
        for i in 0..5 {
            let snapshot = store
                .capture(PostId(42), PostField::Content, "backup", &format!("v{i}"))
                .await
                .unwrap();
            paths.push(snapshot.path);
        }
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 5);
        assert_eq!(store.list_for(PostId(42)).await.unwrap().len(), 5);
    }

    #[tokio::test]
    async fn test_restore_missing_file_makes_no_remote_call() {
        let (dir, remote, store) = setup_test().await;
        remote.insert(PostId(42), PostField::Content, "current");

        let missing = dir.path().join("post42_content_backup_20250806_131322.html");
        let err = store.restore(PostId(42), &missing).await.unwrap_err();

        assert!(matches!(err, SnapshotError::NotFound(_)));
        assert!(err.is_local());
        assert_eq!(remote.write_count(), 0);
        assert_eq!(
            remote.value(PostId(42), PostField::Content).as_deref(),
            Some("current")
        );
    }

    #[tokio::test]
    async fn test_restore_non_utf8_makes_no_remote_call() {
        let (dir, remote, store) = setup_test().await;
        remote.insert(PostId(42), PostField::Content, "current");

        let path = dir.path().join("post42_content_backup_20250806_131322_000.html");
        std::fs::write(&path, [0x3c, 0x70, 0x3e, 0xff, 0xfe, 0x00]).unwrap();
        let err = store.restore(PostId(42), &path).await.unwrap_err();

        assert!(matches!(err, SnapshotError::NotText(_)));
        assert!(err.is_local());
        assert_eq!(remote.write_count(), 0);
        assert_eq!(
            remote.value(PostId(42), PostField::Content).as_deref(),
            Some("current")
        );
    }

    #[tokio::test]
    async fn test_restore_reports_remote_rejection() {
        let (_dir, remote, store) = setup_test().await;
        remote.insert(PostId(5), PostField::Content, "B");
        remote.fail_writes(PostId(5), 403);

        let snapshot = store
            .capture(PostId(5), PostField::Content, "backup", "A")
            .await
            .unwrap();
        let err = store.restore(PostId(5), &snapshot.path).await.unwrap_err();

        assert!(matches!(
            err,
            SnapshotError::Remote(RemoteError::Status { code: 403, .. })
        ));
        assert_eq!(remote.value(PostId(5), PostField::Content).as_deref(), Some("B"));
    }

    #[tokio::test]
    async fn test_capture_mutate_restore_scenario() {
        let (_dir, remote, store) = setup_test().await;
        remote.insert(PostId(42), PostField::Content, "A");

        let snapshot = store
            .fetch_and_capture(PostId(42), PostField::Content, "backup")
            .await
            .unwrap();
        remote
            .replace_field(PostId(42), PostField::Content, "B")
            .await
            .unwrap();
        assert_eq!(remote.value(PostId(42), PostField::Content).as_deref(), Some("B"));

        store.restore(PostId(42), &snapshot.path).await.unwrap();
        assert_eq!(remote.value(PostId(42), PostField::Content).as_deref(), Some("A"));
    }

    #[tokio::test]
    async fn test_restore_refuses_other_posts_snapshot() {
        let (_dir, remote, store) = setup_test().await;
        let snapshot = store
            .capture(PostId(7), PostField::Content, "backup", "seven")
            .await
            .unwrap();

        let err = store.restore(PostId(8), &snapshot.path).await.unwrap_err();
        assert!(matches!(err, SnapshotError::PostMismatch { .. }));
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_restore_operator_named_file_targets_content() {
        let (dir, remote, store) = setup_test().await;
        let manual = dir.path().join("hand-picked.html");
        fs::write(&manual, "<p>manual</p>").await.unwrap();

        store.restore(PostId(3), &manual).await.unwrap();

        assert_eq!(
            remote.writes(),
            vec![(
                PostId(3),
                vec![(PostField::Content, "<p>manual</p>".to_string())]
            )]
        );
    }

    #[tokio::test]
    async fn test_restore_uses_snapshot_field() {
        let (_dir, remote, store) = setup_test().await;
        let snapshot = store
            .capture(PostId(3), PostField::Status, "publish", "draft")
            .await
            .unwrap();

        store.restore(PostId(3), &snapshot.path).await.unwrap();
        assert_eq!(
            remote.value(PostId(3), PostField::Status).as_deref(),
            Some("draft")
        );
    }

    #[tokio::test]
    async fn test_read_resolves_names_inside_store() {
        let (_dir, _remote, store) = setup_test().await;
        let snapshot = store
            .capture(PostId(1), PostField::Excerpt, "backup", "short text")
            .await
            .unwrap();
        let name = PathBuf::from(snapshot.path.file_name().unwrap());

        let read = store.read(&name).await.unwrap();
        assert_eq!(read.content, "short text");
        assert_eq!(read.key, snapshot.key);
    }

    #[tokio::test]
    async fn test_read_prefers_existing_relative_path() {
        let (dir, _remote, store) = setup_test().await;

        // A file in the working directory shadows the same name in the store.
        let local = tempfile::Builder::new()
            .prefix("post3_content_backup_")
            .suffix(".html")
            .tempfile_in(".")
            .unwrap();
        std::fs::write(local.path(), "from working dir").unwrap();
        let name = PathBuf::from(local.path().file_name().unwrap());
        std::fs::write(dir.path().join("backups").join(&name), "from store").unwrap();

        let read = store.read(&name).await.unwrap();
        assert_eq!(read.content, "from working dir");
        assert_eq!(read.path, name);
    }

    #[tokio::test]
    async fn test_list_newest_first_and_latest_for() {
        let (_dir, _remote, store) = setup_test().await;
        store
            .capture_at(key_at(1, PostField::Content, 10), "old")
            .await
            .unwrap();
        store
            .capture_at(key_at(1, PostField::Content, 30), "new")
            .await
            .unwrap();
        store
            .capture_at(key_at(1, PostField::Excerpt, 40), "excerpt")
            .await
            .unwrap();
        store
            .capture_at(key_at(2, PostField::Content, 20), "other")
            .await
            .unwrap();
        fs::write(store.base_dir().join("README.txt"), "not a snapshot")
            .await
            .unwrap();

        let all = store.list().await.unwrap();
        assert_eq!(all.len(), 4);
        assert!(all
            .windows(2)
            .all(|w| w[0].key.captured_at >= w[1].key.captured_at));

        let latest = store
            .latest_for(PostId(1), PostField::Content)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(fs::read_to_string(&latest.path).await.unwrap(), "new");
        assert_eq!(latest.size, 3);

        assert!(store
            .latest_for(PostId(2), PostField::Excerpt)
            .await
            .unwrap()
            .is_none());
    }

    #[tokio::test]
    async fn test_restore_latest_without_snapshot() {
        let (_dir, remote, store) = setup_test().await;
        let err = store
            .restore_latest(PostId(11), PostField::Content)
            .await
            .unwrap_err();
        assert!(matches!(err, SnapshotError::NoSnapshotFor { .. }));
        assert_eq!(remote.write_count(), 0);
    }

    #[tokio::test]
    async fn test_diff_against_remote() {
        let (_dir, remote, store) = setup_test().await;
        remote.insert(PostId(9), PostField::Content, "line 1\nline 2\nline 3\n");

        let snapshot = store
            .fetch_and_capture(PostId(9), PostField::Content, "backup")
            .await
            .unwrap();
        remote.insert(PostId(9), PostField::Content, "line 1\nmodified line\nline 3\n");

        let diff = store.diff(PostId(9), &snapshot.path).await.unwrap();
        assert!(diff.contains("-line 2"));
        assert!(diff.contains("+modified line"));
        assert!(diff.contains("+++ post 9 (content)"));
    }

    #[tokio::test]
    async fn test_fetch_and_capture_unknown_post_writes_nothing() {
        let (_dir, _remote, store) = setup_test().await;
        let err = store
            .fetch_and_capture(PostId(404), PostField::Content, "backup")
            .await
            .unwrap_err();
        assert!(!err.is_local());
        assert!(store.list().await.unwrap().is_empty());
    }
}
