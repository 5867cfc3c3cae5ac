//! Local snapshots of remote post fields.
//!
//! Before a post field is overwritten, its current value is written to a
//! timestamped file. Such a file can later be pushed back to the remote to
//! undo the edit.
//!
//! # Example
//!
//! ```no_run
//! use postkeep_snapshot::{MemoryRemote, PostField, PostId, SnapshotStore};
//! use std::sync::Arc;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let remote = Arc::new(MemoryRemote::new());
//! let store = SnapshotStore::new("backups", remote).await?;
//!
//! // Take a snapshot before editing
//! let snapshot = store
//!     .fetch_and_capture(PostId(42), PostField::Content, "backup")
//!     .await?;
//!
//! // ... edit the post ...
//!
//! // Restore if needed
//! store.restore(PostId(42), &snapshot.path).await?;
//! # Ok(())
//! # }
//! ```

mod batch;
mod error;
mod remote;
mod snapshot;
mod store;

pub use batch::{parse_plan, BatchFailure, BatchReport, RestoreItem, RestoreSource};
pub use error::{SnapshotError, SnapshotResult};
pub use remote::{MemoryRemote, RemoteContent, RemoteError, RemoteResult};
pub use snapshot::{PostField, PostId, Snapshot, SnapshotKey, DEFAULT_LABEL};
pub use store::{SnapshotInfo, SnapshotStore};
