//! The remote side of a snapshot: where field values are read from and
//! restored to.

use crate::{PostField, PostId};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::RwLock;
use thiserror::Error;

/// Result type for remote calls.
pub type RemoteResult<T> = Result<T, RemoteError>;

/// Errors reported by a remote content collaborator.
#[derive(Debug, Error)]
pub enum RemoteError {
    /// Connection refused, timeout, TLS failure and the like.
    #[error("transport error: {0}")]
    Transport(String),

    /// The remote answered with a non-success status code.
    #[error("remote returned status {code}: {body}")]
    Status { code: u16, body: String },

    /// The remote answered but the payload could not be understood.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

/// A content-management backend holding post fields.
///
/// `replace_fields` is a single remote request; whether the backend applies
/// it all-or-nothing is up to the backend.
#[async_trait]
pub trait RemoteContent: Send + Sync {
    /// Read the current value of one field.
    async fn fetch_field(&self, post_id: PostId, field: PostField) -> RemoteResult<String>;

    /// Overwrite several fields of one post in one call.
    async fn replace_fields(
        &self,
        post_id: PostId,
        fields: &[(PostField, String)],
    ) -> RemoteResult<()>;

    /// Overwrite one field.
    async fn replace_field(
        &self,
        post_id: PostId,
        field: PostField,
        value: &str,
    ) -> RemoteResult<()> {
        self.replace_fields(post_id, &[(field, value.to_string())])
            .await
    }
}

/// In-memory remote for testing.
///
/// Every call to `replace_fields` is recorded, including rejected ones.
#[derive(Default)]
pub struct MemoryRemote {
    posts: RwLock<HashMap<(PostId, PostField), String>>,
    writes: RwLock<Vec<(PostId, Vec<(PostField, String)>)>>,
    failing: RwLock<HashMap<PostId, u16>>,
}

impl MemoryRemote {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a field value without recording a write.
    pub fn insert(&self, post_id: PostId, field: PostField, value: impl Into<String>) {
        if let Ok(mut posts) = self.posts.write() {
            posts.insert((post_id, field), value.into());
        }
    }

    /// Current value of a field, if the post has it.
    pub fn value(&self, post_id: PostId, field: PostField) -> Option<String> {
        self.posts
            .read()
            .ok()
            .and_then(|posts| posts.get(&(post_id, field)).cloned())
    }

    /// Make every write to `post_id` fail with `status`.
    pub fn fail_writes(&self, post_id: PostId, status: u16) {
        if let Ok(mut failing) = self.failing.write() {
            failing.insert(post_id, status);
        }
    }

    /// All write attempts in call order.
    pub fn writes(&self) -> Vec<(PostId, Vec<(PostField, String)>)> {
        self.writes.read().map(|w| w.clone()).unwrap_or_default()
    }

    pub fn write_count(&self) -> usize {
        self.writes.read().map(|w| w.len()).unwrap_or_default()
    }
}

fn poisoned<E: std::fmt::Display>(e: E) -> RemoteError {
    RemoteError::Transport(format!("lock poisoned: {e}"))
}

#[async_trait]
impl RemoteContent for MemoryRemote {
    async fn fetch_field(&self, post_id: PostId, field: PostField) -> RemoteResult<String> {
        let posts = self.posts.read().map_err(poisoned)?;
        if !posts.keys().any(|(id, _)| *id == post_id) {
            return Err(RemoteError::Status {
                code: 404,
                body: format!("post {post_id} not found"),
            });
        }
        Ok(posts.get(&(post_id, field)).cloned().unwrap_or_default())
    }

    async fn replace_fields(
        &self,
        post_id: PostId,
        fields: &[(PostField, String)],
    ) -> RemoteResult<()> {
        self.writes
            .write()
            .map_err(poisoned)?
            .push((post_id, fields.to_vec()));

        if let Some(code) = self.failing.read().map_err(poisoned)?.get(&post_id) {
            return Err(RemoteError::Status {
                code: *code,
                body: "rejected".to_string(),
            });
        }

        let mut posts = self.posts.write().map_err(poisoned)?;
        for (field, value) in fields {
            posts.insert((post_id, *field), value.clone());
        }
        Ok(())
    }
}
