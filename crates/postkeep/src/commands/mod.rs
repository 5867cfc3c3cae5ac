//! Command handlers for the postkeep CLI.
//!
//! Handlers print progress for humans on stdout; diagnostics go through
//! tracing to stderr.

pub mod edit;
pub mod logging;
pub mod site;
pub mod snapshot;

pub use edit::*;
pub use logging::*;
pub use site::*;
pub use snapshot::*;

use async_trait::async_trait;
use postkeep_cms::WordPressClient;
use postkeep_core::{Config, GuardedEditor};
use postkeep_snapshot::{
    PostField, PostId, RemoteContent, RemoteError, RemoteResult, SnapshotStore,
};
use std::path::PathBuf;
use std::sync::Arc;

/// Everything a handler needs: where we are and how we are configured.
pub struct Context {
    pub cwd: PathBuf,
    pub config: Config,
    pub sources: Vec<PathBuf>,
    snapshot_dir: Option<PathBuf>,
}

impl Context {
    pub fn new(
        cwd: PathBuf,
        config: Config,
        sources: Vec<PathBuf>,
        snapshot_dir: Option<PathBuf>,
    ) -> Self {
        Self {
            cwd,
            config,
            sources,
            snapshot_dir,
        }
    }

    /// Snapshot directory: `--snapshot-dir`, then the config, then the default.
    pub fn snapshot_dir(&self) -> PathBuf {
        match &self.snapshot_dir {
            Some(dir) => self.cwd.join(dir),
            None => self.config.snapshot_dir(&self.cwd),
        }
    }

    /// Client for the configured site.
    pub fn client(&self) -> anyhow::Result<WordPressClient> {
        let site = self.config.site_config()?;
        Ok(WordPressClient::new(site)?)
    }

    /// Snapshot store backed by the configured site.
    ///
    /// Without a usable site configuration the store still works for local
    /// reads; any remote call fails with the configuration problem.
    pub async fn store(&self) -> anyhow::Result<SnapshotStore> {
        let remote: Arc<dyn RemoteContent> = match self.client() {
            Ok(client) => Arc::new(client),
            Err(e) => Arc::new(Unconfigured {
                reason: e.to_string(),
            }),
        };
        Ok(SnapshotStore::new(self.snapshot_dir(), remote).await?)
    }

    /// Snapshot store that requires a working site configuration.
    pub async fn connected_store(&self) -> anyhow::Result<SnapshotStore> {
        let client = self.client()?;
        Ok(SnapshotStore::new(self.snapshot_dir(), Arc::new(client)).await?)
    }

    pub async fn editor(&self) -> anyhow::Result<GuardedEditor> {
        Ok(GuardedEditor::new(self.connected_store().await?))
    }
}

/// Remote used when no site is configured. Every call fails.
struct Unconfigured {
    reason: String,
}

impl Unconfigured {
    fn error(&self) -> RemoteError {
        RemoteError::Transport(format!("site not configured: {}", self.reason))
    }
}

#[async_trait]
impl RemoteContent for Unconfigured {
    async fn fetch_field(&self, _post_id: PostId, _field: PostField) -> RemoteResult<String> {
        Err(self.error())
    }

    async fn replace_fields(
        &self,
        _post_id: PostId,
        _fields: &[(PostField, String)],
    ) -> RemoteResult<()> {
        Err(self.error())
    }
}
