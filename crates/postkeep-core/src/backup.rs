//! Full-site JSON backup.
//!
//! Every collection worth keeping (posts, pages, categories, tags, media and
//! users) is paged through and written to its own `<name>_backup.json` in a
//! fresh `wordpress_backup_<timestamp>` directory, followed by a
//! `backup_summary.json`. A collection that cannot be fetched is recorded as
//! failed and the backup carries on with the rest.

use crate::CoreResult;
use chrono::Local;
use postkeep_cms::{CmsResult, WordPressClient};
use serde::Serialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Name of the summary written last into every backup directory.
pub const BACKUP_SUMMARY_FILE: &str = "backup_summary.json";

/// User fields kept in a backup. Everything else (email, links, avatars) is
/// dropped.
const USER_FIELDS: [&str; 6] = ["id", "name", "slug", "description", "roles", "capabilities"];

/// Statuses of posts and pages included in a backup.
const BACKUP_STATUSES: &str = "publish,draft,private";

/// A collection included in a site backup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackupResource {
    Posts,
    Pages,
    Categories,
    Tags,
    Media,
    Users,
}

impl BackupResource {
    pub const ALL: [BackupResource; 6] = [
        BackupResource::Posts,
        BackupResource::Pages,
        BackupResource::Categories,
        BackupResource::Tags,
        BackupResource::Media,
        BackupResource::Users,
    ];

    /// Endpoint name, also used as the statistics key.
    pub fn name(&self) -> &'static str {
        match self {
            BackupResource::Posts => "posts",
            BackupResource::Pages => "pages",
            BackupResource::Categories => "categories",
            BackupResource::Tags => "tags",
            BackupResource::Media => "media",
            BackupResource::Users => "users",
        }
    }

    pub fn file_name(&self) -> String {
        format!("{}_backup.json", self.name())
    }

    fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            BackupResource::Posts | BackupResource::Pages => vec![
                ("context", "edit".to_string()),
                ("status", BACKUP_STATUSES.to_string()),
            ],
            BackupResource::Users => vec![("context", "edit".to_string())],
            _ => Vec::new(),
        }
    }
}

/// What a backup run wrote. Serialized as `backup_summary.json`.
#[derive(Debug, Clone, Serialize)]
pub struct BackupSummary {
    pub backup_date: String,
    pub site_url: String,
    pub backup_location: PathBuf,
    /// Item count per collection. Failed collections count as 0.
    pub statistics: BTreeMap<String, usize>,
    pub total_items: usize,
    /// Error per collection that could not be fetched.
    #[serde(skip_serializing_if = "BTreeMap::is_empty")]
    pub failed: BTreeMap<String, String>,
}

impl BackupSummary {
    pub fn is_complete(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Back up the whole site into a new directory under `root`.
///
/// Existing backups are never touched: a directory name already taken gets a
/// numeric suffix.
pub async fn backup_site(client: &WordPressClient, root: &Path) -> CoreResult<BackupSummary> {
    let now = Local::now();
    let name = now.format("wordpress_backup_%Y%m%d_%H%M%S").to_string();
    let dir = create_backup_dir(root, &name).await?;
    info!(dir = %dir.display(), site = %client.site_url(), "Starting site backup");

    let mut statistics = BTreeMap::new();
    let mut failed = BTreeMap::new();

    for resource in BackupResource::ALL {
        match fetch(client, resource).await {
            Ok(items) => {
                let path = dir.join(resource.file_name());
                tokio::fs::write(&path, serde_json::to_string_pretty(&items)?).await?;
                info!(resource = resource.name(), count = items.len(), "Backed up");
                statistics.insert(resource.name().to_string(), items.len());
            }
            Err(e) => {
                warn!(resource = resource.name(), error = %e, "Backup of collection failed");
                statistics.insert(resource.name().to_string(), 0);
                failed.insert(resource.name().to_string(), e.to_string());
            }
        }
    }

    let summary = BackupSummary {
        backup_date: now.to_rfc3339(),
        site_url: client.site_url().to_string(),
        backup_location: dir.clone(),
        total_items: statistics.values().sum(),
        statistics,
        failed,
    };
    tokio::fs::write(
        dir.join(BACKUP_SUMMARY_FILE),
        serde_json::to_string_pretty(&summary)?,
    )
    .await?;

    info!(
        dir = %dir.display(),
        total = summary.total_items,
        failed = summary.failed.len(),
        "Site backup written"
    );
    Ok(summary)
}

async fn fetch(client: &WordPressClient, resource: BackupResource) -> CmsResult<Vec<Value>> {
    let items: Vec<Value> = client.list_all(resource.name(), &resource.params()).await?;
    Ok(match resource {
        BackupResource::Users => items.into_iter().filter_map(safe_user).collect(),
        _ => items,
    })
}

fn safe_user(user: Value) -> Option<Value> {
    let Value::Object(fields) = user else {
        return None;
    };
    Some(Value::Object(
        fields
            .into_iter()
            .filter(|(key, _)| USER_FIELDS.contains(&key.as_str()))
            .collect(),
    ))
}

/// Create `root/name`, or `root/name_<n>` when that is taken.
async fn create_backup_dir(root: &Path, name: &str) -> CoreResult<PathBuf> {
    tokio::fs::create_dir_all(root).await?;

    let mut attempt = 0u32;
    loop {
        let dir = if attempt == 0 {
            root.join(name)
        } else {
            root.join(format!("{name}_{attempt}"))
        };
        match tokio::fs::create_dir(&dir).await {
            Ok(()) => return Ok(dir),
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists && attempt < 100 => {
                attempt += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }
}
