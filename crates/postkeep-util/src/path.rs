//! Well-known directories.

use std::path::{Path, PathBuf};

/// Name of the project-local directory.
pub const PROJECT_DIR: &str = ".postkeep";

/// Get the postkeep configuration directory.
///
/// On Unix, `~/.config/postkeep` is preferred when it exists, matching most
/// command-line tools; otherwise the platform config directory is used.
pub fn config_dir() -> Option<PathBuf> {
    #[cfg(unix)]
    {
        if let Some(home) = dirs::home_dir() {
            let xdg_config = home.join(".config").join("postkeep");
            if xdg_config.exists() {
                return Some(xdg_config);
            }
        }
    }

    dirs::config_dir().map(|p| p.join("postkeep"))
}

/// Snapshot directory used when none is configured.
pub fn default_snapshot_dir(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join("snapshots")
}

/// Where full-site backups go when no directory is given.
pub fn default_backup_dir(project_root: &Path) -> PathBuf {
    project_root.join(PROJECT_DIR).join("site-backups")
}
