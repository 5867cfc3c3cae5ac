//! Configuration management for postkeep.
//!
//! Configuration is loaded from multiple sources and merged:
//! 1. Global config: `~/.config/postkeep/config.json`
//! 2. Project config: `postkeep.jsonc` or `postkeep.json` in the working directory
//!    (or an explicit file given on the command line)
//! 3. Environment overrides: `POSTKEEP_*` variables
//!
//! Supports JSONC (JSON with comments) and variable substitution:
//! - `{env:VAR_NAME}` - Substitute environment variable
//! - `{file:path}` - Substitute file contents

use crate::error::{ConfigError, CoreResult};
use postkeep_cms::{SiteConfig, DEFAULT_TIMEOUT_SECS};
use postkeep_util::LogLevel;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

pub const ENV_SITE_URL: &str = "POSTKEEP_SITE_URL";
pub const ENV_USERNAME: &str = "POSTKEEP_USERNAME";
pub const ENV_APP_PASSWORD: &str = "POSTKEEP_APP_PASSWORD";
pub const ENV_SNAPSHOT_DIR: &str = "POSTKEEP_SNAPSHOT_DIR";

/// Project config file names, in lookup order.
const PROJECT_FILES: [&str; 2] = ["postkeep.jsonc", "postkeep.json"];

/// Static regex for variable substitution, compiled once.
static VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

/// Get the variable substitution regex, compiling it once on first use.
fn var_regex() -> &'static regex::Regex {
    VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\{(env|file):([^}]+)\}")
            .expect("Invalid regex pattern - this is a compile-time constant")
    })
}

/// Main configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Site connection.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub site: Option<SiteSection>,

    /// Where snapshots are written. Relative paths are resolved against the
    /// project directory.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub snapshot_dir: Option<PathBuf>,

    /// Log level for the workspace crates.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_level: Option<String>,

    /// Portfolio mirror settings.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub export: Option<ExportSection>,
}

/// Site connection settings as written in a config file.
#[derive(Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteSection {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,
}

impl std::fmt::Debug for SiteSection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteSection")
            .field("url", &self.url)
            .field("username", &self.username)
            .field(
                "app_password",
                &self.app_password.as_ref().map(|_| "<redacted>"),
            )
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Portfolio mirror settings.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ExportSection {
    /// Path of the mirror's `articles.json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub articles_path: Option<PathBuf>,
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// Loading order (later sources override earlier):
    /// 1. Global config from `~/.config/postkeep/`
    /// 2. `explicit` if given, otherwise project config from `project_dir`
    /// 3. `POSTKEEP_*` environment variables
    pub async fn load(
        project_dir: Option<&Path>,
        explicit: Option<&Path>,
    ) -> CoreResult<(Self, Vec<PathBuf>)> {
        let mut config = Config::default();
        let mut sources = Vec::new();

        // 1. Load global config
        if let Some(global_dir) = postkeep_util::path::config_dir() {
            for name in ["config.json", "postkeep.jsonc", "postkeep.json"] {
                let path = global_dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        // 2. Explicit file, or project config
        if let Some(path) = explicit {
            config = config.merge(Self::load_file(path).await?);
            sources.push(path.to_path_buf());
        } else if let Some(dir) = project_dir {
            for name in PROJECT_FILES {
                let path = dir.join(name);
                if path.exists() {
                    config = config.merge(Self::load_file(&path).await?);
                    sources.push(path);
                    break;
                }
            }
        }

        // 3. Environment overrides
        config = config.apply_env(|name| std::env::var(name).ok());

        Ok((config, sources))
    }

    /// Load configuration from a file.
    ///
    /// Comments are stripped before `{env:}` and `{file:}` references are
    /// resolved, so commented-out references are never looked up.
    pub async fn load_file(path: &Path) -> CoreResult<Self> {
        let content = tokio::fs::read_to_string(path).await.map_err(|e| {
            ConfigError::InvalidPath(format!("cannot read {}: {e}", path.display()))
        })?;
        let source = path.display().to_string();
        let content = Self::strip_comments(&content);
        let content = Self::substitute_variables(&content, path)?;
        Self::parse(&content, &source)
    }

    /// Apply `POSTKEEP_*` overrides using `lookup` to read variables.
    pub fn apply_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = lookup(ENV_SITE_URL);
        let username = lookup(ENV_USERNAME);
        let app_password = lookup(ENV_APP_PASSWORD);

        if url.is_some() || username.is_some() || app_password.is_some() {
            let site = self.site.get_or_insert_with(SiteSection::default);
            site.url = url.or(site.url.take());
            site.username = username.or(site.username.take());
            site.app_password = app_password.or(site.app_password.take());
        }
        if let Some(dir) = lookup(ENV_SNAPSHOT_DIR) {
            self.snapshot_dir = Some(PathBuf::from(dir));
        }
        self
    }

    /// Site settings ready to build a client.
    pub fn site_config(&self) -> CoreResult<SiteConfig> {
        let site = self
            .site
            .as_ref()
            .ok_or_else(|| ConfigError::Missing("site".to_string()))?;
        let required = |value: &Option<String>, name: &str| {
            value
                .clone()
                .filter(|v| !v.trim().is_empty())
                .ok_or_else(|| ConfigError::Missing(format!("site.{name}")))
        };

        Ok(SiteConfig::new(
            required(&site.url, "url")?,
            required(&site.username, "username")?,
            required(&site.app_password, "app_password")?,
        )
        .with_timeout(site.timeout_secs.unwrap_or(DEFAULT_TIMEOUT_SECS)))
    }

    /// Snapshot directory, resolved against `project_root`.
    pub fn snapshot_dir(&self, project_root: &Path) -> PathBuf {
        match &self.snapshot_dir {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => project_root.join(dir),
            None => postkeep_util::path::default_snapshot_dir(project_root),
        }
    }

    /// Configured log level, if it parses.
    pub fn log_level(&self) -> Option<LogLevel> {
        self.log_level.as_deref().and_then(LogLevel::parse)
    }

    /// Mirror file path, resolved against `project_root`.
    pub fn articles_path(&self, project_root: &Path) -> Option<PathBuf> {
        self.export
            .as_ref()
            .and_then(|e| e.articles_path.as_ref())
            .map(|p| project_root.join(p))
    }

    /// Parse JSON with comments already stripped.
    fn parse(content: &str, source: &str) -> CoreResult<Self> {
        serde_json::from_str(content).map_err(|e| {
            ConfigError::InvalidJson {
                path: source.to_string(),
                message: e.to_string(),
            }
            .into()
        })
    }

    /// Strip JSON comments.
    fn strip_comments(input: &str) -> String {
        let mut result = String::with_capacity(input.len());
        let mut chars = input.chars().peekable();
        let mut in_string = false;
        let mut escape_next = false;

        while let Some(c) = chars.next() {
            if escape_next {
                result.push(c);
                escape_next = false;
                continue;
            }

            if c == '\\' && in_string {
                result.push(c);
                escape_next = true;
                continue;
            }

            if c == '"' {
                in_string = !in_string;
                result.push(c);
                continue;
            }

            if in_string {
                result.push(c);
                continue;
            }

            if c == '/' {
                match chars.peek() {
                    Some('/') => {
                        chars.next();
                        for c in chars.by_ref() {
                            if c == '\n' {
                                result.push('\n');
                                break;
                            }
                        }
                        continue;
                    }
                    Some('*') => {
                        chars.next();
                        let mut prev = ' ';
                        for c in chars.by_ref() {
                            if prev == '*' && c == '/' {
                                break;
                            }
                            // Preserve newlines for error reporting
                            if c == '\n' {
                                result.push('\n');
                            }
                            prev = c;
                        }
                        continue;
                    }
                    _ => {}
                }
            }

            result.push(c);
        }

        result
    }

    /// Substitute `{env:VAR}` and `{file:path}` references.
    ///
    /// File references are relative to the config file. Values placed inside
    /// a JSON string are escaped; elsewhere they are inserted as written.
    fn substitute_variables(content: &str, config_path: &Path) -> CoreResult<String> {
        let config_dir = config_path.parent().unwrap_or(Path::new("."));
        let mut result = String::with_capacity(content.len());
        let mut last = 0;

        for cap in var_regex().captures_iter(content) {
            let (Some(full), Some(kind), Some(value)) = (cap.get(0), cap.get(1), cap.get(2))
            else {
                continue;
            };

            let replacement = match kind.as_str() {
                "env" => std::env::var(value.as_str()).map_err(|_| {
                    ConfigError::EnvVarNotFound {
                        name: value.as_str().to_string(),
                    }
                })?,
                "file" => {
                    let file_path = config_dir.join(value.as_str());
                    std::fs::read_to_string(&file_path)
                        .map(|v| v.trim().to_string())
                        .map_err(|_| ConfigError::FileRefNotFound {
                            path: file_path.display().to_string(),
                        })?
                }
                _ => continue,
            };

            result.push_str(&content[last..full.start()]);
            if in_string_at(content, full.start()) {
                let quoted =
                    serde_json::to_string(&replacement).map_err(|e| ConfigError::InvalidJson {
                        path: config_path.display().to_string(),
                        message: e.to_string(),
                    })?;
                result.push_str(&quoted[1..quoted.len() - 1]);
            } else {
                result.push_str(&replacement);
            }
            last = full.end();
        }

        result.push_str(&content[last..]);
        Ok(result)
    }

    /// Merge another config into this one (other takes precedence).
    pub fn merge(self, other: Self) -> Self {
        Self {
            site: match (self.site, other.site) {
                (Some(base), Some(over)) => Some(SiteSection {
                    url: merge_option(base.url, over.url),
                    username: merge_option(base.username, over.username),
                    app_password: merge_option(base.app_password, over.app_password),
                    timeout_secs: merge_option(base.timeout_secs, over.timeout_secs),
                }),
                (base, over) => merge_option(base, over),
            },
            snapshot_dir: merge_option(self.snapshot_dir, other.snapshot_dir),
            log_level: merge_option(self.log_level, other.log_level),
            export: merge_option(self.export, other.export),
        }
    }
}

/// Whether byte offset `pos` of comment-free JSON lies inside a string.
fn in_string_at(content: &str, pos: usize) -> bool {
    let mut in_string = false;
    let mut escape_next = false;

    for c in content[..pos].chars() {
        if escape_next {
            escape_next = false;
        } else if c == '\\' && in_string {
            escape_next = true;
        } else if c == '"' {
            in_string = !in_string;
        }
    }

    in_string
}

/// Merge two Option values.
fn merge_option<T>(base: Option<T>, other: Option<T>) -> Option<T> {
    match (base, other) {
        (_, Some(o)) => Some(o),
        (b, None) => b,
    }
}
