//! Site connection settings.

use crate::{CmsError, CmsResult};
use serde::{Deserialize, Serialize};
use url::Url;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Path of the core REST namespace below the site root.
const API_PATH: &str = "wp-json/wp/v2";

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

/// How to reach and authenticate against one site.
///
/// `app_password` is a WordPress application password, sent with HTTP basic
/// auth.
#[derive(Clone, Serialize, Deserialize)]
pub struct SiteConfig {
    pub site_url: String,
    pub username: String,
    pub app_password: String,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl SiteConfig {
    pub fn new(
        site_url: impl Into<String>,
        username: impl Into<String>,
        app_password: impl Into<String>,
    ) -> Self {
        Self {
            site_url: site_url.into(),
            username: username.into(),
            app_password: app_password.into(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout_secs = secs;
        self
    }

    /// Check that every field needed to connect is present.
    pub fn validate(&self) -> CmsResult<()> {
        if self.site_url.trim().is_empty() {
            return Err(CmsError::invalid_config("site_url is empty"));
        }
        if self.username.trim().is_empty() {
            return Err(CmsError::invalid_config("username is empty"));
        }
        if self.app_password.is_empty() {
            return Err(CmsError::invalid_config("app_password is empty"));
        }
        Ok(())
    }

    /// Base URL of the REST API, without a trailing slash.
    pub fn api_url(&self) -> CmsResult<String> {
        let site = Url::parse(self.site_url.trim())?;
        match site.scheme() {
            "http" | "https" => {}
            other => {
                return Err(CmsError::invalid_config(format!(
                    "unsupported scheme: {other}"
                )))
            }
        }
        Ok(format!(
            "{}/{}",
            site.as_str().trim_end_matches('/'),
            API_PATH
        ))
    }
}

impl std::fmt::Debug for SiteConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SiteConfig")
            .field("site_url", &self.site_url)
            .field("username", &self.username)
            .field("app_password", &"<redacted>")
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}
