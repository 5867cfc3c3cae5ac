//! Refreshing the portfolio mirror (`articles.json`) from the site.
//!
//! The mirror is a JSON object whose `blogArticles` array lists posts by
//! public URL. Each entry is looked up by the last path segment of its URL
//! and its `title`, `description`, `date`, `thumbnail` and `tags` are
//! rewritten. Tags are the post's category and tag names, or keywords found
//! in the title when it has none. A successful write stamps `_lastUpdate`
//! and `_cacheBreaker` at the top level. Other keys are left untouched.

use crate::html::{strip_tags, truncate_chars};
use crate::{CoreError, CoreResult};
use chrono::Local;
use postkeep_cms::{CmsResult, Post, WordPressClient};
use serde::Serialize;
use serde_json::{Map, Value};
use std::path::Path;
use tracing::{debug, info, warn};

/// Key of the article list in the mirror file.
pub const ARTICLES_KEY: &str = "blogArticles";

/// Content fallback descriptions are cut to this many characters.
const DESCRIPTION_FALLBACK_CHARS: usize = 150;

/// Most tags an entry carries.
const MAX_TAGS: usize = 6;

/// Title keywords and the tag each one implies.
const TITLE_TAGS: &[(&str, &str)] = &[
    ("Audible", "オーディオブック"),
    ("オーディブル", "オーディオブック"),
    ("読書", "読書術"),
    ("集中", "集中力向上"),
    ("SEO", "SEO"),
    ("AI", "AI活用"),
    ("睡眠", "睡眠改善"),
    ("健康", "健康"),
    ("ブログ", "ブログ運営"),
    ("投資", "投資"),
    ("節約", "節約術"),
    ("WordPress", "WordPress"),
];

/// Added when the title yields fewer than two tags.
const GENERIC_TAG: &str = "ライフハック";

/// Outcome of a mirror refresh.
#[derive(Debug, Clone, Default, Serialize)]
pub struct MirrorReport {
    /// URLs of refreshed entries.
    pub refreshed: Vec<String>,
    /// Entries kept as they were, with the reason.
    pub kept: Vec<KeptEntry>,
}

#[derive(Debug, Clone, Serialize)]
pub struct KeptEntry {
    pub url: Option<String>,
    pub reason: String,
}

impl MirrorReport {
    pub fn total(&self) -> usize {
        self.refreshed.len() + self.kept.len()
    }
}

/// Slug of a post URL: its last non-empty path segment.
pub fn slug_from_url(article_url: &str) -> Option<String> {
    let parsed = url::Url::parse(article_url).ok()?;
    parsed
        .path_segments()?
        .rev()
        .find(|s| !s.is_empty())
        .map(str::to_string)
}

/// Refresh every entry of the mirror file at `path` and write it back.
///
/// An entry whose lookup fails is kept unchanged. The file itself must be
/// readable and hold a `blogArticles` array, otherwise nothing is written.
pub async fn refresh_mirror(client: &WordPressClient, path: &Path) -> CoreResult<MirrorReport> {
    let text = tokio::fs::read_to_string(path).await?;
    let mut data: Value = serde_json::from_str(&text)?;

    let articles = data
        .get_mut(ARTICLES_KEY)
        .and_then(Value::as_array_mut)
        .ok_or_else(|| CoreError::InvalidMirror {
            path: path.display().to_string(),
            message: format!("missing `{ARTICLES_KEY}` array"),
        })?;

    let mut report = MirrorReport::default();
    for entry in articles.iter_mut() {
        let Some(fields) = entry.as_object_mut() else {
            report.kept.push(KeptEntry {
                url: None,
                reason: "entry is not an object".to_string(),
            });
            continue;
        };
        let url = fields.get("url").and_then(Value::as_str).map(str::to_string);

        match refresh_entry(client, fields, url.as_deref()).await {
            Ok(()) => {
                if let Some(url) = url {
                    info!(url = %url, "Refreshed mirror entry");
                    report.refreshed.push(url);
                }
            }
            Err(reason) => {
                warn!(url = ?url, reason = %reason, "Keeping mirror entry as is");
                report.kept.push(KeptEntry { url, reason });
            }
        }
    }

    let now = Local::now();
    if let Some(top) = data.as_object_mut() {
        top.insert(
            "_lastUpdate".into(),
            now.format("%Y-%m-%dT%H:%M:%S%:z").to_string().into(),
        );
        top.insert("_cacheBreaker".into(), now.timestamp().into());
    }

    tokio::fs::write(path, serde_json::to_string_pretty(&data)?).await?;
    info!(
        path = %path.display(),
        refreshed = report.refreshed.len(),
        kept = report.kept.len(),
        "Mirror written"
    );
    Ok(report)
}

/// Overwrite the refreshable keys of one entry. On error the entry is left
/// as it was.
async fn refresh_entry(
    client: &WordPressClient,
    fields: &mut Map<String, Value>,
    url: Option<&str>,
) -> Result<(), String> {
    let url = url.ok_or_else(|| "entry has no url".to_string())?;
    let slug = slug_from_url(url).ok_or_else(|| format!("no slug in {url}"))?;

    let post = client
        .find_by_slug(&slug)
        .await
        .map_err(|e| e.to_string())?
        .ok_or_else(|| format!("no post with slug {slug}"))?;
    debug!(slug = %slug, post_id = post.id, "Found post for mirror entry");

    let thumbnail = if post.featured_media == 0 {
        Value::Null
    } else {
        match client.media_source_url(post.featured_media).await {
            Ok(source) => Value::String(source),
            Err(e) => {
                warn!(media_id = post.featured_media, error = %e, "Thumbnail lookup failed");
                fields.get("thumbnail").cloned().unwrap_or(Value::Null)
            }
        }
    };

    let tags = match entry_tags(client, &post).await {
        Ok(tags) => Value::from(tags),
        Err(e) => {
            warn!(post_id = post.id, error = %e, "Term lookup failed");
            fields.get("tags").cloned().unwrap_or_else(|| Value::Array(Vec::new()))
        }
    };

    fields.insert("title".into(), strip_tags(&post.title.rendered).into());
    fields.insert("description".into(), describe(&post).into());
    fields.insert("date".into(), date_part(&post.date).into());
    fields.insert("thumbnail".into(), thumbnail);
    fields.insert("tags".into(), tags);
    Ok(())
}

/// Category names, then tag names, falling back to title keywords.
async fn entry_tags(client: &WordPressClient, post: &Post) -> CmsResult<Vec<String>> {
    let mut names = client.term_names("categories", &post.categories).await?;
    names.extend(client.term_names("tags", &post.tags).await?);
    if names.is_empty() {
        names = tags_from_title(&strip_tags(&post.title.rendered));
    }

    let mut tags: Vec<String> = Vec::new();
    for name in names {
        if !tags.contains(&name) {
            tags.push(name);
        }
    }
    tags.truncate(MAX_TAGS);
    Ok(tags)
}

fn tags_from_title(title: &str) -> Vec<String> {
    let title = title.to_lowercase();
    let mut tags: Vec<String> = Vec::new();
    for (keyword, tag) in TITLE_TAGS {
        if title.contains(&keyword.to_lowercase()) && !tags.iter().any(|t| t == tag) {
            tags.push(tag.to_string());
        }
    }
    if tags.len() < 2 {
        tags.push(GENERIC_TAG.to_string());
    }
    tags
}

/// SEO description, else the stripped excerpt, else the start of the content.
fn describe(post: &Post) -> String {
    if let Some(seo) = post.seo_description() {
        return seo.to_string();
    }
    let excerpt = strip_tags(&post.excerpt.rendered);
    if !excerpt.is_empty() {
        return excerpt;
    }
    truncate_chars(
        &strip_tags(&post.content.rendered),
        DESCRIPTION_FALLBACK_CHARS,
    )
}

fn date_part(date: &str) -> &str {
    date.split('T').next().unwrap_or_default()
}
