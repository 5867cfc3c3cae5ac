//! Wire types of the posts endpoint.

use postkeep_snapshot::{PostField, PostId};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::str::FromStr;

/// Post meta key holding the SEO description.
pub const SEO_DESCRIPTION_META: &str = "_ssp_description";

/// A text field as the API returns it.
///
/// `raw` is only present when the post was fetched with `context=edit`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rendered {
    #[serde(default)]
    pub rendered: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw: Option<String>,
}

impl Rendered {
    /// The stored source if available, otherwise the rendered HTML.
    pub fn source(&self) -> &str {
        self.raw.as_deref().unwrap_or(&self.rendered)
    }
}

/// Publication status of a post.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PostStatus {
    Publish,
    Draft,
    Private,
    Pending,
    Future,
}

impl PostStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PostStatus::Publish => "publish",
            PostStatus::Draft => "draft",
            PostStatus::Private => "private",
            PostStatus::Pending => "pending",
            PostStatus::Future => "future",
        }
    }
}

impl std::fmt::Display for PostStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PostStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "publish" | "published" => Ok(PostStatus::Publish),
            "draft" => Ok(PostStatus::Draft),
            "private" => Ok(PostStatus::Private),
            "pending" => Ok(PostStatus::Pending),
            "future" => Ok(PostStatus::Future),
            other => Err(format!("unknown post status: {other}")),
        }
    }
}

/// A post as returned by `GET /posts/{id}`.
#[derive(Debug, Clone, Deserialize)]
pub struct Post {
    pub id: u64,
    #[serde(default)]
    pub date: String,
    #[serde(default)]
    pub slug: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub link: String,
    #[serde(default)]
    pub title: Rendered,
    #[serde(default)]
    pub content: Rendered,
    #[serde(default)]
    pub excerpt: Rendered,
    #[serde(default)]
    pub featured_media: u64,
    #[serde(default)]
    pub categories: Vec<u64>,
    #[serde(default)]
    pub tags: Vec<u64>,
    /// Registered post meta. WordPress sends `[]` when there is none.
    #[serde(default)]
    pub meta: Value,
}

impl Post {
    pub fn post_id(&self) -> PostId {
        PostId(self.id)
    }

    pub fn seo_description(&self) -> Option<&str> {
        self.meta
            .get(SEO_DESCRIPTION_META)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    /// Current value of a field as it would be written back.
    pub fn field(&self, field: PostField) -> String {
        match field {
            PostField::Content => self.content.source().to_string(),
            PostField::Excerpt => self.excerpt.source().to_string(),
            PostField::Title => self.title.source().to_string(),
            PostField::Status => self.status.clone(),
            PostField::Seo => self.seo_description().unwrap_or_default().to_string(),
        }
    }
}

/// Partial body for `POST /posts/{id}`. Unset fields are left alone.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PostUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub excerpt: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Map::is_empty")]
    pub meta: Map<String, Value>,
}

impl PostUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_fields(fields: &[(PostField, String)]) -> Self {
        fields
            .iter()
            .fold(Self::new(), |update, (field, value)| update.set(*field, value))
    }

    pub fn set(mut self, field: PostField, value: impl Into<String>) -> Self {
        let value = value.into();
        match field {
            PostField::Content => self.content = Some(value),
            PostField::Excerpt => self.excerpt = Some(value),
            PostField::Title => self.title = Some(value),
            PostField::Status => self.status = Some(value),
            PostField::Seo => {
                self.meta
                    .insert(SEO_DESCRIPTION_META.to_string(), Value::String(value));
            }
        }
        self
    }

    pub fn status(self, status: PostStatus) -> Self {
        self.set(PostField::Status, status.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.content.is_none()
            && self.excerpt.is_none()
            && self.status.is_none()
            && self.meta.is_empty()
    }
}

/// Filters for `GET /posts`.
#[derive(Debug, Clone, Default)]
pub struct PostQuery {
    pub search: Option<String>,
    pub slug: Option<String>,
    pub statuses: Vec<PostStatus>,
    pub per_page: Option<u32>,
    pub page: Option<u32>,
}

impl PostQuery {
    pub fn search(term: impl Into<String>) -> Self {
        Self {
            search: Some(term.into()),
            ..Default::default()
        }
    }

    pub fn slug(slug: impl Into<String>) -> Self {
        Self {
            slug: Some(slug.into()),
            ..Default::default()
        }
    }

    pub fn with_statuses(mut self, statuses: &[PostStatus]) -> Self {
        self.statuses = statuses.to_vec();
        self
    }

    pub fn per_page(mut self, n: u32) -> Self {
        self.per_page = Some(n);
        self
    }

    pub(crate) fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![("context", "edit".to_string())];
        if let Some(search) = &self.search {
            params.push(("search", search.clone()));
        }
        if let Some(slug) = &self.slug {
            params.push(("slug", slug.clone()));
        }
        if !self.statuses.is_empty() {
            let statuses: Vec<&str> = self.statuses.iter().map(PostStatus::as_str).collect();
            params.push(("status", statuses.join(",")));
        }
        if let Some(n) = self.per_page {
            params.push(("per_page", n.to_string()));
        }
        if let Some(n) = self.page {
            params.push(("page", n.to_string()));
        }
        params
    }
}

/// The authenticated user, from `GET /users/me`.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

/// A category or tag.
#[derive(Debug, Clone, Deserialize)]
pub struct Term {
    pub id: u64,
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct Media {
    #[serde(default)]
    pub source_url: String,
}
