//! HTTP client for the WordPress REST API.

use crate::types::{Media, Term};
use crate::{CmsError, CmsResult, Post, PostQuery, PostUpdate, SiteConfig, User};
use async_trait::async_trait;
use postkeep_snapshot::{PostField, PostId, RemoteContent, RemoteResult};
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tracing::{debug, info, warn};

/// User agent for requests
const USER_AGENT: &str = concat!("postkeep/", env!("CARGO_PKG_VERSION"));

/// Largest page size the API accepts.
const MAX_PER_PAGE: u32 = 100;

/// Response header with the page count of a collection.
const TOTAL_PAGES_HEADER: &str = "x-wp-totalpages";

/// Client for one site's posts endpoint.
#[derive(Clone)]
pub struct WordPressClient {
    client: reqwest::Client,
    api_url: String,
    config: SiteConfig,
}

impl WordPressClient {
    /// Create a client from explicit site settings.
    pub fn new(config: SiteConfig) -> CmsResult<Self> {
        config.validate()?;
        let api_url = config.api_url()?;

        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        debug!(api_url = %api_url, user = %config.username, "Creating WordPress client");

        Ok(Self {
            client,
            api_url,
            config,
        })
    }

    pub fn api_url(&self) -> &str {
        &self.api_url
    }

    pub fn site_url(&self) -> &str {
        &self.config.site_url
    }

    /// Attach credentials, send, and turn non-2xx answers into errors.
    async fn send(&self, request: RequestBuilder) -> CmsResult<Response> {
        let response = request
            .basic_auth(&self.config.username, Some(&self.config.app_password))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "Request rejected by site");
            return Err(CmsError::Status {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// Fetch a post in edit context, so raw field sources are included.
    pub async fn get_post(&self, id: PostId) -> CmsResult<Post> {
        let url = format!("{}/posts/{}", self.api_url, id);
        debug!(post_id = %id, "GET post");
        let response = self
            .send(self.client.get(&url).query(&[("context", "edit")]))
            .await?;
        Ok(response.json().await?)
    }

    /// Send a partial update and return the post as the site stored it.
    pub async fn update_post(&self, id: PostId, update: &PostUpdate) -> CmsResult<Post> {
        if update.is_empty() {
            return Err(CmsError::EmptyUpdate(id.0));
        }
        let url = format!("{}/posts/{}", self.api_url, id);
        debug!(post_id = %id, "POST post update");
        let response = self.send(self.client.post(&url).json(update)).await?;
        let post: Post = response.json().await?;
        info!(post_id = %id, "Post updated");
        Ok(post)
    }

    /// One page of posts.
    pub async fn list_posts(&self, query: &PostQuery) -> CmsResult<Vec<Post>> {
        let url = format!("{}/posts", self.api_url);
        let response = self
            .send(self.client.get(&url).query(&query.to_params()))
            .await?;
        Ok(response.json().await?)
    }

    /// Every item of a collection endpoint such as `posts` or `tags`.
    ///
    /// Pages are requested until the last page the site announces in
    /// `X-WP-TotalPages`, a short page, or a 400 for a page past the end.
    pub async fn list_all<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> CmsResult<Vec<T>> {
        self.list_all_paged(endpoint, params, MAX_PER_PAGE).await
    }

    async fn list_all_paged<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
        per_page: u32,
    ) -> CmsResult<Vec<T>> {
        let url = format!("{}/{}", self.api_url, endpoint);
        let mut all = Vec::new();
        let mut page: u32 = 1;

        loop {
            let mut paged = params.to_vec();
            paged.push(("per_page", per_page.to_string()));
            paged.push(("page", page.to_string()));

            let response = match self.send(self.client.get(&url).query(&paged)).await {
                Ok(response) => response,
                Err(CmsError::Status { status: 400, .. }) if page > 1 => {
                    debug!(endpoint, page, "Page past the end, stopping");
                    break;
                }
                Err(e) => return Err(e),
            };

            let total_pages = response
                .headers()
                .get(TOTAL_PAGES_HEADER)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.trim().parse::<u32>().ok());

            let items: Vec<T> = response.json().await?;
            let count = items.len();
            debug!(endpoint, page, count, ?total_pages, "Fetched page");
            all.extend(items);

            let last_page = total_pages.is_some_and(|total| page >= total);
            if last_page || count < per_page as usize {
                break;
            }
            page += 1;
        }

        Ok(all)
    }

    /// Every post matching `query`, page by page.
    pub async fn list_all_posts(&self, query: &PostQuery) -> CmsResult<Vec<Post>> {
        let per_page = query.per_page.unwrap_or(MAX_PER_PAGE).clamp(1, MAX_PER_PAGE);
        let mut filters = query.clone();
        filters.per_page = None;
        filters.page = None;
        self.list_all_paged("posts", &filters.to_params(), per_page)
            .await
    }

    /// Names of taxonomy terms (`categories` or `tags`) by id.
    pub async fn term_names(&self, taxonomy: &str, ids: &[u64]) -> CmsResult<Vec<String>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let include = ids
            .iter()
            .map(u64::to_string)
            .collect::<Vec<_>>()
            .join(",");
        let terms: Vec<Term> = self.list_all(taxonomy, &[("include", include)]).await?;
        Ok(terms.into_iter().map(|t| t.name).collect())
    }

    /// The post with this slug, if any.
    pub async fn find_by_slug(&self, slug: &str) -> CmsResult<Option<Post>> {
        let posts = self.list_posts(&PostQuery::slug(slug)).await?;
        Ok(posts.into_iter().next())
    }

    /// Public URL of a media item.
    pub async fn media_source_url(&self, media_id: u64) -> CmsResult<String> {
        let url = format!("{}/media/{}", self.api_url, media_id);
        let media: Media = self.send(self.client.get(&url)).await?.json().await?;
        Ok(media.source_url)
    }

    /// The user the credentials belong to. Useful as a connection check.
    pub async fn current_user(&self) -> CmsResult<User> {
        let url = format!("{}/users/me", self.api_url);
        Ok(self.send(self.client.get(&url)).await?.json().await?)
    }
}

#[async_trait]
impl RemoteContent for WordPressClient {
    async fn fetch_field(&self, post_id: PostId, field: PostField) -> RemoteResult<String> {
        let post = self.get_post(post_id).await?;
        Ok(post.field(field))
    }

    async fn replace_fields(
        &self,
        post_id: PostId,
        fields: &[(PostField, String)],
    ) -> RemoteResult<()> {
        self.update_post(post_id, &PostUpdate::from_fields(fields))
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PostStatus;
    use postkeep_snapshot::RemoteError;
    use serde_json::json;
    use wiremock::matchers::{body_json, header_exists, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> WordPressClient {
        WordPressClient::new(SiteConfig::new(server.uri(), "editor", "abcd efgh").with_timeout(5))
            .unwrap()
    }

    fn post_json(id: u64, content: &str) -> serde_json::Value {
        json!({
            "id": id,
            "date": "2025-08-06T13:13:22",
            "slug": format!("post-{id}"),
            "status": "publish",
            "link": format!("https://blog.example.com/post-{id}/"),
            "title": {"rendered": "Title", "raw": "Title"},
            "content": {"rendered": content, "raw": content},
            "excerpt": {"rendered": "", "raw": ""},
            "featured_media": 0,
            "meta": []
        })
    }

    #[tokio::test]
    async fn test_get_post_uses_edit_context_and_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts/42"))
            .and(query_param("context", "edit"))
            .and(header_exists("authorization"))
            .respond_with(ResponseTemplate::new(200).set_body_json(post_json(42, "<p>A</p>")))
            .expect(1)
            .mount(&server)
            .await;

        let post = client_for(&server).get_post(PostId(42)).await.unwrap();
        assert_eq!(post.id, 42);
        assert_eq!(post.field(PostField::Content), "<p>A</p>");
    }

    #[tokio::test]
    async fn test_update_sends_partial_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts/42"))
            .and(body_json(json!({"status": "draft"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(post_json(42, "")))
            .expect(1)
            .mount(&server)
            .await;

        client_for(&server)
            .update_post(PostId(42), &PostUpdate::new().status(PostStatus::Draft))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_empty_update_is_not_sent() {
        let server = MockServer::start().await;
        let err = client_for(&server)
            .update_post(PostId(1), &PostUpdate::new())
            .await
            .unwrap_err();
        assert!(matches!(err, CmsError::EmptyUpdate(1)));
        assert!(server.received_requests().await.unwrap_or_default().is_empty());
    }

    #[tokio::test]
    async fn test_error_status_keeps_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts/7"))
            .respond_with(
                ResponseTemplate::new(403)
                    .set_body_json(json!({"code": "rest_cannot_edit", "message": "nope"})),
            )
            .mount(&server)
            .await;

        let err = client_for(&server)
            .replace_field(PostId(7), PostField::Content, "x")
            .await
            .unwrap_err();
        match err {
            RemoteError::Status { code, body } => {
                assert_eq!(code, 403);
                assert!(body.contains("rest_cannot_edit"));
            }
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remote_round_trip_through_trait() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/wp-json/wp/v2/posts/42"))
            .and(body_json(json!({"content": "A"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(post_json(42, "A")))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts/42"))
            .respond_with(ResponseTemplate::new(200).set_body_json(post_json(42, "A")))
            .mount(&server)
            .await;

        let client = client_for(&server);
        client
            .replace_field(PostId(42), PostField::Content, "A")
            .await
            .unwrap();
        let value = client
            .fetch_field(PostId(42), PostField::Content)
            .await
            .unwrap();
        assert_eq!(value, "A");
    }

    #[tokio::test]
    async fn test_list_all_posts_pages_until_short_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([post_json(1, "a"), post_json(2, "b")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([post_json(3, "c")])))
            .mount(&server)
            .await;

        let posts = client_for(&server)
            .list_all_posts(&PostQuery::default().per_page(2))
            .await
            .unwrap();
        let ids: Vec<u64> = posts.iter().map(|p| p.id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_list_all_posts_stops_on_invalid_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!([post_json(1, "a"), post_json(2, "b")])),
            )
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "code": "rest_post_invalid_page_number",
                "message": "The page number requested is larger than the number of pages available."
            })))
            .expect(1)
            .mount(&server)
            .await;

        let posts = client_for(&server)
            .list_all_posts(&PostQuery::default().per_page(2))
            .await
            .unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn test_list_all_posts_honours_total_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("page", "1"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("X-WP-TotalPages", "1")
                    .set_body_json(json!([post_json(1, "a"), post_json(2, "b")])),
            )
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("page", "2"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([post_json(3, "c")])))
            .expect(0)
            .mount(&server)
            .await;

        let posts = client_for(&server)
            .list_all_posts(&PostQuery::default().per_page(2))
            .await
            .unwrap();
        assert_eq!(posts.len(), 2);
    }

    #[tokio::test]
    async fn test_first_page_error_is_not_swallowed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({"code": "bad"})))
            .mount(&server)
            .await;

        let err = client_for(&server)
            .list_all_posts(&PostQuery::default())
            .await
            .unwrap_err();
        assert!(matches!(err, CmsError::Status { status: 400, .. }));
    }

    #[tokio::test]
    async fn test_term_names() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/tags"))
            .and(query_param("include", "3,5"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": 3, "name": "sleep"},
                {"id": 5, "name": "health"}
            ])))
            .expect(1)
            .mount(&server)
            .await;

        let client = client_for(&server);
        assert_eq!(
            client.term_names("tags", &[3, 5]).await.unwrap(),
            vec!["sleep", "health"]
        );
        assert!(client.term_names("tags", &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_find_by_slug_and_media() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("slug", "audible-guide"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([post_json(5, "x")])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/posts"))
            .and(query_param("slug", "missing"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/media/9"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({"id": 9, "source_url": "https://cdn.example/9.jpg"})),
            )
            .mount(&server)
            .await;

        let client = client_for(&server);
        let post = client.find_by_slug("audible-guide").await.unwrap().unwrap();
        assert_eq!(post.id, 5);
        assert!(client.find_by_slug("missing").await.unwrap().is_none());
        assert_eq!(
            client.media_source_url(9).await.unwrap(),
            "https://cdn.example/9.jpg"
        );
    }

    #[tokio::test]
    async fn test_transport_error_when_unreachable() {
        let client =
            WordPressClient::new(SiteConfig::new("http://127.0.0.1:1", "editor", "pw").with_timeout(2))
                .unwrap();

        let err = client
            .fetch_field(PostId(1), PostField::Content)
            .await
            .unwrap_err();
        assert!(matches!(err, RemoteError::Transport(_)));
    }

    #[tokio::test]
    async fn test_current_user() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/wp-json/wp/v2/users/me"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "name": "muffin"})))
            .mount(&server)
            .await;

        let user = client_for(&server).current_user().await.unwrap();
        assert_eq!(user.name, "muffin");
    }
}
