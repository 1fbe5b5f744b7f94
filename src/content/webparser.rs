use serde::de::IgnoredAny;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::feed::fetcher::read_limited_bytes;
use crate::storage::Article;
use crate::util::validate_url;

/// Hosted content-extraction endpoint the reader has always used.
pub const DEFAULT_WEBPARSER_ENDPOINT: &str =
    "https://uptime-mercury-api.azurewebsites.net/webparser";

const MAX_CONTENT_SIZE: usize = 5 * 1024 * 1024; // 5MB

#[derive(Debug, Error)]
pub enum ContentError {
    #[error("Request timed out")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("HTTP error: status {0}")]
    HttpStatus(u16),
    #[error("Response too large (exceeds {0} bytes)")]
    ResponseTooLarge(usize),
    #[error("Invalid JSON in response: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("Invalid URL")]
    InvalidUrl,
    #[error("No content in extraction result")]
    Empty,
}

/// The subset of the web parser's response the reader understands.
///
/// The upstream returns more keys (word count, direction, pagination);
/// those pass through the relay untouched but are ignored here.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractedArticle {
    pub title: Option<String>,
    pub content: Option<String>,
    pub author: Option<String>,
    pub date_published: Option<String>,
    pub lead_image_url: Option<String>,
    pub excerpt: Option<String>,
    pub url: Option<String>,
    pub domain: Option<String>,
}

impl ExtractedArticle {
    /// Wrap the extraction as a feed item. `requested_url` stands in for a
    /// missing canonical URL.
    pub fn into_article(self, requested_url: &str) -> Article {
        let link = self.url.or_else(|| Some(requested_url.to_owned()));
        let description = self
            .excerpt
            .filter(|e| !e.trim().is_empty())
            .or(self.content);

        Article::from_parts(self.title, link, self.date_published, description)
            .with_image_url(self.lead_image_url)
            .with_author(self.author)
            .with_source(self.domain)
    }
}

/// Client for the content-extraction ("web parser") API.
///
/// One JSON `POST {url}` per page. Cloning is cheap.
#[derive(Clone)]
pub struct WebParserClient {
    client: reqwest::Client,
    endpoint: Arc<str>,
    timeout: Duration,
}

impl WebParserClient {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: Arc::from(endpoint.into()),
            timeout,
        }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// POST `{url}` upstream and return the response body byte for byte,
    /// once it is known to be JSON.
    ///
    /// No validation of `url`: this is the relay path, which forwards
    /// whatever the caller sent.
    pub async fn forward(&self, url: &str) -> Result<Vec<u8>, ContentError> {
        let bytes = tokio::time::timeout(self.timeout, self.post(url))
            .await
            .map_err(|_| ContentError::Timeout)??;
        serde_json::from_slice::<IgnoredAny>(&bytes)?;
        Ok(bytes)
    }

    /// Extract one article.
    ///
    /// # Errors
    ///
    /// - [`ContentError::InvalidUrl`] - `url` is not an absolute http(s) URL
    /// - [`ContentError::Empty`] - upstream answered without any content
    /// - transport, status and JSON errors from [`forward`](Self::forward)
    pub async fn extract(&self, url: &str) -> Result<ExtractedArticle, ContentError> {
        let parsed_url = validate_url(url).map_err(|_| ContentError::InvalidUrl)?;
        let bytes = self.forward(parsed_url.as_str()).await?;
        let article: ExtractedArticle = serde_json::from_slice(&bytes)?;

        let has_content = [&article.content, &article.excerpt, &article.title]
            .iter()
            .any(|field| field.as_deref().is_some_and(|v| !v.trim().is_empty()));
        if !has_content {
            return Err(ContentError::Empty);
        }

        Ok(article)
    }

    async fn post(&self, url: &str) -> Result<Vec<u8>, ContentError> {
        let response = self
            .client
            .post(self.endpoint())
            .json(&json!({ "url": url }))
            .send()
            .await
            .map_err(ContentError::Network)?;

        if !response.status().is_success() {
            return Err(ContentError::HttpStatus(response.status().as_u16()));
        }

        read_limited_bytes(response, MAX_CONTENT_SIZE, || {
            ContentError::ResponseTooLarge(MAX_CONTENT_SIZE)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn client_for(server: &MockServer) -> WebParserClient {
        WebParserClient::new(
            reqwest::Client::new(),
            format!("{}/webparser", server.uri()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_forward_returns_body_verbatim() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webparser"))
            .and(body_json(json!({ "url": "anything at all" })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(
                r#"{"word_count": 1, "content": "<p>x</p>"}"#,
                "application/json",
            ))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let body = client.forward("anything at all").await.unwrap();
        assert_eq!(body, br#"{"word_count": 1, "content": "<p>x</p>"}"#.to_vec());
    }

    #[tokio::test]
    async fn test_forward_rejects_non_json() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        assert!(matches!(
            client.forward("https://example.com").await,
            Err(ContentError::InvalidJson(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_success() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Deep Dive",
                "content": "<p>Full body</p>",
                "author": "Lin",
                "date_published": "2024-01-02T03:04:05.000Z",
                "lead_image_url": "https://example.com/lead.png",
                "excerpt": "Teaser",
                "url": "https://example.com/a",
                "domain": "example.com"
            })))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        let article = client.extract("https://example.com/a").await.unwrap();
        assert_eq!(article.content.as_deref(), Some("<p>Full body</p>"));

        let item = article.into_article("https://example.com/a");
        assert_eq!(item.title, "Deep Dive");
        assert_eq!(item.description, "Teaser");
        assert_eq!(item.source.as_deref(), Some("example.com"));
        assert_eq!(item.image_url.as_deref(), Some("https://example.com/lead.png"));
    }

    #[tokio::test]
    async fn test_extract_rejects_invalid_url_without_request() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        assert!(matches!(client.extract("#").await, Err(ContentError::InvalidUrl)));
    }

    #[tokio::test]
    async fn test_extract_upstream_error_status() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        assert!(matches!(
            client.extract("https://example.com/a").await,
            Err(ContentError::HttpStatus(502))
        ));
    }

    #[tokio::test]
    async fn test_forward_rejects_oversized_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![b' '; MAX_CONTENT_SIZE + 1]))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        assert!(matches!(
            client.forward("https://example.com/a").await,
            Err(ContentError::ResponseTooLarge(MAX_CONTENT_SIZE))
        ));
    }

    #[tokio::test]
    async fn test_extract_non_json_body() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        assert!(matches!(
            client.extract("https://example.com/a").await,
            Err(ContentError::InvalidJson(_))
        ));
    }

    #[tokio::test]
    async fn test_extract_error_payload_is_empty() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "error": true, "messages": "Resource not found" })),
            )
            .mount(&mock_server)
            .await;

        let client = client_for(&mock_server).await;
        assert!(matches!(
            client.extract("https://example.com/a").await,
            Err(ContentError::Empty)
        ));
    }

    #[test]
    fn test_into_article_falls_back_to_requested_url_and_content() {
        let article = ExtractedArticle {
            content: Some("<p>Body</p>".into()),
            excerpt: Some("  ".into()),
            ..Default::default()
        }
        .into_article("https://example.com/req");
        assert_eq!(article.link, "https://example.com/req");
        assert_eq!(article.description, "<p>Body</p>");
    }
}
