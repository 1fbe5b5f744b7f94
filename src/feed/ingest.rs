use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use url::Url;

use super::converter::Converter;
use super::fetcher::{fetch_bytes, FetchError};
use super::parser::parse_feed;
use crate::content::WebParserClient;
use crate::storage::Article;

/// How a feed URL is turned into articles.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum IngestStrategy {
    /// Hand the URL to the RSS-to-JSON conversion service.
    #[default]
    Convert,
    /// Fetch the URL and parse it locally (RSS/Atom, then HTML).
    Direct,
    /// Run the URL through the web parser and keep the one article.
    Extract,
}

impl IngestStrategy {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Convert => "convert",
            Self::Direct => "direct",
            Self::Extract => "extract",
        }
    }
}

impl fmt::Display for IngestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a failed ingestion leaves behind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// No items.
    #[default]
    Empty,
    /// A single "unable to load" item pointing at the feed.
    Placeholder,
}

/// Turns feed URLs into article lists.
pub struct Ingestor {
    client: reqwest::Client,
    converter: Converter,
    webparser: WebParserClient,
    timeout: Duration,
    strategy: IngestStrategy,
    failure_policy: FailurePolicy,
    max_items: usize,
}

impl Ingestor {
    pub fn new(
        client: reqwest::Client,
        converter: Converter,
        webparser: WebParserClient,
        timeout: Duration,
    ) -> Self {
        Self {
            client,
            converter,
            webparser,
            timeout,
            strategy: IngestStrategy::default(),
            failure_policy: FailurePolicy::default(),
            max_items: 0,
        }
    }

    pub fn with_strategy(mut self, strategy: IngestStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn with_failure_policy(mut self, failure_policy: FailurePolicy) -> Self {
        self.failure_policy = failure_policy;
        self
    }

    /// Keep at most `max_items` articles per feed (0 = unlimited).
    pub fn with_max_items(mut self, max_items: usize) -> Self {
        self.max_items = max_items;
        self
    }

    pub fn strategy(&self) -> IngestStrategy {
        self.strategy
    }

    /// Ingest with the configured strategy.
    pub async fn ingest(&self, url: &str) -> Vec<Article> {
        self.ingest_with(self.strategy, url).await
    }

    /// Ingest with an explicit strategy. Never fails: errors are logged and
    /// replaced according to the failure policy.
    pub async fn ingest_with(&self, strategy: IngestStrategy, url: &str) -> Vec<Article> {
        match self.try_ingest(strategy, url).await {
            Ok(mut articles) => {
                if self.max_items > 0 {
                    articles.truncate(self.max_items);
                }
                tracing::info!(url = %url, %strategy, items = articles.len(), "Ingested feed");
                articles
            }
            Err(e) => {
                tracing::warn!(url = %url, %strategy, error = %e, "Feed ingestion failed");
                match self.failure_policy {
                    FailurePolicy::Empty => Vec::new(),
                    FailurePolicy::Placeholder => vec![Article::unable_to_load(url)],
                }
            }
        }
    }

    /// Ingest and surface the error instead of applying the failure policy.
    pub async fn try_ingest(
        &self,
        strategy: IngestStrategy,
        url: &str,
    ) -> Result<Vec<Article>, FetchError> {
        match strategy {
            IngestStrategy::Convert => self.converter.convert(url).await,
            IngestStrategy::Direct => {
                let bytes = fetch_bytes(&self.client, url, self.timeout).await?;
                let base = Url::parse(url).ok();
                parse_feed(&bytes, base.as_ref()).map_err(|e| FetchError::Parse(e.to_string()))
            }
            IngestStrategy::Extract => {
                let extracted = self.webparser.extract(url).await?;
                Ok(vec![extracted.into_article(url)])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{PLACEHOLDER_LINK, UNABLE_TO_LOAD};
    use serde_json::json;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const RSS: &str = r#"<?xml version="1.0"?>
<rss version="2.0"><channel><title>T</title>
<item><title>A</title><link>https://example.com/a</link></item>
<item><title>B</title><link>https://example.com/b</link></item>
<item><title>C</title><link>https://example.com/c</link></item>
</channel></rss>"#;

    fn ingestor_for(server: &MockServer) -> Ingestor {
        let client = reqwest::Client::new();
        let timeout = Duration::from_secs(5);
        Ingestor::new(
            client.clone(),
            Converter::new(client.clone(), format!("{}/convert", server.uri()), timeout),
            WebParserClient::new(client, format!("{}/webparser", server.uri()), timeout),
            timeout,
        )
    }

    #[tokio::test]
    async fn test_direct_strategy_parses_rss() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.xml"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&mock_server)
            .await;

        let ingestor = ingestor_for(&mock_server).with_strategy(IngestStrategy::Direct);
        let articles = ingestor.ingest(&format!("{}/feed.xml", mock_server.uri())).await;
        assert_eq!(articles.len(), 3);
        assert_eq!(articles[0].title, "A");
    }

    #[tokio::test]
    async fn test_max_items_truncates() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RSS))
            .mount(&mock_server)
            .await;

        let ingestor = ingestor_for(&mock_server)
            .with_strategy(IngestStrategy::Direct)
            .with_max_items(2);
        let articles = ingestor.ingest(&format!("{}/feed.xml", mock_server.uri())).await;
        let titles: Vec<&str> = articles.iter().map(|a| a.title.as_str()).collect();
        assert_eq!(titles, vec!["A", "B"]);
    }

    #[tokio::test]
    async fn test_convert_strategy_is_default() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/convert"))
            .and(query_param("rss_url", "https://news.example/rss"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "ok",
                "feed": { "title": "News" },
                "items": [{ "title": "Converted", "link": "https://news.example/1" }]
            })))
            .mount(&mock_server)
            .await;

        let ingestor = ingestor_for(&mock_server);
        assert_eq!(ingestor.strategy(), IngestStrategy::Convert);
        let articles = ingestor.ingest("https://news.example/rss").await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].title, "Converted");
    }

    #[tokio::test]
    async fn test_extract_strategy_yields_single_item() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/webparser"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "title": "Page",
                "content": "<p>Body</p>",
                "domain": "page.example"
            })))
            .mount(&mock_server)
            .await;

        let ingestor = ingestor_for(&mock_server);
        let articles = ingestor
            .ingest_with(IngestStrategy::Extract, "https://page.example/post")
            .await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].link, "https://page.example/post");
        assert_eq!(articles[0].source.as_deref(), Some("page.example"));
    }

    #[tokio::test]
    async fn test_failure_empty_by_default() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&mock_server)
            .await;

        let ingestor = ingestor_for(&mock_server).with_strategy(IngestStrategy::Direct);
        let articles = ingestor.ingest(&format!("{}/gone", mock_server.uri())).await;
        assert!(articles.is_empty());
    }

    #[tokio::test]
    async fn test_failure_placeholder_policy() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "status": "error",
                "message": "Cannot download this RSS feed"
            })))
            .mount(&mock_server)
            .await;

        let ingestor = ingestor_for(&mock_server).with_failure_policy(FailurePolicy::Placeholder);
        let articles = ingestor.ingest("https://broken.example/rss").await;
        assert_eq!(articles.len(), 1);
        assert_eq!(articles[0].description, UNABLE_TO_LOAD);
        assert_ne!(articles[0].link, PLACEHOLDER_LINK);
    }

    #[tokio::test]
    async fn test_try_ingest_surfaces_error() {
        let mock_server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&mock_server)
            .await;

        let ingestor = ingestor_for(&mock_server);
        let result = ingestor
            .try_ingest(IngestStrategy::Direct, &format!("{}/feed", mock_server.uri()))
            .await;
        assert!(matches!(result, Err(FetchError::HttpStatus(503))));
    }

    #[test]
    fn test_strategy_serde_names() {
        let parsed: IngestStrategy = serde_json::from_str("\"extract\"").unwrap();
        assert_eq!(parsed, IngestStrategy::Extract);
        assert_eq!(IngestStrategy::Direct.to_string(), "direct");
    }
}
