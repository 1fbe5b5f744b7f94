use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;
use url::Url;

use super::fetcher::{fetch_bytes, FetchError};
use crate::storage::Article;

/// Hosted RSS-to-JSON service the reader has always used.
pub const DEFAULT_CONVERTER_URL: &str = "https://api.rss2json.com/v1/api.json";

#[derive(Debug, Deserialize)]
struct ConvertedFeed {
    status: String,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    feed: Option<ConvertedChannel>,
    #[serde(default)]
    items: Vec<ConvertedItem>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConvertedChannel {
    title: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
struct ConvertedItem {
    title: Option<String>,
    pub_date: Option<String>,
    link: Option<String>,
    author: Option<String>,
    thumbnail: Option<String>,
    description: Option<String>,
    content: Option<String>,
    enclosure: Option<Enclosure>,
    #[serde(rename = "media:content")]
    media_content: Option<MediaContent>,
    categories: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct Enclosure {
    link: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct MediaContent {
    url: Option<String>,
}

impl ConvertedItem {
    fn into_article(self, source: Option<String>) -> Article {
        // The service sends `"enclosure": {}` and `"thumbnail": ""` when absent.
        let image_url = self
            .enclosure
            .and_then(|e| e.link)
            .filter(|l| !l.is_empty())
            .or_else(|| self.media_content.and_then(|m| m.url))
            .filter(|l| !l.is_empty())
            .or(self.thumbnail);
        let description = self
            .description
            .filter(|d| !d.trim().is_empty())
            .or(self.content);

        Article::from_parts(self.title, self.link, self.pub_date, description)
            .with_category(self.categories.into_iter().next())
            .with_image_url(image_url)
            .with_author(self.author)
            .with_source(source)
    }
}

/// Client for the RSS-to-JSON conversion service.
pub struct Converter {
    client: reqwest::Client,
    endpoint: String,
    api_key: Option<SecretString>,
    count: Option<usize>,
    timeout: Duration,
}

impl Converter {
    pub fn new(client: reqwest::Client, endpoint: impl Into<String>, timeout: Duration) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: None,
            count: None,
            timeout,
        }
    }

    /// Authenticate requests. The service only honours `count` with a key.
    pub fn with_api_key(mut self, api_key: Option<SecretString>) -> Self {
        self.api_key = api_key;
        self
    }

    pub fn with_count(mut self, count: Option<usize>) -> Self {
        self.count = count;
        self
    }

    /// Convert `feed_url` and map every returned item to an [`Article`].
    ///
    /// # Errors
    ///
    /// - [`FetchError::Upstream`] - the service reported `status != "ok"`
    /// - [`FetchError::Parse`] - the response was not the expected JSON
    /// - transport errors from [`fetch_bytes`]
    pub async fn convert(&self, feed_url: &str) -> Result<Vec<Article>, FetchError> {
        let request_url = self.request_url(feed_url)?;
        let bytes = fetch_bytes(&self.client, request_url.as_str(), self.timeout).await?;

        let converted: ConvertedFeed =
            serde_json::from_slice(&bytes).map_err(|e| FetchError::Parse(e.to_string()))?;

        if converted.status != "ok" {
            return Err(FetchError::Upstream(
                converted
                    .message
                    .unwrap_or_else(|| format!("status '{}'", converted.status)),
            ));
        }

        let source = converted.feed.and_then(|f| f.title);
        Ok(converted
            .items
            .into_iter()
            .map(|item| item.into_article(source.clone()))
            .collect())
    }

    fn request_url(&self, feed_url: &str) -> Result<Url, FetchError> {
        let mut url = Url::parse(&self.endpoint)
            .map_err(|e| FetchError::Upstream(format!("invalid converter endpoint: {}", e)))?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("rss_url", feed_url);
            if let Some(key) = &self.api_key {
                query.append_pair("api_key", key.expose_secret());
                if let Some(count) = self.count {
                    query.append_pair("count", &count.to_string());
                }
            }
        }
        Ok(url)
    }
}
