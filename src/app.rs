//! Service layer shared by the HTTP handlers and the CLI.
//!
//! Every mutation follows the same path: validate input, ingest the feed,
//! write the store. Rendering always starts from the store, so a page
//! reflects every completed mutation.

use anyhow::Result;
use reqwest::redirect::Policy;
use thiserror::Error;

use crate::config::Config;
use crate::content::{Enricher, RenderGate, WebParserClient};
use crate::feed::{Converter, Ingestor};
use crate::render::{ArticleView, Filter, PageView};
use crate::storage::{Database, Feed, UpsertOutcome, UNABLE_TO_LOAD};
use crate::util::{validate_url, UrlValidationError};

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Please provide both a feed URL and a category.")]
    MissingFields,

    #[error("Invalid feed URL: {0}")]
    InvalidUrl(#[from] UrlValidationError),

    #[error("Feed not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

// ============================================================================
// HTTP Client Configuration
// ============================================================================

/// Redirect policy with loop detection and at most 3 hops.
fn create_redirect_policy() -> Policy {
    Policy::custom(|attempt| {
        if attempt.previous().len() >= 3 {
            return attempt.error("Too many redirects (max 3)");
        }

        let url = attempt.url();
        for prev in attempt.previous() {
            if prev.as_str() == url.as_str() {
                return attempt.error("Redirect loop detected");
            }
        }

        tracing::debug!(
            from = %attempt.previous().last().map(|u| u.as_str()).unwrap_or("initial"),
            to = %url,
            hop = attempt.previous().len() + 1,
            "Following redirect"
        );

        attempt.follow()
    })
}

/// The one HTTP client every outbound call shares.
pub fn build_http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .user_agent(concat!("feedrelay/", env!("CARGO_PKG_VERSION")))
        .redirect(create_redirect_policy())
        .pool_max_idle_per_host(4)
        .pool_idle_timeout(std::time::Duration::from_secs(30))
        .tcp_keepalive(std::time::Duration::from_secs(60))
        .build()?;
    Ok(client)
}

// ============================================================================
// App
// ============================================================================

/// What a page render should show besides the feed list.
#[derive(Debug, Clone, Default)]
pub struct RenderRequest {
    pub filter: Filter,
    /// URL of the feed whose edit modal is open.
    pub edit: Option<String>,
    /// Link of the article whose content modal is open.
    pub article: Option<String>,
    pub notice: Option<String>,
}

pub struct App {
    db: Database,
    ingestor: Ingestor,
    enricher: Enricher,
    gate: RenderGate,
    enrichment_enabled: bool,
}

impl App {
    pub fn new(db: Database, config: &Config) -> Result<Self> {
        let client = build_http_client()?;

        let webparser = WebParserClient::new(
            client.clone(),
            config.webparser.endpoint.clone(),
            config.webparser.timeout(),
        );
        let converter = Converter::new(
            client.clone(),
            config.ingest.converter_url.clone(),
            config.ingest.timeout(),
        )
        .with_api_key(config.ingest.api_key())
        .with_count((config.ingest.max_items > 0).then_some(config.ingest.max_items));
        let ingestor = Ingestor::new(client, converter, webparser.clone(), config.ingest.timeout())
            .with_strategy(config.ingest.strategy)
            .with_failure_policy(config.ingest.failure_policy)
            .with_max_items(config.ingest.max_items);
        let enricher = Enricher::new(
            webparser,
            config.enrichment.cache_size,
            config.enrichment.concurrency,
        );

        Ok(Self {
            db,
            ingestor,
            enricher,
            gate: RenderGate::new(),
            enrichment_enabled: config.enrichment.enabled,
        })
    }

    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Add a feed, or replace the feed already stored under the same URL.
    pub async fn add_feed(&self, url: &str, category: &str) -> Result<UpsertOutcome, AppError> {
        let (url, category) = validate_feed_input(url, category)?;

        let items = self.ingestor.ingest(&url).await;
        let outcome = self.db.upsert_feed(&Feed::new(&url, &category, items)).await?;

        tracing::info!(url = %url, category = %category, ?outcome, "Feed saved");
        Ok(outcome)
    }

    /// Replace the feed at `original_url` with a freshly ingested `url`.
    pub async fn edit_feed(
        &self,
        original_url: &str,
        url: &str,
        category: &str,
    ) -> Result<(), AppError> {
        let (url, category) = validate_feed_input(url, category)?;
        let original_url = original_url.trim();

        if self.db.get_feed(original_url).await?.is_none() {
            return Err(AppError::NotFound(original_url.to_owned()));
        }

        let items = self.ingestor.ingest(&url).await;
        if !self
            .db
            .edit_feed(original_url, &Feed::new(&url, &category, items))
            .await?
        {
            // Removed while ingesting
            return Err(AppError::NotFound(original_url.to_owned()));
        }

        tracing::info!(from = %original_url, to = %url, category = %category, "Feed edited");
        Ok(())
    }

    pub async fn remove_feed(&self, url: &str) -> Result<(), AppError> {
        let url = url.trim();
        if !self.db.remove_feed(url).await? {
            return Err(AppError::NotFound(url.to_owned()));
        }
        tracing::info!(url = %url, "Feed removed");
        Ok(())
    }

    /// Re-ingest a stored feed under its current category. Returns the new
    /// item count.
    pub async fn refresh_feed(&self, url: &str) -> Result<usize, AppError> {
        let url = url.trim();
        let Some(existing) = self.db.get_feed(url).await? else {
            return Err(AppError::NotFound(url.to_owned()));
        };

        let items = self.ingestor.ingest(url).await;
        let count = items.len();
        self.db
            .upsert_feed(&Feed::new(url, existing.category, items))
            .await?;
        Ok(count)
    }

    pub async fn feeds(&self) -> Result<Vec<Feed>, AppError> {
        Ok(self.db.list_feeds().await?)
    }

    pub async fn categories(&self) -> Result<Vec<String>, AppError> {
        Ok(self.db.categories().await?)
    }

    /// Full extracted content for one article, or the placeholder.
    pub async fn article_content(&self, link: &str) -> String {
        self.enricher.content_for(link).await
    }

    /// Build the page from the store.
    ///
    /// Starting a render supersedes any render still enriching; a superseded
    /// render falls back to the plain summaries.
    pub async fn render(&self, request: RenderRequest) -> Result<String, AppError> {
        let ticket = self.gate.begin();

        let all_feeds = self.db.list_feeds().await?;
        let categories = self.db.categories().await?;
        let mut notice = request.notice;

        let edit = match request.edit.as_deref() {
            Some(url) => {
                let found = all_feeds.iter().find(|f| f.url == url).cloned();
                if found.is_none() && notice.is_none() {
                    notice = Some("That feed no longer exists.".to_owned());
                }
                found
            }
            None => None,
        };

        let article = match request.article {
            Some(link) => {
                let mut watcher = ticket.clone();
                let content = tokio::select! {
                    biased;
                    _ = watcher.superseded() => {
                        tracing::debug!(generation = ticket.generation(), link = %link, "Render superseded, abandoning article");
                        UNABLE_TO_LOAD.to_owned()
                    }
                    content = self.article_content(&link) => content,
                };
                Some(ArticleView { link, content })
            }
            None => None,
        };

        let feeds = request.filter.apply(all_feeds);

        let content = if self.enrichment_enabled {
            let enriched = self
                .enricher
                .enrich(feeds.iter().flat_map(|f| f.items.iter()), &ticket)
                .await;
            if enriched.is_none() {
                tracing::debug!(generation = ticket.generation(), "Rendering plain summaries");
            }
            enriched
        } else {
            None
        };

        Ok(PageView {
            feeds,
            categories,
            filter: request.filter,
            content,
            edit,
            article,
            notice,
        }
        .render())
    }
}

/// Trim both fields, require both, and check the URL.
fn validate_feed_input(url: &str, category: &str) -> Result<(String, String), AppError> {
    let url = url.trim();
    let category = category.trim();
    if url.is_empty() || category.is_empty() {
        return Err(AppError::MissingFields);
    }

    let category = Database::sanitize_category(category).map_err(|_| AppError::MissingFields)?;
    validate_url(url)?;
    Ok((url.to_owned(), category))
}
