//! Article enrichment: full-content fan-out through the web parser.
//!
//! Every render takes a [`RenderTicket`] from the shared [`RenderGate`].
//! Beginning a newer render supersedes all older tickets, and an enrichment
//! pass holding a superseded ticket stops waiting on its in-flight requests
//! and returns `None`. Results from a stale render therefore never race the
//! latest one.

use futures::stream::{self, StreamExt};
use lru::LruCache;
use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::Mutex;
use tokio::sync::watch;

use super::webparser::WebParserClient;
use crate::storage::{Article, UNABLE_TO_LOAD};

/// Hands out render generations.
pub struct RenderGate {
    tx: watch::Sender<u64>,
}

impl Default for RenderGate {
    fn default() -> Self {
        Self::new()
    }
}

impl RenderGate {
    pub fn new() -> Self {
        let (tx, _rx) = watch::channel(0);
        Self { tx }
    }

    /// Start a new render, superseding every ticket issued before it.
    pub fn begin(&self) -> RenderTicket {
        let mut generation = 0;
        self.tx.send_modify(|current| {
            *current += 1;
            generation = *current;
        });
        RenderTicket {
            generation,
            rx: self.tx.subscribe(),
        }
    }

    /// Generation of the most recent render.
    pub fn current(&self) -> u64 {
        *self.tx.borrow()
    }
}

/// Proof of which render generation a piece of work belongs to.
#[derive(Clone)]
pub struct RenderTicket {
    generation: u64,
    rx: watch::Receiver<u64>,
}

impl RenderTicket {
    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// True until a newer render begins.
    pub fn is_current(&self) -> bool {
        *self.rx.borrow() == self.generation
    }

    /// Resolves once a newer render has begun.
    pub async fn superseded(&mut self) {
        while *self.rx.borrow_and_update() == self.generation {
            if self.rx.changed().await.is_err() {
                // Gate dropped: nothing can supersede this ticket any more.
                std::future::pending::<()>().await;
            }
        }
    }
}

/// Full article HTML keyed by article link.
pub type EnrichedContent = HashMap<String, String>;

/// Fetches full article content for rendering.
///
/// Successful extractions are kept in an LRU keyed by link; failures are not
/// cached so a later render retries them.
pub struct Enricher {
    parser: WebParserClient,
    cache: Mutex<LruCache<String, String>>,
    concurrency: usize,
}

impl Enricher {
    pub fn new(parser: WebParserClient, cache_size: usize, concurrency: usize) -> Self {
        let capacity = NonZeroUsize::new(cache_size).unwrap_or(NonZeroUsize::MIN);
        Self {
            parser,
            cache: Mutex::new(LruCache::new(capacity)),
            concurrency: concurrency.max(1),
        }
    }

    /// Content for one link, or the "unable to load" placeholder.
    pub async fn content_for(&self, link: &str) -> String {
        if let Some(hit) = self.cached(link) {
            return hit;
        }

        match self.parser.extract(link).await {
            Ok(article) => match article.content.filter(|c| !c.trim().is_empty()) {
                Some(content) => {
                    self.store(link, &content);
                    content
                }
                None => UNABLE_TO_LOAD.to_owned(),
            },
            Err(e) => {
                tracing::warn!(link = %link, error = %e, "Article enrichment failed");
                UNABLE_TO_LOAD.to_owned()
            }
        }
    }

    /// Enrich every distinct, followable link among `articles`.
    ///
    /// Requests run in parallel (bounded by the configured concurrency) and
    /// all of them are awaited before returning. Per-item failures become
    /// the placeholder. Returns `None` if `ticket` is superseded first.
    pub async fn enrich<'a, I>(&self, articles: I, ticket: &RenderTicket) -> Option<EnrichedContent>
    where
        I: IntoIterator<Item = &'a Article>,
    {
        let mut seen = HashSet::new();
        let links: Vec<String> = articles
            .into_iter()
            .filter(|a| !a.has_placeholder_link())
            .filter(|a| seen.insert(a.link.clone()))
            .map(|a| a.link.clone())
            .collect();

        if links.is_empty() {
            return Some(EnrichedContent::new());
        }

        let total = links.len();
        let fan_out = stream::iter(links)
            .map(|link| async move {
                let content = self.content_for(&link).await;
                (link, content)
            })
            .buffered(self.concurrency)
            .collect::<Vec<_>>();

        let mut watcher = ticket.clone();
        tokio::select! {
            biased;
            _ = watcher.superseded() => {
                tracing::debug!(
                    generation = ticket.generation(),
                    links = total,
                    "Render superseded, abandoning enrichment"
                );
                None
            }
            results = fan_out => {
                tracing::debug!(generation = ticket.generation(), links = total, "Enrichment complete");
                Some(results.into_iter().collect())
            }
        }
    }

    fn cached(&self, link: &str) -> Option<String> {
        match self.cache.lock() {
            Ok(mut cache) => cache.get(link).cloned(),
            Err(_) => None,
        }
    }

    fn store(&self, link: &str, content: &str) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(link.to_owned(), content.to_owned());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use wiremock::matchers::{body_json, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn article(link: &str) -> Article {
        Article::from_parts(Some("t".into()), Some(link.into()), None, None)
    }

    fn enricher_for(server: &MockServer) -> Enricher {
        let parser = WebParserClient::new(
            reqwest::Client::new(),
            format!("{}/webparser", server.uri()),
            Duration::from_secs(5),
        );
        Enricher::new(parser, 16, 4)
    }

    #[test]
    fn test_gate_supersedes_older_tickets() {
        let gate = RenderGate::new();
        let first = gate.begin();
        assert!(first.is_current());

        let second = gate.begin();
        assert!(!first.is_current());
        assert!(second.is_current());
        assert_eq!(gate.current(), second.generation());
    }

    #[tokio::test]
    async fn test_enrich_fans_out_once_per_distinct_link() {
        let mock_server = MockServer::start().await;
        for n in 1..=2 {
            Mock::given(method("POST"))
                .and(body_json(json!({ "url": format!("https://example.com/{}", n) })))
                .respond_with(
                    ResponseTemplate::new(200)
                        .set_body_json(json!({ "content": format!("<p>body {}</p>", n) })),
                )
                .expect(1)
                .mount(&mock_server)
                .await;
        }

        let enricher = enricher_for(&mock_server);
        let gate = RenderGate::new();
        let articles = vec![
            article("https://example.com/1"),
            article("https://example.com/2"),
            article("https://example.com/1"),
            article("#"),
        ];

        let content = enricher.enrich(&articles, &gate.begin()).await.unwrap();
        assert_eq!(content.len(), 2);
        assert_eq!(content["https://example.com/2"], "<p>body 2</p>");
    }

    #[tokio::test]
    async fn test_enrich_failure_degrades_to_placeholder() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&mock_server)
            .await;

        let enricher = enricher_for(&mock_server);
        let gate = RenderGate::new();
        let articles = vec![article("https://example.com/1")];

        let content = enricher.enrich(&articles, &gate.begin()).await.unwrap();
        assert_eq!(content["https://example.com/1"], UNABLE_TO_LOAD);
    }

    #[tokio::test]
    async fn test_successful_content_is_cached() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "content": "<p>c</p>" })))
            .expect(1)
            .mount(&mock_server)
            .await;

        let enricher = enricher_for(&mock_server);
        assert_eq!(enricher.content_for("https://example.com/1").await, "<p>c</p>");
        assert_eq!(enricher.content_for("https://example.com/1").await, "<p>c</p>");
    }

    #[tokio::test]
    async fn test_superseded_render_abandons_enrichment() {
        let mock_server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "content": "<p>slow</p>" }))
                    .set_delay(Duration::from_secs(3)),
            )
            .mount(&mock_server)
            .await;

        let enricher = enricher_for(&mock_server);
        let gate = RenderGate::new();
        let stale = gate.begin();
        let articles = vec![article("https://example.com/1")];

        let (result, _) = tokio::join!(enricher.enrich(&articles, &stale), async {
            tokio::time::sleep(Duration::from_millis(50)).await;
            gate.begin()
        });
        assert!(result.is_none());
    }
}
