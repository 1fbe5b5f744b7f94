use anyhow::{bail, Result};
use sqlx::{QueryBuilder, SqliteConnection};
use std::collections::HashMap;

use super::schema::Database;
use super::types::{Article, ArticleRow, Feed, UpsertOutcome};
use crate::util::strip_control_chars;

/// Articles per INSERT statement (9 binds each, well under SQLite's limit).
const ARTICLE_BATCH_SIZE: usize = 100;

impl Database {
    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Sanitize and validate a category name.
    ///
    /// Strips control characters, trims whitespace, and rejects
    /// empty/whitespace-only names.
    pub fn sanitize_category(name: &str) -> Result<String> {
        let sanitized = strip_control_chars(name);
        let trimmed = sanitized.trim();
        if trimmed.is_empty() {
            bail!("Category name cannot be empty or whitespace-only");
        }
        Ok(trimmed.to_owned())
    }

    /// Get every feed with its items, in collection order.
    ///
    /// Both reads share one transaction so a concurrent write can't tear the
    /// snapshot.
    pub async fn list_feeds(&self) -> Result<Vec<Feed>> {
        let mut tx = self.pool.begin().await?;
        let feeds: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT id, url, category FROM feeds ORDER BY position")
                .fetch_all(&mut *tx)
                .await?;

        let rows: Vec<ArticleRow> = sqlx::query_as(
            r#"
                SELECT feed_id, title, link, pub_date, description,
                       category, image_url, author, source
                FROM articles
                ORDER BY feed_id, position
            "#,
        )
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let mut items_by_feed: HashMap<i64, Vec<Article>> = HashMap::new();
        for row in rows {
            let (feed_id, article) = row.into_tuple();
            items_by_feed.entry(feed_id).or_default().push(article);
        }

        Ok(feeds
            .into_iter()
            .map(|(id, url, category)| Feed {
                url,
                category,
                items: items_by_feed.remove(&id).unwrap_or_default(),
            })
            .collect())
    }

    /// Get one feed by URL.
    pub async fn get_feed(&self, url: &str) -> Result<Option<Feed>> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id, url, category FROM feeds WHERE url = ?")
                .bind(url)
                .fetch_optional(&self.pool)
                .await?;

        let Some((id, url, category)) = row else {
            return Ok(None);
        };

        let rows: Vec<ArticleRow> = sqlx::query_as(
            r#"
                SELECT feed_id, title, link, pub_date, description,
                       category, image_url, author, source
                FROM articles
                WHERE feed_id = ?
                ORDER BY position
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(Feed {
            url,
            category,
            items: rows.into_iter().map(|r| r.into_tuple().1).collect(),
        }))
    }

    /// Number of feeds in the collection.
    pub async fn feed_count(&self) -> Result<i64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }

    /// Add a feed, or replace the feed with the same URL in place.
    ///
    /// A replaced feed keeps its position, so the collection length and the
    /// order of the other feeds are unchanged. Category and items are
    /// overwritten wholesale.
    pub async fn upsert_feed(&self, feed: &Feed) -> Result<UpsertOutcome> {
        let mut tx = self.pool.begin().await?;
        let outcome = upsert_in(&mut tx, feed).await?;
        tx.commit().await?;

        tracing::debug!(url = %feed.url, items = feed.items.len(), ?outcome, "Stored feed");
        Ok(outcome)
    }

    /// Replace the feed at `original_url` with `feed`, keeping its position.
    ///
    /// If another feed already holds `feed.url`, that feed is dropped so URLs
    /// stay unique. Returns `false` (and changes nothing) when
    /// `original_url` is not in the collection.
    pub async fn edit_feed(&self, original_url: &str, feed: &Feed) -> Result<bool> {
        let category = Self::sanitize_category(&feed.category)?;
        let mut tx = self.pool.begin().await?;

        let Some((feed_id, _)) = find_feed(&mut tx, original_url).await? else {
            return Ok(false);
        };

        if feed.url != original_url {
            sqlx::query(
                "DELETE FROM articles WHERE feed_id IN (SELECT id FROM feeds WHERE url = ? AND id != ?)",
            )
            .bind(&feed.url)
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;
            let displaced = sqlx::query("DELETE FROM feeds WHERE url = ? AND id != ?")
                .bind(&feed.url)
                .bind(feed_id)
                .execute(&mut *tx)
                .await?
                .rows_affected();
            if displaced > 0 {
                tracing::info!(url = %feed.url, "Edit merged onto an existing feed URL");
            }
        }

        sqlx::query("UPDATE feeds SET url = ?, category = ? WHERE id = ?")
            .bind(&feed.url)
            .bind(&category)
            .bind(feed_id)
            .execute(&mut *tx)
            .await?;
        replace_articles(&mut tx, feed_id, &feed.items).await?;

        tx.commit().await?;
        Ok(true)
    }

    /// Remove the feed with this URL and its items.
    ///
    /// Returns whether a feed was removed. Other feeds are untouched.
    pub async fn remove_feed(&self, url: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("DELETE FROM articles WHERE feed_id IN (SELECT id FROM feeds WHERE url = ?)")
            .bind(url)
            .execute(&mut *tx)
            .await?;
        let removed = sqlx::query("DELETE FROM feeds WHERE url = ?")
            .bind(url)
            .execute(&mut *tx)
            .await?
            .rows_affected();

        tx.commit().await?;
        Ok(removed > 0)
    }

    /// Distinct feed categories in first-seen collection order.
    pub async fn categories(&self) -> Result<Vec<String>> {
        let rows: Vec<(String,)> = sqlx::query_as(
            "SELECT category FROM feeds GROUP BY category ORDER BY MIN(position)",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(rows.into_iter().map(|(c,)| c).collect())
    }
}

// ============================================================================
// Transaction helpers
// ============================================================================

/// Look up a feed's `(id, position)` by URL.
pub(crate) async fn find_feed(conn: &mut SqliteConnection, url: &str) -> Result<Option<(i64, i64)>> {
    let row: Option<(i64, i64)> = sqlx::query_as("SELECT id, position FROM feeds WHERE url = ?")
        .bind(url)
        .fetch_optional(&mut *conn)
        .await?;
    Ok(row)
}

/// Upsert within an open transaction. See [`Database::upsert_feed`].
pub(crate) async fn upsert_in(conn: &mut SqliteConnection, feed: &Feed) -> Result<UpsertOutcome> {
    let category = Database::sanitize_category(&feed.category)?;

    if let Some((feed_id, _)) = find_feed(conn, &feed.url).await? {
        sqlx::query("UPDATE feeds SET category = ? WHERE id = ?")
            .bind(&category)
            .bind(feed_id)
            .execute(&mut *conn)
            .await?;
        replace_articles(conn, feed_id, &feed.items).await?;
        return Ok(UpsertOutcome::Replaced);
    }

    let (feed_id,): (i64,) = sqlx::query_as(
        r#"
            INSERT INTO feeds (url, category, position)
            VALUES (?, ?, (SELECT COALESCE(MAX(position) + 1, 0) FROM feeds))
            RETURNING id
        "#,
    )
    .bind(&feed.url)
    .bind(&category)
    .fetch_one(&mut *conn)
    .await?;
    replace_articles(conn, feed_id, &feed.items).await?;
    Ok(UpsertOutcome::Inserted)
}

/// Overwrite a feed's items, preserving their order.
async fn replace_articles(
    conn: &mut SqliteConnection,
    feed_id: i64,
    articles: &[Article],
) -> Result<()> {
    sqlx::query("DELETE FROM articles WHERE feed_id = ?")
        .bind(feed_id)
        .execute(&mut *conn)
        .await?;

    for (chunk_index, chunk) in articles.chunks(ARTICLE_BATCH_SIZE).enumerate() {
        let offset = chunk_index * ARTICLE_BATCH_SIZE;
        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "INSERT INTO articles (feed_id, position, title, link, pub_date, description, category, image_url, author, source) ",
        );

        builder.push_values(chunk.iter().enumerate(), |mut b, (i, article)| {
            b.push_bind(feed_id)
                .push_bind((offset + i) as i64)
                .push_bind(&article.title)
                .push_bind(&article.link)
                .push_bind(&article.pub_date)
                .push_bind(&article.description)
                .push_bind(&article.category)
                .push_bind(&article.image_url)
                .push_bind(&article.author)
                .push_bind(&article.source);
        });

        builder.build().execute(&mut *conn).await?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn article(link: &str) -> Article {
        Article::from_parts(
            Some(format!("Title {}", link)),
            Some(link.to_owned()),
            None,
            Some("Summary".to_owned()),
        )
    }

    #[test]
    fn test_sanitize_category() {
        assert_eq!(Database::sanitize_category("  Tech\x07 ").unwrap(), "Tech");
        assert!(Database::sanitize_category(" \t ").is_err());
    }

    #[tokio::test]
    async fn test_list_feeds_never_sees_half_written_feed() {
        let dir = std::env::temp_dir().join(format!("feedrelay_feeds_{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        let path = dir.join("feeds.db");
        let db = Database::open(path.to_str().unwrap()).await.unwrap();
        let items = vec![article("https://a/1"), article("https://a/2")];

        let writer = async {
            for _ in 0..25 {
                db.upsert_feed(&Feed::new("https://a/rss", "Tech", items.clone()))
                    .await
                    .unwrap();
                db.remove_feed("https://a/rss").await.unwrap();
            }
        };
        let reader = async {
            for _ in 0..25 {
                for feed in db.list_feeds().await.unwrap() {
                    assert_eq!(feed.items.len(), 2);
                }
                tokio::task::yield_now().await;
            }
        };
        tokio::join!(writer, reader);

        db.pool.close().await;
        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn test_upsert_appends_in_order() {
        let db = Database::open(":memory:").await.unwrap();
        for (url, category) in [("https://a/rss", "News"), ("https://b/rss", "Tech")] {
            let outcome = db
                .upsert_feed(&Feed::new(url, category, vec![article("https://a/1")]))
                .await
                .unwrap();
            assert_eq!(outcome, UpsertOutcome::Inserted);
        }

        let urls: Vec<String> = db.list_feeds().await.unwrap().into_iter().map(|f| f.url).collect();
        assert_eq!(urls, vec!["https://a/rss", "https://b/rss"]);
    }

    #[tokio::test]
    async fn test_upsert_large_item_list_keeps_order() {
        let db = Database::open(":memory:").await.unwrap();
        let items: Vec<Article> = (0..250).map(|i| article(&format!("https://a/{}", i))).collect();
        db.upsert_feed(&Feed::new("https://a/rss", "News", items.clone()))
            .await
            .unwrap();

        let feed = db.get_feed("https://a/rss").await.unwrap().unwrap();
        assert_eq!(feed.items, items);
    }

    #[tokio::test]
    async fn test_upsert_rejects_blank_category() {
        let db = Database::open(":memory:").await.unwrap();
        assert!(db
            .upsert_feed(&Feed::new("https://a/rss", "   ", vec![]))
            .await
            .is_err());
        assert_eq!(db.feed_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_edit_unknown_feed_is_noop() {
        let db = Database::open(":memory:").await.unwrap();
        let edited = db
            .edit_feed("https://missing/rss", &Feed::new("https://x/rss", "X", vec![]))
            .await
            .unwrap();
        assert!(!edited);
        assert_eq!(db.feed_count().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_categories_first_seen_order() {
        let db = Database::open(":memory:").await.unwrap();
        for (url, category) in [
            ("https://a/rss", "Tech"),
            ("https://b/rss", "News"),
            ("https://c/rss", "Tech"),
        ] {
            db.upsert_feed(&Feed::new(url, category, vec![])).await.unwrap();
        }
        assert_eq!(db.categories().await.unwrap(), vec!["Tech", "News"]);
    }
}
