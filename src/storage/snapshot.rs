use anyhow::{Context, Result};

use super::feeds::upsert_in;
use super::schema::Database;
use super::types::Feed;

impl Database {
    /// Serialize the whole collection as one JSON array.
    ///
    /// The shape matches the browser-storage blob the reader historically
    /// kept: `[{url, category, items: [{title, link, pubDate, ...}]}]`.
    pub async fn export_snapshot(&self) -> Result<String> {
        let feeds = self.list_feeds().await?;
        Ok(serde_json::to_string_pretty(&feeds)?)
    }

    /// Replace the whole collection with the feeds in a JSON snapshot.
    ///
    /// A literal `null` (an empty browser store) imports as an empty
    /// collection. Duplicate URLs collapse onto the position of their first
    /// occurrence with the contents of the last. Runs in one transaction:
    /// on any error the previous collection is left intact.
    ///
    /// Returns the number of feeds stored.
    pub async fn import_snapshot(&self, json: &str) -> Result<usize> {
        let feeds: Vec<Feed> = serde_json::from_str::<Option<Vec<Feed>>>(json)
            .context("Snapshot is not a JSON array of feeds")?
            .unwrap_or_default();

        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM articles").execute(&mut *tx).await?;
        sqlx::query("DELETE FROM feeds").execute(&mut *tx).await?;
        for feed in &feeds {
            upsert_in(&mut tx, feed)
                .await
                .with_context(|| format!("Failed to import feed '{}'", feed.url))?;
        }
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM feeds")
            .fetch_one(&mut *tx)
            .await?;
        tx.commit().await?;

        tracing::info!(feeds = count, "Imported feed snapshot");
        Ok(count as usize)
    }
}
