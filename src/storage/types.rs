use serde::{Deserialize, Serialize};
use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has the database locked
    #[error("The feed database is locked by another process. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Check if a sqlx error indicates database locking
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        // SQLITE_BUSY (5): database is locked
        // SQLITE_LOCKED (6): database table is locked
        // SQLITE_CANTOPEN (14): unable to open database file
        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("sqlite_busy")
            || error_string.contains("sqlite_locked")
            || error_string.contains("unable to open database file")
        {
            return DatabaseError::InstanceLocked;
        }

        DatabaseError::Other(err)
    }
}

// ============================================================================
// Placeholders
// ============================================================================

/// Title used when a source item has none.
pub const PLACEHOLDER_TITLE: &str = "No title";
/// Link used when a source item has none.
pub const PLACEHOLDER_LINK: &str = "#";
/// Publish date used when a source item has none.
pub const PLACEHOLDER_PUB_DATE: &str = "No date";
/// Description used when a source item has none.
pub const PLACEHOLDER_DESCRIPTION: &str = "No description available";
/// Body shown when a feed or article body could not be loaded.
pub const UNABLE_TO_LOAD: &str = "<p>Unable to load content.</p>";

// ============================================================================
// Data Structures
// ============================================================================

/// One syndicated item.
///
/// Serialized with the camelCase keys of the browser-storage blob
/// (`pubDate`, `imageUrl`) so legacy exports import unchanged. Missing
/// mandatory keys in such blobs fall back to the placeholders.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Article {
    #[serde(default = "placeholder_title")]
    pub title: String,
    #[serde(default = "placeholder_link")]
    pub link: String,
    #[serde(default = "placeholder_pub_date")]
    pub pub_date: String,
    #[serde(default = "placeholder_description")]
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

fn placeholder_title() -> String {
    PLACEHOLDER_TITLE.to_owned()
}

fn placeholder_link() -> String {
    PLACEHOLDER_LINK.to_owned()
}

fn placeholder_pub_date() -> String {
    PLACEHOLDER_PUB_DATE.to_owned()
}

fn placeholder_description() -> String {
    PLACEHOLDER_DESCRIPTION.to_owned()
}

/// Picks the first present, non-blank value, or the placeholder.
fn or_placeholder(value: Option<String>, placeholder: &str) -> String {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
        .unwrap_or_else(|| placeholder.to_owned())
}

/// Drops blank optional metadata so `Some("")` never reaches the renderer.
fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_owned())
        .filter(|v| !v.is_empty())
}

impl Article {
    /// Builds an article from optional source fields, substituting the
    /// documented placeholder for each missing mandatory field.
    pub fn from_parts(
        title: Option<String>,
        link: Option<String>,
        pub_date: Option<String>,
        description: Option<String>,
    ) -> Self {
        Self {
            title: or_placeholder(title, PLACEHOLDER_TITLE),
            link: or_placeholder(link, PLACEHOLDER_LINK),
            pub_date: or_placeholder(pub_date, PLACEHOLDER_PUB_DATE),
            description: or_placeholder(description, PLACEHOLDER_DESCRIPTION),
            category: None,
            image_url: None,
            author: None,
            source: None,
        }
    }

    pub fn with_category(mut self, category: Option<String>) -> Self {
        self.category = non_blank(category);
        self
    }

    pub fn with_image_url(mut self, image_url: Option<String>) -> Self {
        self.image_url = non_blank(image_url);
        self
    }

    pub fn with_author(mut self, author: Option<String>) -> Self {
        self.author = non_blank(author);
        self
    }

    pub fn with_source(mut self, source: Option<String>) -> Self {
        self.source = non_blank(source);
        self
    }

    /// The single stand-in item used when a feed cannot be loaded.
    pub fn unable_to_load(feed_url: &str) -> Self {
        Self::from_parts(
            Some("Unable to load feed".to_owned()),
            Some(feed_url.to_owned()),
            None,
            Some(UNABLE_TO_LOAD.to_owned()),
        )
    }

    /// True when the link is missing and cannot be fetched or followed.
    pub fn has_placeholder_link(&self) -> bool {
        self.link == PLACEHOLDER_LINK
    }
}

/// A user subscription: a URL tagged with a category, holding its items.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Feed {
    pub url: String,
    pub category: String,
    #[serde(default)]
    pub items: Vec<Article>,
}

impl Feed {
    pub fn new(url: impl Into<String>, category: impl Into<String>, items: Vec<Article>) -> Self {
        Self {
            url: url.into(),
            category: category.into(),
            items,
        }
    }
}

/// What an upsert did to the collection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    /// A new feed was appended.
    Inserted,
    /// An existing feed with the same URL was replaced in place.
    Replaced,
}

/// Internal row type for article queries
#[derive(Debug, sqlx::FromRow)]
pub(crate) struct ArticleRow {
    pub feed_id: i64,
    pub title: String,
    pub link: String,
    pub pub_date: String,
    pub description: String,
    pub category: Option<String>,
    pub image_url: Option<String>,
    pub author: Option<String>,
    pub source: Option<String>,
}

impl ArticleRow {
    pub(crate) fn into_tuple(self) -> (i64, Article) {
        (
            self.feed_id,
            Article {
                title: self.title,
                link: self.link,
                pub_date: self.pub_date,
                description: self.description,
                category: self.category,
                image_url: self.image_url,
                author: self.author,
                source: self.source,
            },
        )
    }
}
