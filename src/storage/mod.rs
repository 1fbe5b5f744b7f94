//! Feed store backed by SQLite.
//!
//! The collection is an ordered list of feeds keyed by URL. Every mutation
//! runs in its own transaction, so the persisted state always matches what
//! the next render reads.

mod feeds;
mod schema;
mod snapshot;
mod types;

pub use schema::Database;
pub use types::{
    Article, DatabaseError, Feed, UpsertOutcome, PLACEHOLDER_DESCRIPTION, PLACEHOLDER_LINK,
    PLACEHOLDER_PUB_DATE, PLACEHOLDER_TITLE, UNABLE_TO_LOAD,
};
