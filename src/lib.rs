//! feedrelay - a single-user RSS reader served over HTTP.
//!
//! Feeds are ingested through an RSS-to-JSON service, parsed locally, or
//! extracted by a web parser; they live in SQLite and every page is rendered
//! from the store. A relay route forwards `{url}` to the web parser for
//! clients that cannot call it directly.

pub mod app;
pub mod config;
pub mod content;
pub mod feed;
pub mod render;
pub mod storage;
pub mod util;
pub mod web;

pub use app::{App, AppError, RenderRequest};
pub use config::Config;
pub use storage::{Article, Database, DatabaseError, Feed};
