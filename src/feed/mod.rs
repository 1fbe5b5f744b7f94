//! Feed ingestion: turning a subscription URL into articles.
//!
//! - [`converter`] - the hosted RSS-to-JSON service
//! - [`fetcher`] - size- and time-limited HTTP GET
//! - [`parser`] - local RSS/Atom parsing via `feed-rs`, with an HTML fallback
//! - [`ingest`] - strategy selection and the failure policy
//!
//! # Example
//!
//! ```ignore
//! use crate::feed::{IngestStrategy, Ingestor};
//!
//! let articles = ingestor.ingest_with(IngestStrategy::Direct, "https://example.com/rss").await;
//! ```

pub mod converter;
pub mod fetcher;
pub mod ingest;
pub mod parser;

pub use converter::{Converter, DEFAULT_CONVERTER_URL};
pub use fetcher::{fetch_bytes, FetchError};
pub use ingest::{FailurePolicy, IngestStrategy, Ingestor};
pub use parser::{parse_feed, ParseError};
