//! Full-article content via the hosted web parser.
//!
//! - [`webparser`] - the extraction client, also used by the relay route
//! - [`enrich`] - render-time fan-out with generation-based cancellation

mod enrich;
mod webparser;

pub use enrich::{EnrichedContent, Enricher, RenderGate, RenderTicket};
pub use webparser::{ContentError, ExtractedArticle, WebParserClient, DEFAULT_WEBPARSER_ENDPOINT};
