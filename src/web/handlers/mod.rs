//! Request handlers.

pub mod feeds;
pub mod page;
pub mod relay;

pub use feeds::*;
pub use page::*;
pub use relay::*;

use crate::app::App;
use crate::content::WebParserClient;

/// Shared state for every handler.
pub struct AppState {
    pub app: App,
    /// Upstream the relay routes forward to.
    pub relay: WebParserClient,
}

impl AppState {
    pub fn new(app: App, relay: WebParserClient) -> Self {
        Self { app, relay }
    }
}
