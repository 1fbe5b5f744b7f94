//! HTTP surface: the reader pages, the feed forms, the JSON API and the
//! web parser relay.

pub mod error;
pub mod handlers;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
