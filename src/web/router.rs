//! Router configuration.

use axum::{
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use super::handlers::{
    add_feed, article, edit_feed, health_check, index, list_categories, list_feeds, refresh_feed,
    relay, remove_feed, AppState,
};

/// Create the main router.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let feed_routes = Router::new()
        .route("/feeds", post(add_feed))
        .route("/feeds/edit", post(edit_feed))
        .route("/feeds/remove", post(remove_feed))
        .route("/feeds/refresh", post(refresh_feed));

    let api_routes = Router::new()
        .route("/webparser", post(relay))
        .route("/feeds", get(list_feeds))
        .route("/categories", get(list_categories));

    Router::new()
        .route("/", get(index).post(relay))
        .route("/article", get(article))
        .merge(feed_routes)
        .nest("/api", api_routes)
        .merge(create_health_router())
        .layer(TraceLayer::new_for_http())
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health_check))
}
