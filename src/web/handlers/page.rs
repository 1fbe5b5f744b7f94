//! HTML pages and the read-only JSON API.

use axum::{
    extract::{Query, State},
    response::Html,
    Json,
};
use serde::Deserialize;
use std::sync::Arc;

use super::AppState;
use crate::app::RenderRequest;
use crate::render::Filter;
use crate::storage::Feed;
use crate::web::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct PageQuery {
    pub category: Option<String>,
    /// Feed URL whose edit modal should be open.
    pub edit: Option<String>,
}

/// `GET /`.
pub async fn index(
    State(state): State<Arc<AppState>>,
    Query(query): Query<PageQuery>,
) -> Result<Html<String>, ApiError> {
    let page = state
        .app
        .render(RenderRequest {
            filter: Filter::from_query(query.category.as_deref()),
            edit: query.edit.filter(|url| !url.trim().is_empty()),
            ..Default::default()
        })
        .await?;
    Ok(Html(page))
}

#[derive(Debug, Deserialize)]
pub struct ArticleQuery {
    pub link: String,
    pub category: Option<String>,
}

/// `GET /article?link=`: the page with the article-content modal open.
pub async fn article(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ArticleQuery>,
) -> Result<Html<String>, ApiError> {
    let page = state
        .app
        .render(RenderRequest {
            filter: Filter::from_query(query.category.as_deref()),
            article: Some(query.link),
            ..Default::default()
        })
        .await?;
    Ok(Html(page))
}

/// `GET /api/feeds`: the whole collection in snapshot form.
pub async fn list_feeds(State(state): State<Arc<AppState>>) -> Result<Json<Vec<Feed>>, ApiError> {
    Ok(Json(state.app.feeds().await?))
}

/// `GET /api/categories`.
pub async fn list_categories(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.app.categories().await?))
}
