//! Feed form submissions.
//!
//! Success redirects back to the page (303). A rejected submission re-renders
//! the page with the reason as a notice.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Redirect, Response},
    Form,
};
use serde::Deserialize;
use std::sync::Arc;

use super::AppState;
use crate::app::{AppError, RenderRequest};
use crate::web::ApiError;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AddFeedForm {
    #[serde(default)]
    pub feed_url: String,
    #[serde(default)]
    pub category: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EditFeedForm {
    #[serde(default)]
    pub original_url: String,
    #[serde(default)]
    pub edit_feed_url: String,
    #[serde(default)]
    pub edit_category: String,
}

#[derive(Debug, Deserialize)]
pub struct FeedUrlForm {
    #[serde(default)]
    pub url: String,
}

/// `POST /feeds`.
pub async fn add_feed(State(state): State<Arc<AppState>>, Form(form): Form<AddFeedForm>) -> Response {
    match state.app.add_feed(&form.feed_url, &form.category).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => error_page(&state, e, None).await,
    }
}

/// `POST /feeds/edit`.
pub async fn edit_feed(
    State(state): State<Arc<AppState>>,
    Form(form): Form<EditFeedForm>,
) -> Response {
    match state
        .app
        .edit_feed(&form.original_url, &form.edit_feed_url, &form.edit_category)
        .await
    {
        Ok(()) => Redirect::to("/").into_response(),
        // Keep the modal open so the user can correct the input
        Err(e @ (AppError::MissingFields | AppError::InvalidUrl(_))) => {
            error_page(&state, e, Some(form.original_url)).await
        }
        Err(e) => error_page(&state, e, None).await,
    }
}

/// `POST /feeds/remove`.
pub async fn remove_feed(
    State(state): State<Arc<AppState>>,
    Form(form): Form<FeedUrlForm>,
) -> Response {
    match state.app.remove_feed(&form.url).await {
        Ok(()) => Redirect::to("/").into_response(),
        Err(e) => error_page(&state, e, None).await,
    }
}

/// `POST /feeds/refresh`.
pub async fn refresh_feed(
    State(state): State<Arc<AppState>>,
    Form(form): Form<FeedUrlForm>,
) -> Response {
    match state.app.refresh_feed(&form.url).await {
        Ok(_) => Redirect::to("/").into_response(),
        Err(e) => error_page(&state, e, None).await,
    }
}

/// Page with the error as a notice: 400 for bad input, 404 for an unknown
/// feed. Storage failures get the JSON error body.
async fn error_page(state: &AppState, err: AppError, edit: Option<String>) -> Response {
    let status = match &err {
        AppError::MissingFields | AppError::InvalidUrl(_) => StatusCode::BAD_REQUEST,
        AppError::NotFound(_) => StatusCode::NOT_FOUND,
        AppError::Storage(_) => return ApiError::from(err).into_response(),
    };
    tracing::info!(status = status.as_u16(), reason = %err, "Rejected feed form");

    let request = RenderRequest {
        edit,
        notice: Some(err.to_string()),
        ..Default::default()
    };
    match state.app.render(request).await {
        Ok(page) => (status, Html(page)).into_response(),
        Err(e) => ApiError::from(e).into_response(),
    }
}
