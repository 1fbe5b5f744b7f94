//! The web parser relay.
//!
//! Forwards `{url}` upstream and hands back whatever JSON comes back. Every
//! upstream failure looks the same to the caller.

use axum::{
    extract::{rejection::JsonRejection, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;

use super::AppState;
use crate::web::ApiError;

#[derive(Debug, Deserialize)]
pub struct RelayRequest {
    pub url: String,
}

/// `POST /api/webparser` and `POST /`.
pub async fn relay(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<RelayRequest>, JsonRejection>,
) -> Response {
    let Json(request) = match payload {
        Ok(payload) => payload,
        Err(rejection) => return ApiError::bad_request(rejection.body_text()).into_response(),
    };

    match state.relay.forward(&request.url).await {
        Ok(body) => ([(header::CONTENT_TYPE, "application/json")], body).into_response(),
        Err(e) => {
            tracing::error!(
                url = %request.url,
                upstream = %state.relay.endpoint(),
                error = %e,
                "Web parser relay failed"
            );
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(json!({ "error": "Internal Server Error" })),
            )
                .into_response()
        }
    }
}

/// `GET /health`.
pub async fn health_check() -> &'static str {
    "Proxy server is running"
}
