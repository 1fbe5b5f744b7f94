//! Shared setup for router tests.

use axum::body::Body;
use axum::http::{header, Request, Response};
use axum::Router;
use feedrelay::config::Config;
use feedrelay::content::WebParserClient;
use feedrelay::feed::IngestStrategy;
use feedrelay::web::{create_router, AppState};
use feedrelay::{App, Database};
use http_body_util::BodyExt;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

/// Router over an in-memory store with ingestion and the relay pointed at
/// `upstream`.
#[allow(dead_code)]
pub async fn router_with_upstream(upstream: &str) -> (Router, Database) {
    let mut config = Config::default();
    config.ingest.strategy = IngestStrategy::Direct;
    config.webparser.endpoint = format!("{}/webparser", upstream);
    config.enrichment.enabled = false;

    let db = Database::open(":memory:").await.unwrap();
    let app = App::new(db.clone(), &config).unwrap();
    let relay = WebParserClient::new(
        reqwest::Client::new(),
        config.webparser.endpoint.clone(),
        Duration::from_secs(2),
    );
    (create_router(Arc::new(AppState::new(app, relay))), db)
}

#[allow(dead_code)]
pub async fn send(router: &Router, request: Request<Body>) -> Response<Body> {
    router.clone().oneshot(request).await.unwrap()
}

#[allow(dead_code)]
pub fn json_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

#[allow(dead_code)]
pub fn form_post(uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/x-www-form-urlencoded")
        .body(Body::from(body.to_owned()))
        .unwrap()
}

#[allow(dead_code)]
pub fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

#[allow(dead_code)]
pub async fn body_bytes(response: Response<Body>) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

#[allow(dead_code)]
pub async fn body_string(response: Response<Body>) -> String {
    String::from_utf8(body_bytes(response).await).unwrap()
}
