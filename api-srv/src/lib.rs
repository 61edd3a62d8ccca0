//! transcriber-api-srv : authentication gateway in front of the transcriber API

pub mod auth_routes;
pub mod config;
pub mod observability;
pub mod state;

use anyhow::{Context, Result};
use axum::{
    Json, Router, middleware,
    response::IntoResponse,
    routing::{get, post},
};
use chrono::Utc;
use http::{HeaderValue, Method, header};
use observability::observability_middleware;
use serde_json::json;
use state::AppState;
use tower_http::cors::CorsLayer;
use transcriber_auth::axum::auth_middleware;

/// CORS restricted to the web application's origin
pub fn cors_layer(origin: &str) -> Result<CorsLayer> {
    let origin = origin
        .parse::<HeaderValue>()
        .context("Invalid CORS origin format")?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE, header::AUTHORIZATION])
        .allow_credentials(true))
}

/// Build the gateway router
///
/// `api_prefix` must already be normalized, see
/// [`config::normalize_api_prefix`].
pub fn build_router(state: AppState, api_prefix: &str, cors: CorsLayer) -> Router {
    let verifier = state.verifier.clone();
    let protected_routes = Router::new()
        .route(&format!("{api_prefix}/me"), get(auth_routes::me))
        .layer(middleware::from_fn(move |req, next| {
            auth_middleware(verifier.clone(), req, next)
        }));

    let auth_routes = Router::new()
        .route(&format!("{api_prefix}/login"), get(auth_routes::login))
        .route(&format!("{api_prefix}/auth"), get(auth_routes::auth_callback))
        .route(&format!("{api_prefix}/logout"), get(auth_routes::logout))
        .route(&format!("{api_prefix}/refresh"), post(auth_routes::refresh))
        .with_state(state);

    Router::new()
        .route("/health", get(health_check))
        .merge(auth_routes)
        .merge(protected_routes)
        .layer(middleware::from_fn(observability_middleware))
        .layer(cors)
}

async fn health_check() -> impl IntoResponse {
    Json(json!({
        "status": "healthy",
        "timestamp": Utc::now(),
    }))
}
