//! API routes and handlers
//!
//! This module defines all API endpoints and their routing.

use axum::{routing::get, routing::post, routing::put, Router};

use crate::AppState;

mod api_keys;
mod auth;
mod chats;
mod exports;
mod health;
mod organizations;

/// Public API routes (no authentication required)
pub fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/auth/login", post(auth::login))
}

/// Protected API routes (bearer token required)
pub fn protected_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/password", put(auth::change_password))
        .nest("/exports", exports::routes())
        .nest("/api-keys", api_keys::routes())
        .nest("/organizations", organizations::routes())
}

/// Ingestion routes (organization API key required)
pub fn ingestion_routes() -> Router<AppState> {
    Router::new().nest("/orgs", chats::routes())
}
