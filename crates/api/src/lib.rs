//! HTTP API layer with Axum routes and middleware.
//!
//! This crate provides:
//! - REST API routes for user photos and post images
//! - The requester extractor
//! - Error responses

pub mod error;
pub mod middleware;
pub mod routes;

use std::sync::Arc;

use axum::Router;
use axum::extract::DefaultBodyLimit;
use bazaar_core::attachment::AttachmentSynchronizer;
use bazaar_core::storage::StorageService;
use bazaar_db::AttachmentRecordStore;
use sea_orm::DatabaseConnection;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Synchronizer wired to the OpenDAL store and the Postgres records.
pub type Synchronizer = AttachmentSynchronizer<StorageService, AttachmentRecordStore>;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool.
    pub db: Arc<DatabaseConnection>,
    /// Attachment lifecycle orchestrator.
    pub synchronizer: Arc<Synchronizer>,
    /// Photo URL for users without an uploaded photo.
    pub default_photo_url: Arc<str>,
    /// Maximum request body size, multipart included.
    pub body_limit_bytes: usize,
}

/// Creates the main application router.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .nest("/api/v1", routes::api_routes())
        .layer(DefaultBodyLimit::max(state.body_limit_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        )
        .with_state(state)
}
