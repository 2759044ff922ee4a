//! API route definitions.

use axum::Router;

use crate::AppState;

pub mod form;
pub mod health;
pub mod posts;
pub mod users;

/// Creates the API router with all routes.
///
/// Every route except health reads the requester from the gateway header.
pub fn api_routes() -> Router<AppState> {
    Router::new()
        .merge(health::routes())
        .merge(users::routes())
        .merge(posts::routes())
}
