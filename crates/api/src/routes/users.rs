//! Requester profile routes: photo replacement and account deletion.

use axum::{
    Json, Router,
    extract::{Multipart, State},
    http::StatusCode,
    routing::{delete, patch},
};
use bazaar_core::attachment::{AttachmentSet, EntityKind};
use serde::Serialize;
use tracing::info;

use super::form::AttachmentForm;
use crate::{AppState, error::ApiError, middleware::RequesterId};

/// Creates the user routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/users/me/photo", patch(update_photo))
        .route("/users/me", delete(delete_me))
}

/// Photo of a user after an update.
#[derive(Debug, Serialize)]
pub struct PhotoResponse {
    /// Public URL, the default photo when none is stored.
    pub photo_url: String,
    /// Remote object key, absent for the default photo.
    pub photo_remote_id: Option<String>,
}

impl PhotoResponse {
    fn from_set(set: &AttachmentSet, default_photo_url: &str) -> Self {
        match set.descriptors().first() {
            Some(photo) => Self {
                photo_url: photo.url().to_string(),
                photo_remote_id: Some(photo.remote_id().to_string()),
            },
            None => Self {
                photo_url: default_photo_url.to_string(),
                photo_remote_id: None,
            },
        }
    }
}

/// PATCH /users/me/photo
async fn update_photo(
    State(state): State<AppState>,
    RequesterId(requester): RequesterId,
    multipart: Multipart,
) -> Result<Json<PhotoResponse>, ApiError> {
    let form = AttachmentForm::read(multipart).await?;

    let photo = state
        .synchronizer
        .synchronize_attachments(
            EntityKind::User,
            requester.into_inner(),
            requester,
            form.into_files(),
        )
        .await?;

    Ok(Json(PhotoResponse::from_set(
        &photo,
        &state.default_photo_url,
    )))
}

/// DELETE /users/me
async fn delete_me(
    State(state): State<AppState>,
    RequesterId(requester): RequesterId,
) -> Result<StatusCode, ApiError> {
    state
        .synchronizer
        .delete_entity(EntityKind::User, requester.into_inner(), requester)
        .await?;

    info!(user_id = %requester, "Account deleted");
    Ok(StatusCode::NO_CONTENT)
}
