//! Post routes with image attachments.

use std::str::FromStr;
use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Multipart, Path, State},
    http::StatusCode,
    routing::{delete, patch, post},
};
use bazaar_core::attachment::{AttachmentDescriptor, AttachmentSet, CandidateFile, EntityKind};
use bazaar_db::{CreatePostInput, PostRepository, UserRepository, entities::posts};
use bazaar_shared::{AppError, PostId, UserId};
use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{info, warn};
use uuid::Uuid;

use super::form::AttachmentForm;
use crate::{AppState, Synchronizer, error::ApiError, middleware::RequesterId};

/// Creates the post routes.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/posts", post(create_post))
        .route("/posts/{post_id}/images", patch(update_images))
        .route("/posts/{post_id}", delete(delete_post))
}

// ============================================================================
// Response Types
// ============================================================================

/// A post with its images.
#[derive(Debug, Serialize)]
pub struct PostResponse {
    /// Post ID.
    pub id: Uuid,
    /// Owner.
    pub user_id: Uuid,
    /// Body text.
    pub content: String,
    /// Where the item is.
    pub location: String,
    /// Listing category.
    pub category: String,
    /// Asking price.
    pub price: Option<Decimal>,
    /// Attached images in upload order.
    pub images: Vec<AttachmentDescriptor>,
    /// Creation time.
    pub created_at: DateTime<FixedOffset>,
}

impl PostResponse {
    fn new(post: posts::Model, images: AttachmentSet) -> Self {
        Self {
            id: post.id,
            user_id: post.user_id,
            content: post.content,
            location: post.location,
            category: post.category,
            price: post.price,
            images: images.into_descriptors(),
            created_at: post.created_at,
        }
    }
}

/// Images of a post after replacement.
#[derive(Debug, Serialize)]
pub struct ImagesResponse {
    /// Attached images in upload order.
    pub images: Vec<AttachmentDescriptor>,
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /posts
///
/// The post row is inserted first so the synchronizer has a record to
/// attach to. If attaching fails, the row is removed again. Insert, attach
/// and removal run on their own task, so a client that disconnects midway
/// cannot leave an imageless post behind.
async fn create_post(
    State(state): State<AppState>,
    RequesterId(requester): RequesterId,
    multipart: Multipart,
) -> Result<(StatusCode, Json<PostResponse>), ApiError> {
    let form = AttachmentForm::read(multipart).await?;

    let input = CreatePostInput {
        user_id: requester.into_inner(),
        content: form.required("content")?,
        location: form.required("location")?,
        category: form.required("category")?,
        price: parse_price(form.optional("price"))?,
    };
    state
        .synchronizer
        .intake()
        .check(EntityKind::Post, form.files())?;

    let db = (*state.db).clone();
    if UserRepository::new(db.clone())
        .find_by_id(requester.into_inner())
        .await?
        .is_none()
    {
        return Err(AppError::NotFound(format!("user {requester}")).into());
    }

    let (post, images) = detached(create_with_images(
        Arc::clone(&state.synchronizer),
        PostRepository::new(db),
        input,
        requester,
        form.into_files(),
    ))
    .await?;

    info!(post_id = %post.id, user_id = %requester, images = images.len(), "Post created");
    Ok((StatusCode::CREATED, Json(PostResponse::new(post, images))))
}

async fn create_with_images(
    synchronizer: Arc<Synchronizer>,
    post_repo: PostRepository,
    input: CreatePostInput,
    requester: UserId,
    files: Vec<CandidateFile>,
) -> Result<(posts::Model, AttachmentSet), ApiError> {
    let post = post_repo.create(input).await?;

    match synchronizer
        .synchronize_attachments(EntityKind::Post, post.id, requester, files)
        .await
    {
        Ok(images) => Ok((post, images)),
        Err(e) => {
            if let Err(cleanup) = post_repo.delete(post.id).await {
                warn!(post_id = %post.id, error = %cleanup, "Failed to remove post after attachment failure");
            }
            Err(e.into())
        }
    }
}

/// Run `work` to completion on its own task, even if the caller goes away.
async fn detached<T>(
    work: impl Future<Output = Result<T, ApiError>> + Send + 'static,
) -> Result<T, ApiError>
where
    T: Send + 'static,
{
    match tokio::spawn(work).await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(ApiError(AppError::Internal("request task was cancelled".to_string()))),
    }
}

/// PATCH /posts/{post_id}/images
async fn update_images(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
    RequesterId(requester): RequesterId,
    multipart: Multipart,
) -> Result<Json<ImagesResponse>, ApiError> {
    let form = AttachmentForm::read(multipart).await?;

    let images = state
        .synchronizer
        .synchronize_attachments(
            EntityKind::Post,
            post_id.into_inner(),
            requester,
            form.into_files(),
        )
        .await?;

    Ok(Json(ImagesResponse {
        images: images.into_descriptors(),
    }))
}

/// DELETE /posts/{post_id}
async fn delete_post(
    State(state): State<AppState>,
    Path(post_id): Path<PostId>,
    RequesterId(requester): RequesterId,
) -> Result<StatusCode, ApiError> {
    state
        .synchronizer
        .delete_entity(EntityKind::Post, post_id.into_inner(), requester)
        .await?;

    info!(post_id = %post_id, user_id = %requester, "Post deleted");
    Ok(StatusCode::NO_CONTENT)
}

fn parse_price(raw: Option<&str>) -> Result<Option<Decimal>, ApiError> {
    let Some(raw) = raw else {
        return Ok(None);
    };

    let price = Decimal::from_str(raw)
        .map_err(|_| invalid_price(format!("`{raw}` is not a number")))?;
    if price.is_sign_negative() {
        return Err(invalid_price("price cannot be negative".to_string()));
    }
    if price.scale() > 2 {
        return Err(invalid_price("price has more than two decimal places".to_string()));
    }
    Ok(Some(price))
}

fn invalid_price(message: String) -> ApiError {
    ApiError(AppError::Validation(message))
}
