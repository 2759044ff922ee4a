//! Requester identity set by the upstream authentication gateway.

use axum::{extract::FromRequestParts, http::request::Parts};
use bazaar_shared::{AppError, UserId};

use crate::error::ApiError;

/// Header carrying the authenticated user's id.
pub const REQUESTER_HEADER: &str = "x-requester-id";

/// Extractor for the authenticated requester.
///
/// The gateway in front of this service authenticates the caller and sets
/// [`REQUESTER_HEADER`]; this extractor only parses it.
///
/// ```ignore
/// async fn handler(RequesterId(user_id): RequesterId) -> impl IntoResponse {
///     // ...
/// }
/// ```
#[derive(Debug, Clone, Copy)]
pub struct RequesterId(pub UserId);

impl<S> FromRequestParts<S> for RequesterId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let value = parts
            .headers
            .get(REQUESTER_HEADER)
            .ok_or_else(|| unauthorized("Requester identity is required"))?;

        value
            .to_str()
            .ok()
            .and_then(|v| v.trim().parse::<UserId>().ok())
            .map(RequesterId)
            .ok_or_else(|| unauthorized("Requester identity is malformed"))
    }
}

fn unauthorized(message: &str) -> ApiError {
    ApiError(AppError::Unauthorized(message.to_string()))
}
