//! Attachment error types.

use bazaar_shared::{AppError, UserId};
use thiserror::Error;
use uuid::Uuid;

use super::types::{EntityKind, TooManyAttachments};
use crate::storage::StorageError;

/// Attachment operation errors.
#[derive(Debug, Error)]
pub enum AttachmentError {
    /// Inbound file rejected by intake. Nothing was stored.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// Remote store call failed.
    #[error("remote store error: {0}")]
    RemoteStore(#[from] StorageError),

    /// Record read or write failed.
    #[error("persistence error: {0}")]
    Persistence(String),

    /// Record does not exist.
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Kind of the missing record.
        kind: EntityKind,
        /// Id of the missing record.
        id: Uuid,
    },

    /// Requester does not own the record.
    #[error("{requester} does not own {kind} {id}")]
    Forbidden {
        /// Kind of the record.
        kind: EntityKind,
        /// Id of the record.
        id: Uuid,
        /// Requesting user.
        requester: UserId,
    },

    /// Scratch storage for buffered uploads failed.
    #[error("upload buffer error: {0}")]
    Buffer(#[from] std::io::Error),

    /// The caller went away before the record was written.
    #[error("operation cancelled")]
    Cancelled,
}

impl AttachmentError {
    /// Create an unsupported media type error.
    #[must_use]
    pub fn unsupported(reason: impl Into<String>) -> Self {
        Self::UnsupportedMediaType(reason.into())
    }

    /// Create a persistence error.
    #[must_use]
    pub fn persistence(msg: impl Into<String>) -> Self {
        Self::Persistence(msg.into())
    }

    /// Create a not found error.
    #[must_use]
    pub const fn not_found(kind: EntityKind, id: Uuid) -> Self {
        Self::NotFound { kind, id }
    }

    /// Create a forbidden error.
    #[must_use]
    pub const fn forbidden(kind: EntityKind, id: Uuid, requester: UserId) -> Self {
        Self::Forbidden {
            kind,
            id,
            requester,
        }
    }
}

impl From<TooManyAttachments> for AttachmentError {
    fn from(err: TooManyAttachments) -> Self {
        Self::Persistence(err.to_string())
    }
}

impl From<AttachmentError> for AppError {
    fn from(err: AttachmentError) -> Self {
        match err {
            AttachmentError::UnsupportedMediaType(reason) => Self::UnsupportedMediaType(reason),
            AttachmentError::RemoteStore(e) => Self::ExternalService(e.to_string()),
            AttachmentError::Persistence(msg) => Self::Database(msg),
            e @ AttachmentError::NotFound { .. } => Self::NotFound(e.to_string()),
            e @ AttachmentError::Forbidden { .. } => Self::Forbidden(e.to_string()),
            e @ (AttachmentError::Buffer(_) | AttachmentError::Cancelled) => {
                Self::Internal(e.to_string())
            }
        }
    }
}
