//! Attachment types and data structures.

use std::fmt;

use bazaar_shared::UserId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Kind of record that owns an attachment set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// A user's profile photo.
    User,
    /// A post's image gallery.
    Post,
}

impl EntityKind {
    /// Multipart field the files for this kind arrive under.
    #[must_use]
    pub const fn field_name(self) -> &'static str {
        match self {
            Self::User => "photo",
            Self::Post => "images",
        }
    }

    /// Maximum number of attachments a record of this kind holds.
    #[must_use]
    pub const fn max_attachments(self) -> usize {
        match self {
            Self::User => 1,
            Self::Post => 3,
        }
    }

    /// Convert to a log/database label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Post => "post",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One stored remote asset.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct AttachmentDescriptor {
    remote_id: String,
    url: String,
}

impl AttachmentDescriptor {
    /// Create a descriptor for an object that exists in the remote store.
    #[must_use]
    pub fn new(remote_id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            remote_id: remote_id.into(),
            url: url.into(),
        }
    }

    /// Key of the object in the remote store.
    #[must_use]
    pub fn remote_id(&self) -> &str {
        &self.remote_id
    }

    /// Public URL of the object.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }
}

/// Rejected attempt to build an oversized [`AttachmentSet`].
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("{kind} holds at most {max} attachments, got {actual}")]
pub struct TooManyAttachments {
    /// Kind the set was built for.
    pub kind: EntityKind,
    /// Cardinality of that kind.
    pub max: usize,
    /// Number of descriptors offered.
    pub actual: usize,
}

/// Ordered, bounded set of attachments held by one record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AttachmentSet(Vec<AttachmentDescriptor>);

impl AttachmentSet {
    /// Build a set for a record of `kind`, enforcing its cardinality.
    ///
    /// # Errors
    ///
    /// Returns [`TooManyAttachments`] if `descriptors` exceeds the limit for `kind`.
    pub fn for_kind(
        kind: EntityKind,
        descriptors: Vec<AttachmentDescriptor>,
    ) -> Result<Self, TooManyAttachments> {
        if descriptors.len() > kind.max_attachments() {
            return Err(TooManyAttachments {
                kind,
                max: kind.max_attachments(),
                actual: descriptors.len(),
            });
        }
        Ok(Self(descriptors))
    }

    /// The empty set. A user with no photo renders the default image.
    #[must_use]
    pub const fn empty() -> Self {
        Self(Vec::new())
    }

    /// Descriptors in upload order.
    #[must_use]
    pub fn descriptors(&self) -> &[AttachmentDescriptor] {
        &self.0
    }

    /// Consume the set into its descriptors.
    #[must_use]
    pub fn into_descriptors(self) -> Vec<AttachmentDescriptor> {
        self.0
    }

    /// Number of attachments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether the set holds nothing.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Whether `remote_id` belongs to this set.
    #[must_use]
    pub fn contains(&self, remote_id: &str) -> bool {
        self.0.iter().any(|d| d.remote_id == remote_id)
    }
}

/// A file as it arrived in a request, before intake.
#[derive(Debug, Clone)]
pub struct CandidateFile {
    /// Multipart field name.
    pub field_name: String,
    /// Client-supplied file name.
    pub file_name: Option<String>,
    /// Declared `Content-Type` of the part.
    pub content_type: Option<String>,
    /// Raw file bytes.
    pub bytes: Bytes,
}

impl CandidateFile {
    /// Create a candidate under `field_name`.
    #[must_use]
    pub fn new(field_name: impl Into<String>, bytes: impl Into<Bytes>) -> Self {
        Self {
            field_name: field_name.into(),
            file_name: None,
            content_type: None,
            bytes: bytes.into(),
        }
    }

    /// Set the declared content type.
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// Set the client file name.
    #[must_use]
    pub fn with_file_name(mut self, file_name: impl Into<String>) -> Self {
        self.file_name = Some(file_name.into());
        self
    }
}

/// A validated file waiting to be uploaded. Never outlives one request.
#[derive(Debug, Clone)]
pub struct PendingUpload {
    /// Multipart field name.
    pub field_name: String,
    /// Client-supplied file name.
    pub file_name: Option<String>,
    /// Normalized `image/*` media type, without parameters.
    pub mime_type: String,
    /// Raw file bytes.
    pub bytes: Bytes,
}

/// Lifecycle phase of one synchronize operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Files received, not yet checked.
    Intake,
    /// Every file passed the intake filter.
    Validated,
    /// Uploads in flight.
    Uploading,
    /// New set written to the record.
    Committed,
    /// An upload failed or the caller went away; new uploads compensated.
    UploadFailed,
    /// Deleting the set the commit replaced.
    ReapingOld,
    /// Previous set deleted.
    Reaped,
}

impl SyncPhase {
    /// Label for logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Intake => "intake",
            Self::Validated => "validated",
            Self::Uploading => "uploading",
            Self::Committed => "committed",
            Self::UploadFailed => "upload_failed",
            Self::ReapingOld => "reaping_old",
            Self::Reaped => "reaped",
        }
    }
}

/// Current attachment state of a record together with its owner.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntitySnapshot {
    /// User that owns the record. For a user record this is the user itself.
    pub owner_id: UserId,
    /// Attachments the record currently references.
    pub attachments: AttachmentSet,
}

/// Attachments that went away with a deleted record.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RemovedRecord {
    /// The record's own set.
    pub attachments: AttachmentSet,
    /// Sets of records removed along with it: a user's posts.
    pub cascaded: Vec<AttachmentSet>,
}

impl RemovedRecord {
    /// Every descriptor, the record's own first.
    #[must_use]
    pub fn into_descriptors(self) -> Vec<AttachmentDescriptor> {
        let mut descriptors = self.attachments.into_descriptors();
        for set in self.cascaded {
            descriptors.extend(set.into_descriptors());
        }
        descriptors
    }
}
