//! Attachment lifecycle for user photos and post images.
//!
//! This module moves an image from an inbound upload, through the remote
//! store, into the owning record, and reverses that on replace or delete:
//! - Intake validation (image media types, per-field cardinality, size)
//! - Request-scoped buffering with guaranteed cleanup
//! - All-or-nothing replace with compensating deletes
//! - Reaping of replaced sets only after the record write commits
//! - Entity deletion, cascading from a user to the user's posts

mod buffer;
mod error;
mod intake;
mod repository;
mod synchronizer;
mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use buffer::{BufferHandle, TransientBuffer};
pub use error::AttachmentError;
pub use intake::IntakeFilter;
pub use repository::AttachmentRecordRepository;
pub use synchronizer::AttachmentSynchronizer;
pub use types::{
    AttachmentDescriptor, AttachmentSet, CandidateFile, EntityKind, EntitySnapshot, PendingUpload,
    RemovedRecord, SyncPhase, TooManyAttachments,
};
