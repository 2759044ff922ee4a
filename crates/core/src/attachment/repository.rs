//! Entity record updater seam.

use std::future::Future;

use bazaar_shared::UserId;
use uuid::Uuid;

use super::error::AttachmentError;
use super::types::{AttachmentSet, EntityKind, EntitySnapshot, RemovedRecord};

/// Persistence of attachment sets on user and post records.
///
/// This trait is implemented by the db crate to provide actual database operations.
pub trait AttachmentRecordRepository: Send + Sync {
    /// Current owner and attachments of a record, if it exists.
    fn snapshot(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<EntitySnapshot>, AttachmentError>> + Send;

    /// Replace the record's whole attachment set and return the set it held before.
    ///
    /// Read, ownership check and write are atomic with respect to other
    /// writers of the same record.
    ///
    /// # Errors
    ///
    /// `NotFound` if the record does not exist, `Forbidden` if `requester`
    /// does not own it, `Persistence` if the write fails.
    fn replace_attachments(
        &self,
        kind: EntityKind,
        id: Uuid,
        attachments: AttachmentSet,
        requester: UserId,
    ) -> impl Future<Output = Result<AttachmentSet, AttachmentError>> + Send;

    /// Delete the record and report the attachments it held at that moment.
    ///
    /// The sets are read under the same lock that removes the rows, so a
    /// replace that committed just before is reflected and one still waiting
    /// finds the record gone. Deleting a user removes the user's posts in the
    /// same step. `None` if the record was already gone.
    fn delete_record(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> impl Future<Output = Result<Option<RemovedRecord>, AttachmentError>> + Send;
}
