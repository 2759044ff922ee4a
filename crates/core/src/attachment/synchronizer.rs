//! Attachment synchronizer: moves uploads into the store and the record.
//!
//! A replace runs `intake -> validated -> uploading -> committed`, then
//! `reaping_old -> reaped` when the record previously held attachments. A
//! failed or cancelled upload batch ends in `upload_failed` after every new
//! object is deleted again. The buffer is released on every path.

use std::sync::Arc;

use bazaar_shared::{BufferMode, UserId};
use futures::future::join_all;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::buffer::TransientBuffer;
use super::error::AttachmentError;
use super::intake::IntakeFilter;
use super::repository::AttachmentRecordRepository;
use super::types::{
    AttachmentDescriptor, AttachmentSet, CandidateFile, EntityKind, EntitySnapshot, PendingUpload,
    SyncPhase,
};
use crate::storage::AssetStore;

/// Orchestrates the attachment lifecycle of users and posts.
pub struct AttachmentSynchronizer<S: AssetStore, R: AttachmentRecordRepository> {
    store: Arc<S>,
    repo: Arc<R>,
    intake: IntakeFilter,
    buffer_mode: BufferMode,
}

impl<S: AssetStore, R: AttachmentRecordRepository> Clone for AttachmentSynchronizer<S, R> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            repo: Arc::clone(&self.repo),
            intake: self.intake,
            buffer_mode: self.buffer_mode.clone(),
        }
    }
}

impl<S, R> AttachmentSynchronizer<S, R>
where
    S: AssetStore + 'static,
    R: AttachmentRecordRepository + 'static,
{
    /// Create a new synchronizer.
    #[must_use]
    pub fn new(
        store: Arc<S>,
        repo: Arc<R>,
        intake: IntakeFilter,
        buffer_mode: BufferMode,
    ) -> Self {
        Self {
            store,
            repo,
            intake,
            buffer_mode,
        }
    }

    /// Intake filter applied to every batch.
    #[must_use]
    pub const fn intake(&self) -> &IntakeFilter {
        &self.intake
    }

    /// Replace the attachments of a record with `files`.
    ///
    /// All-or-nothing: either every file is uploaded and the record points
    /// at exactly the new set, or the record is untouched and none of the new
    /// objects remain in the store. The previous set is deleted only after
    /// the record write commits. An empty batch changes nothing and returns
    /// the current set.
    ///
    /// The work runs on its own task. If the caller stops waiting, in-flight
    /// uploads finish, are deleted again, and nothing is written.
    ///
    /// # Errors
    ///
    /// - `UnsupportedMediaType` if intake rejects the batch (no side effects)
    /// - `NotFound` / `Forbidden` if the record is missing or not owned by `requester`
    /// - `RemoteStore` if any upload fails
    /// - `Persistence` if the record write fails
    /// - `Buffer` if the scratch directory fails
    pub async fn synchronize_attachments(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        requester: UserId,
        files: Vec<CandidateFile>,
    ) -> Result<AttachmentSet, AttachmentError> {
        let cancel = CancellationToken::new();
        let guard = cancel.clone().drop_guard();

        let this = self.clone();
        let task = tokio::spawn(async move {
            this.replace(kind, entity_id, requester, files, cancel)
                .await
        });

        let result = join(task).await;
        guard.disarm();
        result
    }

    /// Delete a record together with every attachment it references.
    ///
    /// Existence and ownership are checked before anything is removed. The
    /// record goes first; the attachments it held at that moment are deleted
    /// from the store afterwards. Deleting a user also removes the user's
    /// posts and their images.
    ///
    /// # Errors
    ///
    /// - `NotFound` / `Forbidden` before any side effect
    /// - `Persistence` if removing the records fails
    pub async fn delete_entity(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        requester: UserId,
    ) -> Result<(), AttachmentError> {
        let this = self.clone();
        let task = tokio::spawn(async move { this.remove(kind, entity_id, requester).await });
        join(task).await
    }

    async fn replace(
        self,
        kind: EntityKind,
        entity_id: Uuid,
        requester: UserId,
        files: Vec<CandidateFile>,
        cancel: CancellationToken,
    ) -> Result<AttachmentSet, AttachmentError> {
        transition(kind, entity_id, SyncPhase::Intake);
        let uploads = self.intake.accept(kind, files)?;
        transition(kind, entity_id, SyncPhase::Validated);

        let snapshot = self.owned_snapshot(kind, entity_id, requester).await?;
        if uploads.is_empty() {
            debug!(entity_kind = %kind, entity_id = %entity_id, "No files, attachments unchanged");
            return Ok(snapshot.attachments);
        }

        let mut buffer = TransientBuffer::new(self.buffer_mode.clone());
        let outcome = self
            .commit(kind, entity_id, requester, uploads, &mut buffer, &cancel)
            .await;
        buffer.release_all().await;
        outcome
    }

    async fn commit(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        requester: UserId,
        uploads: Vec<PendingUpload>,
        buffer: &mut TransientBuffer,
        cancel: &CancellationToken,
    ) -> Result<AttachmentSet, AttachmentError> {
        let mut mime_types = Vec::with_capacity(uploads.len());
        let mut handles = Vec::with_capacity(uploads.len());
        for upload in uploads {
            mime_types.push(upload.mime_type.clone());
            handles.push(buffer.store(upload).await?);
        }

        let mut payloads = Vec::with_capacity(handles.len());
        for handle in &handles {
            payloads.push(buffer.read(*handle).await?);
        }

        transition(kind, entity_id, SyncPhase::Uploading);
        let results = join_all(
            payloads
                .into_iter()
                .zip(&mime_types)
                .map(|(bytes, mime_type)| self.store.upload(bytes, mime_type)),
        )
        .await;

        let mut uploaded = Vec::with_capacity(results.len());
        let mut failure = None;
        for result in results {
            match result {
                Ok(descriptor) => uploaded.push(descriptor),
                Err(e) if failure.is_none() => failure = Some(e),
                Err(e) => warn!(entity_kind = %kind, entity_id = %entity_id, error = %e, "Additional upload failed"),
            }
        }

        if let Some(e) = failure {
            transition(kind, entity_id, SyncPhase::UploadFailed);
            self.remove_assets(&uploaded).await;
            return Err(e.into());
        }

        if cancel.is_cancelled() {
            transition(kind, entity_id, SyncPhase::UploadFailed);
            self.remove_assets(&uploaded).await;
            return Err(AttachmentError::Cancelled);
        }

        let set = match AttachmentSet::for_kind(kind, uploaded.clone()) {
            Ok(set) => set,
            Err(e) => {
                self.remove_assets(&uploaded).await;
                return Err(e.into());
            }
        };

        let previous = match self
            .repo
            .replace_attachments(kind, entity_id, set.clone(), requester)
            .await
        {
            Ok(previous) => previous,
            Err(e) => {
                self.remove_assets(set.descriptors()).await;
                return Err(e);
            }
        };

        transition(kind, entity_id, SyncPhase::Committed);
        info!(
            entity_kind = %kind,
            entity_id = %entity_id,
            count = set.len(),
            replaced = previous.len(),
            "Attachments replaced"
        );

        if !previous.is_empty() {
            transition(kind, entity_id, SyncPhase::ReapingOld);
            self.remove_assets(previous.descriptors()).await;
            transition(kind, entity_id, SyncPhase::Reaped);
        }

        Ok(set)
    }

    async fn remove(
        self,
        kind: EntityKind,
        entity_id: Uuid,
        requester: UserId,
    ) -> Result<(), AttachmentError> {
        self.owned_snapshot(kind, entity_id, requester).await?;

        // Reap what the deletion actually removed, not the snapshot: a
        // replace may commit in between.
        let Some(removed) = self.repo.delete_record(kind, entity_id).await? else {
            debug!(entity_kind = %kind, entity_id = %entity_id, "Record already deleted");
            return Ok(());
        };

        let cascaded = removed.cascaded.len();
        let doomed = removed.into_descriptors();
        self.remove_assets(&doomed).await;

        info!(
            entity_kind = %kind,
            entity_id = %entity_id,
            assets = doomed.len(),
            cascaded,
            "Entity deleted"
        );
        Ok(())
    }

    /// Resolve a record and check that `requester` owns it.
    async fn owned_snapshot(
        &self,
        kind: EntityKind,
        entity_id: Uuid,
        requester: UserId,
    ) -> Result<EntitySnapshot, AttachmentError> {
        let snapshot = self
            .repo
            .snapshot(kind, entity_id)
            .await?
            .ok_or_else(|| AttachmentError::not_found(kind, entity_id))?;

        if snapshot.owner_id != requester {
            return Err(AttachmentError::forbidden(kind, entity_id, requester));
        }
        Ok(snapshot)
    }

    /// Best-effort concurrent delete. An object already gone counts as deleted.
    async fn remove_assets(&self, descriptors: &[AttachmentDescriptor]) {
        let results = join_all(descriptors.iter().map(|descriptor| async move {
            (descriptor, self.store.delete(descriptor.remote_id()).await)
        }))
        .await;

        for (descriptor, result) in results {
            match result {
                Ok(()) => {}
                Err(e) if e.is_not_found() => {
                    debug!(remote_id = descriptor.remote_id(), "Remote asset already gone");
                }
                Err(e) => warn!(
                    remote_id = descriptor.remote_id(),
                    error = %e,
                    "Failed to delete remote asset"
                ),
            }
        }
    }
}

fn transition(kind: EntityKind, entity_id: Uuid, phase: SyncPhase) {
    debug!(entity_kind = %kind, entity_id = %entity_id, phase = phase.as_str(), "Attachment sync");
}

async fn join<T>(task: JoinHandle<Result<T, AttachmentError>>) -> Result<T, AttachmentError> {
    match task.await {
        Ok(result) => result,
        Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
        Err(_) => Err(AttachmentError::Cancelled),
    }
}
