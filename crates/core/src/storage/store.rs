//! Remote asset store seam.

use std::future::Future;

use bytes::Bytes;

use super::error::StorageError;
use crate::attachment::AttachmentDescriptor;

/// Remote object store holding uploaded images.
///
/// Implemented by [`super::StorageService`]; the synchronizer only depends on
/// this trait. Implementations never retry on their own.
pub trait AssetStore: Send + Sync {
    /// Store `bytes` as a new object and describe where it lives.
    fn upload(
        &self,
        bytes: Bytes,
        mime_hint: &str,
    ) -> impl Future<Output = Result<AttachmentDescriptor, StorageError>> + Send;

    /// Remove the object.
    ///
    /// Fails with [`StorageError::NotFound`] when the object is already gone.
    fn delete(&self, remote_id: &str) -> impl Future<Output = Result<(), StorageError>> + Send;

    /// Check whether the object exists.
    fn exists(&self, remote_id: &str) -> impl Future<Output = Result<bool, StorageError>> + Send;
}
