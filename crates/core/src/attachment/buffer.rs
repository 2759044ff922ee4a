//! Request-scoped buffer for validated uploads, and its janitor.
//!
//! Bytes wait here between intake and the remote commit. Every handle is
//! released exactly once: explicitly through [`TransientBuffer::release`] or
//! [`TransientBuffer::release_all`], or by `Drop` if the operation unwinds.

use std::collections::HashMap;
use std::io;
use std::path::PathBuf;

use bazaar_shared::BufferMode;
use bytes::Bytes;
use tracing::{debug, warn};
use uuid::Uuid;

use super::error::AttachmentError;
use super::types::PendingUpload;

/// Opaque reference to one buffered file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BufferHandle(u64);

#[derive(Debug)]
enum Slot {
    Memory(Bytes),
    Disk(PathBuf),
}

/// Transient holding area for one request's uploads.
#[derive(Debug)]
pub struct TransientBuffer {
    mode: BufferMode,
    slots: HashMap<BufferHandle, Slot>,
    next: u64,
    acquired: usize,
    released: usize,
}

impl TransientBuffer {
    /// Create an empty buffer.
    #[must_use]
    pub fn new(mode: BufferMode) -> Self {
        Self {
            mode,
            slots: HashMap::new(),
            next: 0,
            acquired: 0,
            released: 0,
        }
    }

    /// Buffer a validated upload.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::Buffer`] if the scratch file cannot be written.
    pub async fn store(&mut self, upload: PendingUpload) -> Result<BufferHandle, AttachmentError> {
        let slot = match &self.mode {
            BufferMode::Memory => Slot::Memory(upload.bytes),
            BufferMode::ScratchDir { path } => {
                tokio::fs::create_dir_all(path).await?;
                let file = path.join(format!("{}.upload", Uuid::new_v4()));
                tokio::fs::write(&file, &upload.bytes).await?;
                Slot::Disk(file)
            }
        };

        let handle = BufferHandle(self.next);
        self.next += 1;
        self.acquired += 1;
        self.slots.insert(handle, slot);
        Ok(handle)
    }

    /// Read back buffered bytes.
    ///
    /// # Errors
    ///
    /// Returns [`AttachmentError::Buffer`] for a released handle or an unreadable scratch file.
    pub async fn read(&self, handle: BufferHandle) -> Result<Bytes, AttachmentError> {
        match self.slots.get(&handle) {
            Some(Slot::Memory(bytes)) => Ok(bytes.clone()),
            Some(Slot::Disk(file)) => Ok(Bytes::from(tokio::fs::read(file).await?)),
            None => Err(AttachmentError::Buffer(io::Error::new(
                io::ErrorKind::NotFound,
                "buffer handle already released",
            ))),
        }
    }

    /// Release one handle. Releasing twice is a no-op.
    pub async fn release(&mut self, handle: BufferHandle) {
        let Some(slot) = self.slots.remove(&handle) else {
            return;
        };
        self.released += 1;

        if let Slot::Disk(file) = slot {
            match tokio::fs::remove_file(&file).await {
                Ok(()) => debug!(path = %file.display(), "Scratch file removed"),
                Err(e) if e.kind() == io::ErrorKind::NotFound => {}
                Err(e) => warn!(path = %file.display(), error = %e, "Failed to remove scratch file"),
            }
        }
    }

    /// Release every outstanding handle.
    pub async fn release_all(&mut self) {
        let handles: Vec<BufferHandle> = self.slots.keys().copied().collect();
        for handle in handles {
            self.release(handle).await;
        }
    }

    /// Handles handed out so far.
    #[must_use]
    pub const fn acquired(&self) -> usize {
        self.acquired
    }

    /// Handles released so far.
    #[must_use]
    pub const fn released(&self) -> usize {
        self.released
    }

    /// Handles not yet released.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.slots.len()
    }
}

impl Drop for TransientBuffer {
    fn drop(&mut self) {
        for (_, slot) in self.slots.drain() {
            if let Slot::Disk(file) = slot
                && let Err(e) = std::fs::remove_file(&file)
                && e.kind() != io::ErrorKind::NotFound
            {
                warn!(path = %file.display(), error = %e, "Failed to remove scratch file on drop");
            }
        }
    }
}
