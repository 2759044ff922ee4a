//! Test doubles for the attachment pipeline.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bazaar_shared::UserId;
use bytes::Bytes;
use uuid::Uuid;

use super::error::AttachmentError;
use super::repository::AttachmentRecordRepository;
use super::types::{
    AttachmentDescriptor, AttachmentSet, EntityKind, EntitySnapshot, RemovedRecord,
};
use crate::storage::{AssetStore, StorageConfig, StorageError, StorageProvider, StorageService};

/// Observable side effect, in the order it happened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Event {
    Uploaded(String),
    Deleted(String),
    Committed(Uuid),
}

/// Shared log of side effects across the store and the records.
#[derive(Debug, Clone, Default)]
pub(crate) struct Journal(Arc<Mutex<Vec<Event>>>);

impl Journal {
    fn push(&self, event: Event) {
        self.0.lock().unwrap().push(event);
    }

    pub(crate) fn events(&self) -> Vec<Event> {
        self.0.lock().unwrap().clone()
    }

    pub(crate) fn uploaded(&self) -> Vec<String> {
        self.events()
            .into_iter()
            .filter_map(|e| match e {
                Event::Uploaded(key) => Some(key),
                _ => None,
            })
            .collect()
    }

    pub(crate) fn clear(&self) {
        self.0.lock().unwrap().clear();
    }
}

/// In-memory OpenDAL store that fails uploads whose bytes start with `FAIL`.
pub(crate) struct FlakyStore {
    inner: StorageService,
    journal: Journal,
    fail_deletes: AtomicBool,
    upload_delay_ms: AtomicU64,
}

impl FlakyStore {
    pub(crate) fn new(journal: Journal) -> Self {
        let config = StorageConfig::new(StorageProvider::Memory, "https://cdn.example.com");
        Self {
            inner: StorageService::from_config(config).unwrap(),
            journal,
            fail_deletes: AtomicBool::new(false),
            upload_delay_ms: AtomicU64::new(0),
        }
    }

    /// Store an object directly, bypassing the journal.
    pub(crate) async fn put(&self, bytes: &'static [u8]) -> AttachmentDescriptor {
        self.inner
            .upload(Bytes::from_static(bytes), "image/png")
            .await
            .unwrap()
    }

    pub(crate) async fn contains(&self, remote_id: &str) -> bool {
        self.inner.exists(remote_id).await.unwrap()
    }

    pub(crate) fn fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_upload_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap();
        self.upload_delay_ms.store(millis, Ordering::SeqCst);
    }
}

impl AssetStore for FlakyStore {
    async fn upload(
        &self,
        bytes: Bytes,
        mime_hint: &str,
    ) -> Result<AttachmentDescriptor, StorageError> {
        let delay = self.upload_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        if bytes.starts_with(b"FAIL") {
            return Err(StorageError::operation("injected upload failure"));
        }

        let descriptor = self.inner.upload(bytes, mime_hint).await?;
        self.journal
            .push(Event::Uploaded(descriptor.remote_id().to_string()));
        Ok(descriptor)
    }

    async fn delete(&self, remote_id: &str) -> Result<(), StorageError> {
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(StorageError::operation("injected delete failure"));
        }
        self.inner.delete(remote_id).await?;
        self.journal.push(Event::Deleted(remote_id.to_string()));
        Ok(())
    }

    async fn exists(&self, remote_id: &str) -> Result<bool, StorageError> {
        self.inner.exists(remote_id).await
    }
}

struct Record {
    kind: EntityKind,
    owner: UserId,
    attachments: AttachmentSet,
}

/// Record repository over a mutex-guarded map.
pub(crate) struct InMemoryRecords {
    records: Mutex<HashMap<Uuid, Record>>,
    fail_writes: AtomicBool,
    delete_delay_ms: AtomicU64,
    journal: Journal,
}

impl InMemoryRecords {
    pub(crate) fn new(journal: Journal) -> Self {
        Self {
            records: Mutex::new(HashMap::new()),
            fail_writes: AtomicBool::new(false),
            delete_delay_ms: AtomicU64::new(0),
            journal,
        }
    }

    pub(crate) fn insert(&self, kind: EntityKind, id: Uuid, owner: UserId, attachments: AttachmentSet) {
        self.records.lock().unwrap().insert(
            id,
            Record {
                kind,
                owner,
                attachments,
            },
        );
    }

    pub(crate) fn attachments(&self, id: Uuid) -> Option<AttachmentSet> {
        self.records
            .lock()
            .unwrap()
            .get(&id)
            .map(|r| r.attachments.clone())
    }

    pub(crate) fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Stall `delete_record` before it takes the lock.
    pub(crate) fn set_delete_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap();
        self.delete_delay_ms.store(millis, Ordering::SeqCst);
    }
}

impl AttachmentRecordRepository for InMemoryRecords {
    async fn snapshot(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<Option<EntitySnapshot>, AttachmentError> {
        Ok(self
            .records
            .lock()
            .unwrap()
            .get(&id)
            .filter(|r| r.kind == kind)
            .map(|r| EntitySnapshot {
                owner_id: r.owner,
                attachments: r.attachments.clone(),
            }))
    }

    async fn replace_attachments(
        &self,
        kind: EntityKind,
        id: Uuid,
        attachments: AttachmentSet,
        requester: UserId,
    ) -> Result<AttachmentSet, AttachmentError> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AttachmentError::persistence("injected write failure"));
        }

        let mut records = self.records.lock().unwrap();
        let record = records
            .get_mut(&id)
            .filter(|r| r.kind == kind)
            .ok_or_else(|| AttachmentError::not_found(kind, id))?;
        if record.owner != requester {
            return Err(AttachmentError::forbidden(kind, id, requester));
        }

        let previous = std::mem::replace(&mut record.attachments, attachments);
        self.journal.push(Event::Committed(id));
        Ok(previous)
    }

    async fn delete_record(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<Option<RemovedRecord>, AttachmentError> {
        let delay = self.delete_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }

        let mut records = self.records.lock().unwrap();
        if !records.get(&id).is_some_and(|r| r.kind == kind) {
            return Ok(None);
        }
        let record = records.remove(&id).unwrap();

        let mut cascaded = Vec::new();
        if kind == EntityKind::User {
            let owned: Vec<Uuid> = records
                .iter()
                .filter(|(_, r)| r.kind == EntityKind::Post && r.owner == record.owner)
                .map(|(post_id, _)| *post_id)
                .collect();
            for post_id in owned {
                cascaded.push(records.remove(&post_id).unwrap().attachments);
            }
        }

        Ok(Some(RemovedRecord {
            attachments: record.attachments,
            cascaded,
        }))
    }
}
