//! Attachment record store: persists attachment sets on users and posts.
//!
//! Replacing a set reads, checks ownership and writes inside one transaction
//! holding a row lock (`SELECT ... FOR UPDATE`), so concurrent replaces of
//! the same record serialize and each one sees the set its predecessor wrote.
//! Deletes take the same lock, so the set a delete reports is the one the row
//! held when it went away.

use bazaar_core::attachment::{
    AttachmentDescriptor, AttachmentError, AttachmentRecordRepository, AttachmentSet, EntityKind,
    EntitySnapshot, RemovedRecord,
};
use bazaar_shared::UserId;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, DatabaseTransaction, DbErr, EntityTrait,
    QueryFilter, QuerySelect, Set, TransactionTrait,
};
use tracing::debug;
use uuid::Uuid;

use crate::entities::{posts, users};

/// Postgres implementation of [`AttachmentRecordRepository`].
#[derive(Debug, Clone)]
pub struct AttachmentRecordStore {
    db: DatabaseConnection,
}

impl AttachmentRecordStore {
    /// Create a new attachment record store.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    async fn replace_user_photo(
        txn: &DatabaseTransaction,
        id: Uuid,
        attachments: &AttachmentSet,
        requester: UserId,
    ) -> Result<AttachmentSet, AttachmentError> {
        let user = users::Entity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AttachmentError::not_found(EntityKind::User, id))?;

        if user.id != requester.into_inner() {
            return Err(AttachmentError::forbidden(EntityKind::User, id, requester));
        }

        let previous = user_photo(&user);
        let photo = attachments.descriptors().first();

        let mut active: users::ActiveModel = user.into();
        active.photo_remote_id = Set(photo.map(|d| d.remote_id().to_string()));
        active.photo_url = Set(photo.map(|d| d.url().to_string()));
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(txn).await.map_err(db_err)?;

        Ok(previous)
    }

    async fn replace_post_images(
        txn: &DatabaseTransaction,
        id: Uuid,
        attachments: &AttachmentSet,
        requester: UserId,
    ) -> Result<AttachmentSet, AttachmentError> {
        let post = posts::Entity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?
            .ok_or_else(|| AttachmentError::not_found(EntityKind::Post, id))?;

        if post.user_id != requester.into_inner() {
            return Err(AttachmentError::forbidden(EntityKind::Post, id, requester));
        }

        let previous = post_images(&post)?;
        let images = serde_json::to_value(attachments)
            .map_err(|e| AttachmentError::persistence(e.to_string()))?;

        let mut active: posts::ActiveModel = post.into();
        active.images = Set(images);
        active.updated_at = Set(chrono::Utc::now().into());
        active.update(txn).await.map_err(db_err)?;

        Ok(previous)
    }

    /// Delete a user and every post the user owns.
    ///
    /// The user row is locked first, which also blocks new posts from
    /// referencing it until the transaction ends.
    async fn delete_user(
        txn: &DatabaseTransaction,
        id: Uuid,
    ) -> Result<Option<RemovedRecord>, AttachmentError> {
        let Some(user) = users::Entity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let owned = posts::Entity::find()
            .filter(posts::Column::UserId.eq(id))
            .lock_exclusive()
            .all(txn)
            .await
            .map_err(db_err)?;
        let cascaded = owned
            .iter()
            .map(post_images)
            .collect::<Result<Vec<_>, _>>()?;

        posts::Entity::delete_many()
            .filter(posts::Column::UserId.eq(id))
            .exec(txn)
            .await
            .map_err(db_err)?;
        users::Entity::delete_by_id(id)
            .exec(txn)
            .await
            .map_err(db_err)?;

        Ok(Some(RemovedRecord {
            attachments: user_photo(&user),
            cascaded,
        }))
    }

    async fn delete_post(
        txn: &DatabaseTransaction,
        id: Uuid,
    ) -> Result<Option<RemovedRecord>, AttachmentError> {
        let Some(post) = posts::Entity::find_by_id(id)
            .lock_exclusive()
            .one(txn)
            .await
            .map_err(db_err)?
        else {
            return Ok(None);
        };

        let attachments = post_images(&post)?;
        posts::Entity::delete_by_id(id)
            .exec(txn)
            .await
            .map_err(db_err)?;

        Ok(Some(RemovedRecord {
            attachments,
            cascaded: Vec::new(),
        }))
    }
}

impl AttachmentRecordRepository for AttachmentRecordStore {
    async fn snapshot(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<Option<EntitySnapshot>, AttachmentError> {
        match kind {
            EntityKind::User => {
                let user = users::Entity::find_by_id(id)
                    .one(&self.db)
                    .await
                    .map_err(db_err)?;
                Ok(user.map(|u| EntitySnapshot {
                    owner_id: UserId::from_uuid(u.id),
                    attachments: user_photo(&u),
                }))
            }
            EntityKind::Post => {
                let Some(post) = posts::Entity::find_by_id(id)
                    .one(&self.db)
                    .await
                    .map_err(db_err)?
                else {
                    return Ok(None);
                };
                Ok(Some(EntitySnapshot {
                    owner_id: UserId::from_uuid(post.user_id),
                    attachments: post_images(&post)?,
                }))
            }
        }
    }

    async fn replace_attachments(
        &self,
        kind: EntityKind,
        id: Uuid,
        attachments: AttachmentSet,
        requester: UserId,
    ) -> Result<AttachmentSet, AttachmentError> {
        let attachments = AttachmentSet::for_kind(kind, attachments.into_descriptors())?;

        let txn = self.db.begin().await.map_err(db_err)?;
        let previous = match kind {
            EntityKind::User => {
                Self::replace_user_photo(&txn, id, &attachments, requester).await?
            }
            EntityKind::Post => {
                Self::replace_post_images(&txn, id, &attachments, requester).await?
            }
        };
        txn.commit().await.map_err(db_err)?;

        debug!(
            entity_kind = %kind,
            entity_id = %id,
            count = attachments.len(),
            "Attachment set written"
        );
        Ok(previous)
    }

    async fn delete_record(
        &self,
        kind: EntityKind,
        id: Uuid,
    ) -> Result<Option<RemovedRecord>, AttachmentError> {
        let txn = self.db.begin().await.map_err(db_err)?;
        let removed = match kind {
            EntityKind::User => Self::delete_user(&txn, id).await?,
            EntityKind::Post => Self::delete_post(&txn, id).await?,
        };
        txn.commit().await.map_err(db_err)?;

        if let Some(removed) = &removed {
            debug!(
                entity_kind = %kind,
                entity_id = %id,
                cascaded = removed.cascaded.len(),
                "Record deleted"
            );
        }
        Ok(removed)
    }
}

/// Attachment set of a user row. No stored photo means the default image.
#[must_use]
pub fn user_photo(user: &users::Model) -> AttachmentSet {
    match (&user.photo_remote_id, &user.photo_url) {
        (Some(remote_id), Some(url)) => AttachmentSet::for_kind(
            EntityKind::User,
            vec![AttachmentDescriptor::new(remote_id.clone(), url.clone())],
        )
        .unwrap_or_default(),
        _ => AttachmentSet::empty(),
    }
}

/// Attachment set of a post row.
///
/// # Errors
///
/// Returns `Persistence` if the stored JSON is malformed or oversized.
pub fn post_images(post: &posts::Model) -> Result<AttachmentSet, AttachmentError> {
    let descriptors: Vec<AttachmentDescriptor> = serde_json::from_value(post.images.clone())
        .map_err(|e| AttachmentError::persistence(format!("post {} images: {e}", post.id)))?;
    Ok(AttachmentSet::for_kind(EntityKind::Post, descriptors)?)
}

#[allow(clippy::needless_pass_by_value)]
fn db_err(err: DbErr) -> AttachmentError {
    AttachmentError::persistence(err.to_string())
}
