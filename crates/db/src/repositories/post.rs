//! Post repository for database operations.

use rust_decimal::Decimal;
use sea_orm::{ActiveModelTrait, DatabaseConnection, DbErr, EntityTrait, Set};
use uuid::Uuid;

use crate::entities::posts;

/// Input for creating a post. Images are attached afterwards.
#[derive(Debug, Clone)]
pub struct CreatePostInput {
    /// Owning user.
    pub user_id: Uuid,
    /// Post body.
    pub content: String,
    /// Where the item is.
    pub location: String,
    /// Listing category.
    pub category: String,
    /// Asking price, if any.
    pub price: Option<Decimal>,
}

/// Post repository for CRUD operations.
#[derive(Debug, Clone)]
pub struct PostRepository {
    db: DatabaseConnection,
}

impl PostRepository {
    /// Creates a new post repository.
    #[must_use]
    pub const fn new(db: DatabaseConnection) -> Self {
        Self { db }
    }

    /// Creates a post with no images.
    ///
    /// # Errors
    ///
    /// Returns an error if the database insert fails.
    pub async fn create(&self, input: CreatePostInput) -> Result<posts::Model, DbErr> {
        let now = chrono::Utc::now().into();
        let post = posts::ActiveModel {
            id: Set(Uuid::now_v7()),
            user_id: Set(input.user_id),
            content: Set(input.content),
            location: Set(input.location),
            category: Set(input.category),
            price: Set(input.price),
            images: Set(serde_json::Value::Array(Vec::new())),
            created_at: Set(now),
            updated_at: Set(now),
        };

        post.insert(&self.db).await
    }

    /// Deletes a post row without touching its images.
    ///
    /// Used to roll back a post whose images never made it into the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the database delete fails.
    pub async fn delete(&self, id: Uuid) -> Result<bool, DbErr> {
        let result = posts::Entity::delete_by_id(id).exec(&self.db).await?;
        Ok(result.rows_affected > 0)
    }
}
