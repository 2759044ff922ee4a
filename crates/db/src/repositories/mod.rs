//! Repository abstractions for data access.
//!
//! Repositories provide a clean interface for database operations,
//! hiding the `SeaORM` implementation details from the rest of the application.

pub mod attachment_record;
pub mod post;
pub mod user;

pub use attachment_record::{AttachmentRecordStore, post_images, user_photo};
pub use post::{CreatePostInput, PostRepository};
pub use user::UserRepository;
