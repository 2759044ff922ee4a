//! Shared types, errors, and configuration for Bazaar.
//!
//! This crate provides common types used across all other crates:
//! - Typed IDs for type-safe entity references
//! - Application-wide error types
//! - Configuration management

pub mod config;
pub mod error;
pub mod types;

pub use config::{
    AppConfig, AttachmentSettings, BufferMode, DatabaseConfig, ServerConfig, StorageProvider,
    StorageSettings,
};
pub use error::{AppError, AppResult};
pub use types::{PostId, UserId};
