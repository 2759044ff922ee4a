//! Remote asset store for uploaded images using Apache OpenDAL.
//!
//! This module provides vendor-agnostic object storage with support for:
//! - S3-compatible: Cloudflare R2, Supabase Storage, AWS S3, DigitalOcean Spaces
//! - Azure Blob Storage
//! - Local filesystem (development only)
//! - In-process memory (tests only)
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                      AttachmentSynchronizer                     │
//! ├─────────────────────────────────────────────────────────────────┤
//! │                 AssetStore (upload / delete / exists)           │
//! ├─────────────────────────────────────────────────────────────────┤
//! │ StorageService: op.write_with(key, bytes)  │ op.stat(key)       │
//! │                 op.delete(key)             │ bounded by timeout │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod config;
mod error;
mod service;
mod store;

pub use config::{StorageConfig, StorageProvider};
pub use error::StorageError;
pub use service::StorageService;
pub use store::AssetStore;
