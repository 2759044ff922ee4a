//! Attachment lifecycle logic for Bazaar.
//!
//! This crate moves uploaded images from an inbound request, through a remote
//! object store, into a user's or post's persisted record, and reverses that
//! on replacement or deletion. It has ZERO web or database dependencies; the
//! record store is reached through [`attachment::AttachmentRecordRepository`].
//!
//! # Modules
//!
//! - `storage` - Remote asset store client (OpenDAL)
//! - `attachment` - Intake, transient buffering and the synchronizer

pub mod attachment;
pub mod storage;
