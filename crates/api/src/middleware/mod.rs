//! Request middleware and extractors.

pub mod requester;

pub use requester::{REQUESTER_HEADER, RequesterId};
