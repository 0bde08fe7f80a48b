//! HTTP request handlers for the demo endpoints.
//!
//! - [`metadata`]: instance placement lookup
//! - [`load`]: synthetic CPU load
//! - [`upload`]: multipart upload to the object store
//!
//! Handlers return [`crate::errors::Error`] which converts to the matching status code and a JSON
//! `{"error": ...}` body.

pub mod load;
pub mod metadata;
pub mod upload;
