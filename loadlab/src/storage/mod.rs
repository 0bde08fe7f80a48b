//! Object store abstraction layer
//!
//! This module defines the `ObjectStore` trait, the single "put object" operation uploads are
//! forwarded to, along with the key layout used for uploaded files.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;

use crate::config::{StorageBackend, StorageConfig};

pub mod in_memory;
pub mod s3;

pub use in_memory::InMemoryObjectStore;
pub use s3::S3ObjectStore;

/// Prefix every uploaded object is stored under
pub const UPLOAD_PREFIX: &str = "uploads/";

/// Create an object store from configuration
///
/// This is the single point where we convert config into store instances.
pub async fn create_store(config: &StorageConfig) -> Arc<dyn ObjectStore> {
    match config.backend {
        StorageBackend::S3 => Arc::new(S3ObjectStore::from_config(config).await),
        StorageBackend::Memory => Arc::new(InMemoryObjectStore::new()),
    }
}

/// Derive the key an upload is stored under: `uploads/{unix_millis}-{original_name}`.
///
/// Two uploads of the same name within the same millisecond map to the same key; the later put
/// wins.
pub fn object_key(timestamp_millis: i64, original_name: &str) -> String {
    format!("{UPLOAD_PREFIX}{timestamp_millis}-{original_name}")
}

/// Result type for object store operations
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur while storing an object
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// The store answered, but refused the request (permissions, missing bucket, ...)
    #[error("Object store API error: {0}")]
    Api(String),

    /// The store could not be reached
    #[error("Object store unavailable: {0}")]
    Unavailable(String),
}

/// A single object to write
#[derive(Debug, Clone)]
pub struct PutObject {
    pub bucket: String,
    pub key: String,
    pub body: Bytes,
    pub content_type: String,
}

/// Abstract blob store interface
///
/// One attempt per call: implementors must not retry, and must not clean up partial writes.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    /// Store `object.body` under `object.bucket` / `object.key`, replacing any existing object.
    async fn put_object(&self, object: PutObject) -> Result<()>;
}
