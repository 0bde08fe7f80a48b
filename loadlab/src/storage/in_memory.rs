//! In-memory object store
//!
//! Keeps every object in a process-local map. Useful for running the demo without AWS
//! credentials and for tests; a failing store can be built to simulate an outage.

use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use dashmap::DashMap;

use super::{ObjectStore, PutObject, Result, StorageError};

/// An object as the store holds it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredObject {
    pub body: Bytes,
    pub content_type: String,
}

#[derive(Debug, Default)]
pub struct InMemoryObjectStore {
    objects: DashMap<(String, String), StoredObject>,
    failure: Option<String>,
    puts: AtomicUsize,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// A store whose every put fails with `reason`
    pub fn failing(reason: impl Into<String>) -> Self {
        Self {
            failure: Some(reason.into()),
            ..Self::default()
        }
    }

    pub fn get(&self, bucket: &str, key: &str) -> Option<StoredObject> {
        self.objects
            .get(&(bucket.to_string(), key.to_string()))
            .map(|entry| entry.value().clone())
    }

    /// Keys of all stored objects in `bucket`, sorted
    pub fn keys(&self, bucket: &str) -> Vec<String> {
        let mut keys: Vec<String> = self
            .objects
            .iter()
            .filter(|entry| entry.key().0 == bucket)
            .map(|entry| entry.key().1.clone())
            .collect();
        keys.sort();
        keys
    }

    /// Number of put attempts received, successful or not
    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(&self, object: PutObject) -> Result<()> {
        self.puts.fetch_add(1, Ordering::SeqCst);

        if let Some(reason) = &self.failure {
            return Err(StorageError::Unavailable(reason.clone()));
        }

        tracing::debug!(bucket = %object.bucket, key = %object.key, bytes = object.body.len(), "Storing object in memory");

        self.objects.insert(
            (object.bucket, object.key),
            StoredObject {
                body: object.body,
                content_type: object.content_type,
            },
        );

        Ok(())
    }
}
