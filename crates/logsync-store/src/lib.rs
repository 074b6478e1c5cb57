//! Object store adapter.
//!
//! `ObjectStore` is the seam between the sync engine / reader in
//! `logsync-db` and wherever chunk bytes actually live. The production
//! backend (`FsObjectStore`) lays objects out under a data directory
//! keyed by their literal structural key (see `logsync_core::chunk`);
//! `InMemoryObjectStore` is a test double with the same semantics for
//! fast, no-filesystem integration tests.

mod error;
mod fs;
mod memory;

pub use error::ObjectStoreError;
pub use fs::FsObjectStore;
pub use memory::InMemoryObjectStore;

use async_trait::async_trait;

/// A stored object's key together with its byte length, as returned by
/// `list_objects`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMeta {
    pub key: String,
    pub size: u64,
}

/// Content-agnostic object storage, keyed by an opaque string key.
///
/// Implementations must make `put_object` durable before returning `Ok`,
/// and `list_objects` must return keys in lexicographic order (the chunk
/// key format in `logsync_core::chunk` relies on this for the reader's
/// merge-on-read to see chunks in `first_line` order).
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), ObjectStoreError>;

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError>;

    /// List every object whose key starts with `prefix`, lexicographically sorted.
    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectMeta>, ObjectStoreError>;

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError>;

    /// Delete every object under `prefix`. Used when a session is deleted
    /// to reclaim every chunk across every file at once.
    async fn delete_prefix(&self, prefix: &str) -> Result<(), ObjectStoreError>;
}

#[async_trait]
impl<T: ObjectStore + ?Sized> ObjectStore for std::sync::Arc<T> {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), ObjectStoreError> {
        (**self).put_object(key, data).await
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        (**self).get_object(key).await
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectMeta>, ObjectStoreError> {
        (**self).list_objects(prefix).await
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        (**self).delete_object(key).await
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), ObjectStoreError> {
        (**self).delete_prefix(prefix).await
    }
}
