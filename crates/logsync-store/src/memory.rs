use std::collections::BTreeMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::{ObjectMeta, ObjectStore, ObjectStoreError};

/// In-memory test double for `ObjectStore`, keyed the same way as
/// `FsObjectStore` but backed by a sorted map instead of a directory tree.
/// `BTreeMap` gives the same lexicographic iteration order the reader
/// depends on for free.
#[derive(Default)]
pub struct InMemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
}

impl InMemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ObjectStore for InMemoryObjectStore {
    async fn put_object(&self, key: &str, data: Vec<u8>) -> Result<(), ObjectStoreError> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(key.to_string(), data);
        Ok(())
    }

    async fn get_object(&self, key: &str) -> Result<Vec<u8>, ObjectStoreError> {
        self.objects
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(key)
            .cloned()
            .ok_or_else(|| ObjectStoreError::NotFound(key.to_string()))
    }

    async fn list_objects(&self, prefix: &str) -> Result<Vec<ObjectMeta>, ObjectStoreError> {
        let objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        Ok(objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| ObjectMeta {
                key: k.clone(),
                size: v.len() as u64,
            })
            .collect())
    }

    async fn delete_object(&self, key: &str) -> Result<(), ObjectStoreError> {
        self.objects.lock().unwrap_or_else(|e| e.into_inner()).remove(key);
        Ok(())
    }

    async fn delete_prefix(&self, prefix: &str) -> Result<(), ObjectStoreError> {
        let mut objects = self.objects.lock().unwrap_or_else(|e| e.into_inner());
        let to_remove: Vec<String> = objects
            .range(prefix.to_string()..)
            .take_while(|(k, _)| k.starts_with(prefix))
            .map(|(k, _)| k.clone())
            .collect();
        for key in to_remove {
            objects.remove(&key);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn round_trips_and_lists_sorted() {
        let store = InMemoryObjectStore::new();
        store.put_object("f/2", b"b".to_vec()).await.unwrap();
        store.put_object("f/1", b"a".to_vec()).await.unwrap();
        let listed = store.list_objects("f/").await.unwrap();
        assert_eq!(listed[0].key, "f/1");
        assert_eq!(listed[1].key, "f/2");
    }

    #[tokio::test]
    async fn delete_prefix_clears_matching_keys_only() {
        let store = InMemoryObjectStore::new();
        store.put_object("a/1", b"x".to_vec()).await.unwrap();
        store.put_object("b/1", b"y".to_vec()).await.unwrap();
        store.delete_prefix("a/").await.unwrap();
        assert!(store.list_objects("a/").await.unwrap().is_empty());
        assert_eq!(store.list_objects("b/").await.unwrap().len(), 1);
    }
}
