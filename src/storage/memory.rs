//! In-Memory Document Storage
//!
//! Information Hiding:
//! - HashMap storage structure hidden from users
//! - Thread-safe access via a single async Mutex hidden behind the backend interface
//! - Suitable for testing and ephemeral deployments

use super::{DocumentBackend, Lookup, RawMutator, StorageKey};
use crate::error::Result;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::Mutex;

/// In-memory storage using HashMap
/// Data is lost when process terminates
pub struct InMemoryBackend {
    documents: Arc<Mutex<HashMap<StorageKey, Value>>>,
}

impl InMemoryBackend {
    pub fn new() -> Self {
        Self {
            documents: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Place a document without validation, e.g. to simulate legacy data
    pub async fn insert_raw(&self, key: &StorageKey, document: Value) {
        self.documents.lock().await.insert(key.clone(), document);
    }
}

impl Default for InMemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentBackend for InMemoryBackend {
    async fn load(&self, key: &StorageKey) -> Result<Lookup<Value>> {
        let documents = self.documents.lock().await;
        let document = documents.get(key).cloned();
        tracing::debug!(
            "[InMemoryBackend] Loaded '{}' ({})",
            key,
            if document.is_some() { "found" } else { "absent" }
        );
        Ok(document.into())
    }

    async fn update(&self, key: &StorageKey, mutator: RawMutator) -> Result<()> {
        // Holding the map lock for the whole update serializes every key,
        // which is stricter than the per-key ordering callers rely on.
        let mut documents = self.documents.lock().await;
        let next = mutator(documents.get(key).cloned())?;
        documents.insert(key.clone(), next);
        tracing::debug!("[InMemoryBackend] Committed '{}'", key);
        Ok(())
    }

    async fn remove(&self, key: &StorageKey) -> Result<bool> {
        let removed = self.documents.lock().await.remove(key).is_some();
        tracing::debug!("[InMemoryBackend] Deleted '{}': {}", key, removed);
        Ok(removed)
    }

    async fn keys(&self) -> Result<Vec<StorageKey>> {
        let mut keys: Vec<StorageKey> = self.documents.lock().await.keys().cloned().collect();
        keys.sort();
        Ok(keys)
    }

    fn location(&self, key: &StorageKey) -> PathBuf {
        PathBuf::from("memory").join(key.file_name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use serde_json::json;

    #[tokio::test]
    async fn test_update_and_load() {
        let backend = InMemoryBackend::new();
        let key = StorageKey::sanitize("doc").unwrap();

        backend
            .update(&key, Box::new(|current: Option<Value>| -> Result<Value> {
                assert!(current.is_none());
                Ok(json!({"a": 1}))
            }))
            .await
            .unwrap();

        assert_eq!(backend.load(&key).await.unwrap(), Lookup::Found(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_failed_update_leaves_document() {
        let backend = InMemoryBackend::new();
        let key = StorageKey::sanitize("doc").unwrap();
        backend.insert_raw(&key, json!({"a": 1})).await;

        let result = backend
            .update(&key, Box::new(|_: Option<Value>| -> Result<Value> { Err(Error::invalid("a", "nope")) }))
            .await;
        assert!(result.is_err());
        assert_eq!(backend.load(&key).await.unwrap(), Lookup::Found(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_remove_and_keys() {
        let backend = InMemoryBackend::new();
        let a = StorageKey::sanitize("a").unwrap();
        let b = StorageKey::sanitize("b").unwrap();
        backend.insert_raw(&b, json!({})).await;
        backend.insert_raw(&a, json!({})).await;

        assert_eq!(backend.keys().await.unwrap(), vec![a.clone(), b.clone()]);
        assert!(backend.remove(&a).await.unwrap());
        assert!(!backend.remove(&a).await.unwrap());
        assert_eq!(backend.keys().await.unwrap(), vec![b]);
    }
}
