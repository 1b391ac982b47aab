//! In-memory document store — for tests and store-less development runs.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::store::traits::{DocumentStore, merge_shallow};

/// HashMap-backed document store.
#[derive(Default)]
pub struct InMemoryStore {
    docs: RwLock<HashMap<String, Value>>,
    /// When set, every operation fails — used to exercise degraded mode.
    fail: AtomicBool,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Toggle simulated unavailability.
    pub fn set_unavailable(&self, unavailable: bool) {
        self.fail.store(unavailable, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), StoreError> {
        if self.fail.load(Ordering::SeqCst) {
            Err(StoreError::Query("store unavailable".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        self.check_available()?;
        Ok(self.docs.read().await.get(key).cloned())
    }

    async fn set(&self, key: &str, doc: &Value) -> Result<(), StoreError> {
        self.check_available()?;
        self.docs.write().await.insert(key.to_string(), doc.clone());
        Ok(())
    }

    async fn update(&self, key: &str, partial: &Value) -> Result<(), StoreError> {
        self.check_available()?;
        let mut docs = self.docs.write().await;
        let doc = docs
            .entry(key.to_string())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        merge_shallow(doc, partial);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn roundtrip_and_merge() {
        let store = InMemoryStore::new();
        store.set("k", &json!({"a": 1})).await.unwrap();
        store.update("k", &json!({"b": 2})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap(), json!({"a": 1, "b": 2}));
    }

    #[tokio::test]
    async fn unavailable_store_errors() {
        let store = InMemoryStore::new();
        store.set_unavailable(true);
        assert!(store.get("k").await.is_err());
        assert!(store.set("k", &json!({})).await.is_err());

        store.set_unavailable(false);
        assert!(store.get("k").await.unwrap().is_none());
    }
}
