//! libSQL document store backend.
//!
//! Stores documents as JSON text in a single `documents` table. Supports
//! local file and in-memory databases via libsql's native async API.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{Connection, Database as LibSqlDatabase, params};
use serde_json::Value;
use tracing::info;

use crate::error::StoreError;
use crate::store::traits::{DocumentStore, merge_shallow};

/// libSQL document store.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlStore {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlStore {
    /// Open (or create) a local database file and initialize the schema.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create store directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        info!(path = %path.display(), "Document store opened");
        Ok(store)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;

        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let store = Self {
            db: Arc::new(db),
            conn,
        };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute(
                "CREATE TABLE IF NOT EXISTS documents (
                    key TEXT PRIMARY KEY,
                    doc TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                )",
                (),
            )
            .await
            .map_err(|e| StoreError::Query(format!("Failed to create documents table: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl DocumentStore for LibSqlStore {
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let mut rows = self
            .conn
            .query("SELECT doc FROM documents WHERE key = ?1", params![key])
            .await
            .map_err(|e| StoreError::Query(format!("get {key}: {e}")))?;

        let row = rows
            .next()
            .await
            .map_err(|e| StoreError::Query(format!("get {key}: {e}")))?;

        match row {
            Some(row) => {
                let doc: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("get {key}: {e}")))?;
                let value = serde_json::from_str(&doc)?;
                Ok(Some(value))
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, doc: &Value) -> Result<(), StoreError> {
        let text = serde_json::to_string(doc)?;
        self.conn
            .execute(
                "INSERT INTO documents (key, doc, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET
                   doc = excluded.doc,
                   updated_at = excluded.updated_at",
                params![key, text, Utc::now().to_rfc3339()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("set {key}: {e}")))?;
        Ok(())
    }

    async fn update(&self, key: &str, partial: &Value) -> Result<(), StoreError> {
        let mut doc = self
            .get(key)
            .await?
            .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
        merge_shallow(&mut doc, partial);
        self.set(key, &doc).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn get_missing_returns_none() {
        let store = LibSqlStore::new_memory().await.unwrap();
        assert!(store.get("memory:nobody").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn set_then_get_roundtrip() {
        let store = LibSqlStore::new_memory().await.unwrap();
        let doc = json!({"active_context": "itinerary", "flow_history": ["plan-trip"]});
        store.set("memory:u1", &doc).await.unwrap();

        let loaded = store.get("memory:u1").await.unwrap().unwrap();
        assert_eq!(loaded, doc);
    }

    #[tokio::test]
    async fn set_replaces_existing_document() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.set("k", &json!({"a": 1})).await.unwrap();
        store.set("k", &json!({"b": 2})).await.unwrap();

        assert_eq!(store.get("k").await.unwrap().unwrap(), json!({"b": 2}));
    }

    #[tokio::test]
    async fn update_merges_into_existing() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store
            .set("memory:u1", &json!({"active_context": "dashboard", "scratch": {}}))
            .await
            .unwrap();
        store
            .update("memory:u1", &json!({"active_context": "budget"}))
            .await
            .unwrap();

        let loaded = store.get("memory:u1").await.unwrap().unwrap();
        assert_eq!(loaded["active_context"], "budget");
        assert!(loaded["scratch"].is_object());
    }

    #[tokio::test]
    async fn update_creates_missing_document() {
        let store = LibSqlStore::new_memory().await.unwrap();
        store.update("k", &json!({"a": 1})).await.unwrap();
        assert_eq!(store.get("k").await.unwrap().unwrap(), json!({"a": 1}));
    }

    #[tokio::test]
    async fn local_file_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("assist.db");

        {
            let store = LibSqlStore::new_local(&path).await.unwrap();
            store.set("memory:u1", &json!({"x": 1})).await.unwrap();
        }

        let store = LibSqlStore::new_local(&path).await.unwrap();
        assert_eq!(
            store.get("memory:u1").await.unwrap().unwrap(),
            json!({"x": 1})
        );
    }
}
