//! `DocumentStore` trait — backend-agnostic async interface over a keyed
//! JSON document store.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::StoreError;

/// Backend-agnostic document store.
///
/// Keys are opaque strings scoped by the caller (e.g. `memory:{user_id}`).
/// A missing document is `Ok(None)`, never an error.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a document by key.
    async fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;

    /// Write (or replace) a document.
    async fn set(&self, key: &str, doc: &Value) -> Result<(), StoreError>;

    /// Shallow-merge `partial` into the document at `key`, creating the
    /// document if it does not exist. Top-level fields of `partial` overwrite
    /// the stored fields; everything else is preserved.
    async fn update(&self, key: &str, partial: &Value) -> Result<(), StoreError>;
}

/// Shallow-merge helper shared by backends.
pub(crate) fn merge_shallow(base: &mut Value, partial: &Value) {
    match (base, partial) {
        (Value::Object(base_map), Value::Object(partial_map)) => {
            for (k, v) in partial_map {
                base_map.insert(k.clone(), v.clone());
            }
        }
        (base, partial) => *base = partial.clone(),
    }
}
