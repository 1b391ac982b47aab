//! Memory store façade — load/merge/save over the document store.
//!
//! A missing record is the documented default, never an error. When the
//! backing store is unreachable the engine keeps working on an in-memory
//! default for that call; the failure is logged and never surfaces in the
//! conversational reply.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, warn};

use crate::memory::ConversationMemory;
use crate::store::DocumentStore;

/// Read/merge/write façade over the document store.
pub struct MemoryStore {
    store: Arc<dyn DocumentStore>,
}

impl MemoryStore {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    fn key(user_id: &str) -> String {
        format!("memory:{user_id}")
    }

    /// Load a user's memory, creating and persisting a default record on
    /// first contact. Store failures degrade to an unpersisted default.
    pub async fn load(&self, user_id: &str) -> ConversationMemory {
        let key = Self::key(user_id);
        match self.store.get(&key).await {
            Ok(Some(doc)) => match serde_json::from_value(doc) {
                Ok(memory) => memory,
                Err(e) => {
                    warn!(user_id, error = %e, "Unreadable memory record — using default");
                    ConversationMemory::default()
                }
            },
            Ok(None) => {
                let memory = ConversationMemory::default();
                debug!(user_id, "First contact — persisting default memory");
                self.save(user_id, &memory).await;
                memory
            }
            Err(e) => {
                warn!(user_id, error = %e, "Memory store unavailable — degrading to default");
                ConversationMemory::default()
            }
        }
    }

    /// Persist a user's memory. Best effort — returns whether the write
    /// succeeded.
    pub async fn save(&self, user_id: &str, memory: &ConversationMemory) -> bool {
        let key = Self::key(user_id);
        let doc = match serde_json::to_value(memory) {
            Ok(v) => v,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to serialize memory");
                return false;
            }
        };
        match self.store.set(&key, &doc).await {
            Ok(()) => true,
            Err(e) => {
                warn!(user_id, error = %e, "Failed to persist memory");
                false
            }
        }
    }

    /// Update only the active context, merging into the stored record
    /// (load-or-create) rather than overwriting it.
    pub async fn patch_active_context(&self, user_id: &str, context_tag: &str) {
        let key = Self::key(user_id);
        let partial = json!({ "active_context": context_tag });
        if let Err(e) = self.store.update(&key, &partial).await {
            warn!(user_id, context_tag, error = %e, "Failed to patch active context");
        }
    }
}
