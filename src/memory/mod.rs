//! Conversational memory — the per-user record and its persistence façade.

pub mod model;
pub mod store;

pub use model::ConversationMemory;
pub use store::MemoryStore;
