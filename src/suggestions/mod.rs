//! Proactive suggestions — data model and scheduler.

pub mod model;
pub mod scheduler;

pub use model::{Priority, SmartSuggestion, SuggestionPayload, TriggerKind};
pub use scheduler::{SuggestionScheduler, TriggerPredicate};
