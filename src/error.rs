//! Error types for the travel assistant core.
//!
//! Failures in peripheral subsystems (persistence, scheduling) are swallowed
//! at the boundary — public entry points log a warning and degrade rather
//! than surface these to the conversational reply.

use uuid::Uuid;

/// Top-level error type for the engine.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Flow error: {0}")]
    Flow(#[from] FlowError),

    #[error("Schedule error: {0}")]
    Schedule(#[from] ScheduleError),
}

/// Document store / persistence errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for StoreError {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization(e.to_string())
    }
}

/// Flow registry and step engine errors.
///
/// These are not-found conditions — call sites treat them as no-ops that
/// return the unchanged state.
#[derive(Debug, thiserror::Error)]
pub enum FlowError {
    #[error("Flow {id} not found")]
    FlowNotFound { id: String },

    #[error("Step {step_id} does not belong to flow {flow_id}")]
    StepNotFound { flow_id: String, step_id: String },

    #[error("Flow {id} has no steps")]
    EmptyFlow { id: String },
}

/// Suggestion scheduling errors.
#[derive(Debug, thiserror::Error)]
pub enum ScheduleError {
    #[error("Scheduled time is in the past")]
    PastDeadline,

    #[error("Suggestion {id} not found")]
    SuggestionNotFound { id: Uuid },

    #[error("Timer registration failed: {0}")]
    TimerUnavailable(String),
}

/// Result type alias for the engine.
pub type Result<T> = std::result::Result<T, Error>;
