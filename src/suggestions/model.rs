//! Suggestion data model — proactive, prioritized, optionally time-limited
//! messages offered outside direct Q&A.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// What produced a suggestion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerKind {
    /// One-shot `schedule_once` timer.
    Scheduled,
    /// Recurring time-of-day generation.
    TimeOfDay,
    /// Behavior-model prediction.
    Predictive,
    /// A registered data-trigger predicate fired.
    DataCondition,
}

/// Suggestion priority.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    High,
    Medium,
    Low,
}

/// Typed action payload attached to a suggestion, discriminated by kind.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SuggestionPayload {
    /// Open another context tab.
    OpenContext { context: String },
    /// Pre-fill the search box.
    PrefillSearch { query: String },
    /// Jump to the budget breakdown.
    ViewBudget,
    /// Propose a destination, optionally tied to a tracked interest.
    SuggestDestination {
        destination: String,
        #[serde(skip_serializing_if = "Option::is_none")]
        interest: Option<String>,
    },
}

/// A proactive suggestion in the active set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SmartSuggestion {
    pub id: Uuid,
    pub message: String,
    pub trigger: TriggerKind,
    pub priority: Priority,
    /// Context the suggestion was generated in.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
    /// Lazy expiry deadline; expired suggestions are filtered from the
    /// active set but not eagerly deleted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    /// Context tab the suggestion should take the user to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_target: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<SuggestionPayload>,
    pub created_at: DateTime<Utc>,
}

impl SmartSuggestion {
    pub fn new(message: impl Into<String>, trigger: TriggerKind, priority: Priority) -> Self {
        Self {
            id: Uuid::new_v4(),
            message: message.into(),
            trigger,
            priority,
            context: None,
            expires_at: None,
            context_target: None,
            payload: None,
            created_at: Utc::now(),
        }
    }

    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context = Some(context.into());
        self
    }

    pub fn with_expiry(mut self, expires_at: DateTime<Utc>) -> Self {
        self.expires_at = Some(expires_at);
        self
    }

    pub fn with_context_target(mut self, target: impl Into<String>) -> Self {
        self.context_target = Some(target.into());
        self
    }

    pub fn with_payload(mut self, payload: SuggestionPayload) -> Self {
        self.payload = Some(payload);
        self
    }

    /// Whether the suggestion is expired at `now`. Suggestions without an
    /// `expires_at` never expire.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|at| at <= now)
    }
}
