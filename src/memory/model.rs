//! `ConversationMemory` — per-user conversational state persisted across
//! sessions.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::flows::registry::FlowRegistry;
use crate::stages::{ConversationStage, TravelProfile};

/// Per-user conversation memory record.
///
/// Invariant: `active_flow_id` is set iff `current_step_id` is set, and the
/// step must belong to the named flow. [`ConversationMemory::reconcile`]
/// enforces this.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationMemory {
    /// Which application context (tab) the user is in.
    pub active_context: String,
    /// Currently active flow, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_flow_id: Option<String>,
    /// Current step within the active flow.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub current_step_id: Option<String>,
    /// Recorded answers keyed by step id.
    #[serde(default)]
    pub flow_responses: BTreeMap<String, String>,
    /// Completed flow ids, appended idempotently.
    #[serde(default)]
    pub flow_history: Vec<String>,
    /// Current profile-interview stage.
    #[serde(default)]
    pub interview_stage: ConversationStage,
    /// Profile collected by the interview so far.
    #[serde(default)]
    pub profile: TravelProfile,
    /// Context-local scratch values.
    #[serde(default)]
    pub scratch: BTreeMap<String, serde_json::Value>,
}

impl ConversationMemory {
    /// Fresh default record for a user first seen in `context`.
    pub fn new(context: impl Into<String>) -> Self {
        Self {
            active_context: context.into(),
            active_flow_id: None,
            current_step_id: None,
            flow_responses: BTreeMap::new(),
            flow_history: Vec::new(),
            interview_stage: ConversationStage::default(),
            profile: TravelProfile::default(),
            scratch: BTreeMap::new(),
        }
    }

    /// Whether a flow is currently active.
    pub fn has_active_flow(&self) -> bool {
        self.active_flow_id.is_some()
    }

    /// Append a completed flow id to the history, once per activation.
    pub fn record_flow_completion(&mut self, flow_id: &str) {
        if !self.flow_history.iter().any(|id| id == flow_id) {
            self.flow_history.push(flow_id.to_string());
        }
    }

    /// Clear the active flow fields (on completion or reset).
    pub fn clear_active_flow(&mut self) {
        self.active_flow_id = None;
        self.current_step_id = None;
    }

    /// Check the structural invariant against the flow registry.
    pub fn is_consistent(&self, registry: &FlowRegistry) -> bool {
        match (&self.active_flow_id, &self.current_step_id) {
            (None, None) => true,
            (Some(flow_id), Some(step_id)) => registry
                .flow(flow_id)
                .is_some_and(|f| f.step(step_id).is_some()),
            _ => false,
        }
    }

    /// Enforce the structural invariant.
    ///
    /// A violation is a programming error: it asserts in development builds
    /// and degrades to a default record (keeping the active context) in
    /// release builds.
    pub fn reconcile(&mut self, registry: &FlowRegistry) {
        if self.is_consistent(registry) {
            return;
        }
        debug_assert!(
            false,
            "conversation memory references flow {:?} step {:?} inconsistently",
            self.active_flow_id, self.current_step_id
        );
        tracing::error!(
            flow = ?self.active_flow_id,
            step = ?self.current_step_id,
            "Corrupt conversation memory — resetting to default"
        );
        *self = Self::new(self.active_context.clone());
    }
}

impl Default for ConversationMemory {
    fn default() -> Self {
        Self::new("dashboard")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flows::registry::FlowRegistry;

    fn registry() -> FlowRegistry {
        FlowRegistry::with_builtin_catalog()
    }

    #[test]
    fn default_record_is_consistent() {
        let memory = ConversationMemory::default();
        assert!(memory.is_consistent(&registry()));
        assert!(!memory.has_active_flow());
        assert_eq!(memory.interview_stage, ConversationStage::Greeting);
    }

    #[test]
    fn flow_completion_is_idempotent() {
        let mut memory = ConversationMemory::default();
        memory.record_flow_completion("plan-trip");
        memory.record_flow_completion("plan-trip");
        memory.record_flow_completion("log-expense");
        assert_eq!(memory.flow_history, vec!["plan-trip", "log-expense"]);
    }

    #[test]
    fn half_set_flow_fields_are_inconsistent() {
        let registry = registry();

        let mut memory = ConversationMemory::default();
        memory.active_flow_id = Some("plan-trip".into());
        assert!(!memory.is_consistent(&registry));

        let mut memory = ConversationMemory::default();
        memory.current_step_id = Some("plan-trip-destination".into());
        assert!(!memory.is_consistent(&registry));
    }

    #[test]
    fn foreign_step_is_inconsistent() {
        let mut memory = ConversationMemory::default();
        memory.active_flow_id = Some("plan-trip".into());
        memory.current_step_id = Some("no-such-step".into());
        assert!(!memory.is_consistent(&registry()));
    }

    #[test]
    #[should_panic(expected = "conversation memory")]
    fn reconcile_asserts_on_corruption_in_dev() {
        let mut memory = ConversationMemory::default();
        memory.active_flow_id = Some("plan-trip".into());
        memory.reconcile(&registry());
    }

    #[test]
    fn serde_roundtrip() {
        let mut memory = ConversationMemory::new("itinerary");
        memory.flow_responses.insert("plan-trip-destination".into(), "Tokyo".into());
        memory.record_flow_completion("plan-trip");
        memory.interview_stage = ConversationStage::AskBudget;
        memory.profile.destination = Some("Tokyo".into());

        let json = serde_json::to_string(&memory).unwrap();
        let parsed: ConversationMemory = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, memory);
    }

    #[test]
    fn missing_fields_deserialize_to_defaults() {
        // Records written before the interview fields existed
        let json = r#"{"active_context": "budget"}"#;
        let memory: ConversationMemory = serde_json::from_str(json).unwrap();
        assert_eq!(memory.active_context, "budget");
        assert_eq!(memory.interview_stage, ConversationStage::Greeting);
        assert!(memory.flow_history.is_empty());
    }
}
