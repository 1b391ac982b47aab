//! Flow step engine — advances an activated flow one step at a time.
//!
//! Pure state transitions over `ConversationMemory` plus emitted intents.
//! The engine performs no external side effects; actions are returned to
//! the caller for execution.

use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::error::FlowError;
use crate::flows::model::{ChatFlow, ChatFlowStep, StepAction};
use crate::flows::registry::FlowRegistry;
use crate::memory::ConversationMemory;

/// A completed flow and the answers it collected.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletedFlow {
    pub flow_id: String,
    /// This flow's recorded answers, keyed by step id.
    pub responses: BTreeMap<String, String>,
}

/// Result of submitting a step response.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FlowOutcome {
    /// Rendered next question, if the flow continues.
    pub question: Option<String>,
    /// Action emitted by the just-answered step, for the caller to execute.
    pub action: Option<StepAction>,
    /// Set when this submission finished the flow.
    pub completed: Option<CompletedFlow>,
}

/// Advances flows against a registry.
pub struct FlowEngine<'a> {
    registry: &'a FlowRegistry,
}

impl<'a> FlowEngine<'a> {
    pub fn new(registry: &'a FlowRegistry) -> Self {
        Self { registry }
    }

    /// Activate `flow` for this memory and return its first question,
    /// unmodified — there are no prior answers to substitute yet.
    pub fn start_flow(&self, memory: &mut ConversationMemory, flow: &ChatFlow) -> Option<String> {
        let first = match flow.first_step() {
            Some(step) => step,
            None => {
                let e = FlowError::EmptyFlow { id: flow.id.clone() };
                warn!(error = %e, "Not activating flow");
                return None;
            }
        };
        memory.active_flow_id = Some(flow.id.clone());
        memory.current_step_id = Some(first.id.clone());
        debug!(flow_id = %flow.id, step_id = %first.id, "Flow activated");
        Some(first.question.clone())
    }

    /// Record a response for the current step and advance.
    ///
    /// Calling this with no active flow is a defensive no-op that returns an
    /// empty outcome. Unknown flow or step ids (structurally impossible
    /// after reconciliation) are logged and treated the same way.
    pub fn submit_response(&self, memory: &mut ConversationMemory, raw: &str) -> FlowOutcome {
        let (flow_id, step_id) = match (&memory.active_flow_id, &memory.current_step_id) {
            (Some(f), Some(s)) => (f.clone(), s.clone()),
            _ => return FlowOutcome::default(),
        };

        let (flow, step) = match self.resolve(&flow_id, &step_id) {
            Ok(pair) => pair,
            Err(e) => {
                warn!(error = %e, "Ignoring response");
                return FlowOutcome::default();
            }
        };

        memory
            .flow_responses
            .insert(step_id.clone(), raw.trim().to_string());

        let action = step.action.clone();

        match &step.next_step_id {
            Some(next_id) => {
                let Some(next) = flow.step(next_id) else {
                    warn!(flow_id = %flow_id, next_id = %next_id, "Dangling next_step_id — completing flow");
                    return self.complete(memory, flow, action);
                };
                memory.current_step_id = Some(next.id.clone());
                let question = substitute(&next.question, &memory.flow_responses);
                FlowOutcome {
                    question: Some(question),
                    action,
                    completed: None,
                }
            }
            None => self.complete(memory, flow, action),
        }
    }

    /// Resolve the active flow and step, structurally guaranteed after
    /// reconciliation.
    fn resolve(
        &self,
        flow_id: &str,
        step_id: &str,
    ) -> Result<(&ChatFlow, &ChatFlowStep), FlowError> {
        let flow = self
            .registry
            .flow(flow_id)
            .ok_or_else(|| FlowError::FlowNotFound {
                id: flow_id.to_string(),
            })?;
        let step = flow.step(step_id).ok_or_else(|| FlowError::StepNotFound {
            flow_id: flow_id.to_string(),
            step_id: step_id.to_string(),
        })?;
        Ok((flow, step))
    }

    fn complete(
        &self,
        memory: &mut ConversationMemory,
        flow: &ChatFlow,
        action: Option<StepAction>,
    ) -> FlowOutcome {
        let responses: BTreeMap<String, String> = flow
            .steps
            .iter()
            .filter_map(|s| {
                memory
                    .flow_responses
                    .get(&s.id)
                    .map(|v| (s.id.clone(), v.clone()))
            })
            .collect();

        memory.clear_active_flow();
        memory.record_flow_completion(&flow.id);
        debug!(flow_id = %flow.id, "Flow completed");

        FlowOutcome {
            question: None,
            action,
            completed: Some(CompletedFlow {
                flow_id: flow.id.clone(),
                responses,
            }),
        }
    }
}

/// Substitute `{name}` placeholders from prior answers.
///
/// A placeholder resolves against the answer whose step id's last
/// `-`/`/`-separated component equals the placeholder name. Unresolved
/// placeholders are left verbatim.
fn substitute(template: &str, responses: &BTreeMap<String, String>) -> String {
    let mut rendered = template.to_string();
    for (step_id, value) in responses {
        let suffix = step_id
            .rsplit(['-', '/'])
            .next()
            .unwrap_or(step_id.as_str());
        rendered = rendered.replace(&format!("{{{suffix}}}"), value);
    }
    rendered
}
