//! Flow data model — flows, steps, and the actions steps can emit.

use serde::{Deserialize, Serialize};

/// How the UI should solicit the answer to a step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseKind {
    /// Free text.
    Text,
    /// One of the step's `options`.
    Choice,
    /// Yes/no.
    Confirmation,
}

/// Side-effecting intent a step can emit on completion.
///
/// The step engine never executes these — it returns them to the caller,
/// which owns all external effects. Tagged variants carry only the fields
/// that kind needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StepAction {
    /// Switch the UI to another context tab.
    Navigate { target: String },
    /// Run a search with a preset query.
    Search { query: String },
    /// Draft an itinerary from the flow's collected answers.
    DraftItinerary,
    /// Translate the collected phrase.
    Translate,
    /// Record an expense from the flow's collected answers.
    LogExpense,
}

/// One question/answer step within a flow.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatFlowStep {
    /// Step id, unique within the flow. The last `-`-separated component
    /// doubles as the placeholder name for later templates.
    pub id: String,
    /// Question template; may contain `{placeholder}` tokens resolved from
    /// prior answers.
    pub question: String,
    pub response_kind: ResponseKind,
    /// Choices for `ResponseKind::Choice`.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub options: Vec<String>,
    /// Next step id; `None` marks the flow's terminal step.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_step_id: Option<String>,
    /// Action emitted to the caller when this step's answer is submitted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<StepAction>,
}

impl ChatFlowStep {
    /// Text step with a follow-up.
    pub fn text(id: impl Into<String>, question: impl Into<String>, next: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            response_kind: ResponseKind::Text,
            options: Vec::new(),
            next_step_id: Some(next.into()),
            action: None,
        }
    }

    /// Terminal text step.
    pub fn terminal(id: impl Into<String>, question: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            question: question.into(),
            response_kind: ResponseKind::Text,
            options: Vec::new(),
            next_step_id: None,
            action: None,
        }
    }

    /// Attach an action to this step.
    pub fn with_action(mut self, action: StepAction) -> Self {
        self.action = Some(action);
        self
    }

    /// Set the response kind and options.
    pub fn with_choices(mut self, options: Vec<String>) -> Self {
        self.response_kind = ResponseKind::Choice;
        self.options = options;
        self
    }
}

/// A named, ordered sequence of steps activated by a trigger phrase within
/// one application context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatFlow {
    pub id: String,
    /// Context tab this flow is eligible in.
    pub context_tag: String,
    pub name: String,
    /// Phrases whose substring presence in the input activates the flow.
    pub triggers: Vec<String>,
    /// Ordered steps; the first is the entry step.
    pub steps: Vec<ChatFlowStep>,
}

impl ChatFlow {
    /// Look up a step by id.
    pub fn step(&self, step_id: &str) -> Option<&ChatFlowStep> {
        self.steps.iter().find(|s| s.id == step_id)
    }

    /// The flow's entry step.
    pub fn first_step(&self) -> Option<&ChatFlowStep> {
        self.steps.first()
    }
}
