//! Flow registry — catalog of flows grouped by context, trigger matching,
//! and the context prompt table.

use crate::flows::model::{ChatFlow, ChatFlowStep, StepAction};

/// Holds the flow catalog in registration order.
pub struct FlowRegistry {
    flows: Vec<ChatFlow>,
}

impl FlowRegistry {
    /// Empty registry.
    pub fn new() -> Self {
        Self { flows: Vec::new() }
    }

    /// Registry pre-loaded with the built-in flow catalog.
    pub fn with_builtin_catalog() -> Self {
        let mut registry = Self::new();
        for flow in builtin_catalog() {
            registry.register(flow);
        }
        registry
    }

    /// Register a flow. Registration order is significant for matching.
    pub fn register(&mut self, flow: ChatFlow) {
        self.flows.push(flow);
    }

    /// Look up a flow by id.
    pub fn flow(&self, id: &str) -> Option<&ChatFlow> {
        self.flows.iter().find(|f| f.id == id)
    }

    /// Match free text against the triggers of the flows in `context_tag`.
    ///
    /// Matching is case-insensitive substring containment; the first flow in
    /// registration order with any matching trigger wins. When trigger
    /// phrases overlap across flows this is order-dependent and can activate
    /// the earlier-registered flow — intentional: no specificity ranking is
    /// applied.
    pub fn match_flow(&self, text: &str, context_tag: &str) -> Option<&ChatFlow> {
        let normalized = text.trim().to_lowercase();
        if normalized.is_empty() {
            return None;
        }
        self.flows.iter().find(|flow| {
            flow.context_tag == context_tag
                && flow
                    .triggers
                    .iter()
                    .any(|t| normalized.contains(&t.to_lowercase()))
        })
    }

    /// Number of registered flows.
    pub fn len(&self) -> usize {
        self.flows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.flows.is_empty()
    }
}

impl Default for FlowRegistry {
    fn default() -> Self {
        Self::with_builtin_catalog()
    }
}

/// Human prompt describing a context, used as the generic fallback reply.
pub fn context_prompt(context_tag: &str) -> &'static str {
    match context_tag {
        "dashboard" => "This is your travel dashboard. Ask me to plan a trip or tell me where you'd like to go.",
        "itinerary" => "You're viewing your itinerary. I can adjust days, add stops, or build a packing list.",
        "budget" => "You're in the budget view. I can log expenses or break down your spending.",
        "language" => "Language help: ask me to translate a phrase for your trip.",
        "explore" => "Explore destinations — tell me what kind of trip you're dreaming of.",
        _ => "I'm your travel assistant. Tell me where you'd like to go or what you need help with.",
    }
}

/// The built-in flow catalog — static configuration data.
fn builtin_catalog() -> Vec<ChatFlow> {
    vec![
        ChatFlow {
            id: "plan-trip".into(),
            context_tag: "dashboard".into(),
            name: "Plan a trip".into(),
            triggers: vec![
                "plan a trip".into(),
                "plan trip".into(),
                "new trip".into(),
                "start planning".into(),
            ],
            steps: vec![
                ChatFlowStep::text(
                    "plan-trip-destination",
                    "Let's plan it! Where would you like to go?",
                    "plan-trip-dates",
                ),
                ChatFlowStep::text(
                    "plan-trip-dates",
                    "When are you thinking of visiting {destination}?",
                    "plan-trip-budget",
                ),
                ChatFlowStep::terminal(
                    "plan-trip-budget",
                    "What budget should I plan {destination} around?",
                )
                .with_action(StepAction::DraftItinerary),
            ],
        },
        ChatFlow {
            id: "log-expense".into(),
            context_tag: "budget".into(),
            name: "Log an expense".into(),
            triggers: vec![
                "log expense".into(),
                "add expense".into(),
                "track spending".into(),
                "i spent".into(),
            ],
            steps: vec![
                ChatFlowStep::text(
                    "log-expense-amount",
                    "Sure — how much did you spend?",
                    "log-expense-category",
                ),
                ChatFlowStep::terminal(
                    "log-expense-category",
                    "Got it, {amount}. Which category is it — food, transport, lodging, or other?",
                )
                .with_choices(vec![
                    "food".into(),
                    "transport".into(),
                    "lodging".into(),
                    "other".into(),
                ])
                .with_action(StepAction::LogExpense),
            ],
        },
        ChatFlow {
            id: "translate-help".into(),
            context_tag: "language".into(),
            name: "Translate a phrase".into(),
            triggers: vec!["translate".into(), "how do you say".into()],
            steps: vec![
                ChatFlowStep::text(
                    "translate-phrase",
                    "What phrase would you like translated?",
                    "translate-language",
                ),
                ChatFlowStep::terminal(
                    "translate-language",
                    "Which language should I translate \"{phrase}\" into?",
                )
                .with_action(StepAction::Translate),
            ],
        },
        ChatFlow {
            id: "packing-list".into(),
            context_tag: "itinerary".into(),
            name: "Build a packing list".into(),
            triggers: vec!["packing list".into(), "what to pack".into(), "help me pack".into()],
            steps: vec![
                ChatFlowStep::text(
                    "packing-destination",
                    "Happy to help you pack. Which trip is this for?",
                    "packing-season",
                ),
                ChatFlowStep::terminal(
                    "packing-season",
                    "Packing for {destination} — what season will it be there?",
                )
                .with_action(StepAction::Search {
                    query: "packing checklist".into(),
                }),
            ],
        },
    ]
}
