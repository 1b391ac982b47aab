//! Named multi-step flows — catalog, trigger matching, and step engine.

pub mod engine;
pub mod model;
pub mod registry;

pub use engine::{CompletedFlow, FlowEngine, FlowOutcome};
pub use model::{ChatFlow, ChatFlowStep, ResponseKind, StepAction};
pub use registry::FlowRegistry;
