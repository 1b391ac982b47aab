//! Configuration types.

use std::time::Duration;

/// Engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Engine name for identification.
    pub name: String,
    /// Confidence added to the behavior model per tracked event.
    pub confidence_step: f32,
    /// Hard cap on the behavior model confidence score.
    pub confidence_cap: f32,
    /// Minimum confidence before `predict` emits anything.
    pub prediction_threshold: f32,
    /// Maximum retained frequent search terms (FIFO eviction).
    pub max_search_terms: usize,
    /// Maximum retained recent destinations (FIFO eviction).
    pub max_destinations: usize,
    /// Interval between recurring suggestion-generation ticks.
    pub tick_interval: Duration,
    /// Default time-to-live for generated suggestions.
    pub suggestion_ttl: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            name: "travel-assist".to_string(),
            confidence_step: 0.02,
            confidence_cap: 0.95,
            prediction_threshold: 0.3,
            max_search_terms: 10,
            max_destinations: 5,
            tick_interval: Duration::from_secs(300), // 5 minutes
            suggestion_ttl: Duration::from_secs(3600), // 1 hour
        }
    }
}
