//! Behavior model — accumulates tracked activity signals into a bounded
//! behavioral profile with a capped, monotonically increasing confidence
//! score that gates prediction.

use std::collections::{BTreeMap, VecDeque};

use chrono::{DateTime, Timelike, Utc};
use rand::seq::SliceRandom;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::config::EngineConfig;
use crate::suggestions::{Priority, SmartSuggestion, SuggestionPayload, TriggerKind};

/// Coarse time-of-day bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TimeOfDay {
    Morning,
    Afternoon,
    Evening,
}

impl TimeOfDay {
    /// Bucket an hour-of-day: morning < 12, afternoon < 18, evening
    /// otherwise.
    pub fn from_hour(hour: u32) -> Self {
        match hour {
            0..=11 => Self::Morning,
            12..=17 => Self::Afternoon,
            _ => Self::Evening,
        }
    }
}

/// One tracked interaction. Any subset of fields may be present.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityEvent {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context_visited: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub search_term: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend_amount: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spend_category: Option<String>,
}

impl ActivityEvent {
    pub fn context(context: impl Into<String>) -> Self {
        Self {
            context_visited: Some(context.into()),
            ..Default::default()
        }
    }

    pub fn with_search_term(mut self, term: impl Into<String>) -> Self {
        self.search_term = Some(term.into());
        self
    }

    pub fn with_destination(mut self, destination: impl Into<String>) -> Self {
        self.destination = Some(destination.into());
        self
    }

    pub fn with_spend(mut self, amount: Decimal, category: impl Into<String>) -> Self {
        self.spend_amount = Some(amount);
        self.spend_category = Some(category.into());
        self
    }
}

/// Spending habits derived from tracked spend events.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BudgetPreferences {
    /// Incremental average: first amount verbatim, then `(avg + amount) / 2`.
    pub average_spend: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preferred_category: Option<String>,
}

/// Bounded behavioral profile.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UserBehaviorPattern {
    /// Visit counts per context tag.
    #[serde(default)]
    pub context_visits: BTreeMap<String, u32>,
    /// Recent search terms, most recent last. FIFO, bounded.
    #[serde(default)]
    pub frequent_search_terms: VecDeque<String>,
    /// Recent destinations, most recent last. FIFO, bounded.
    #[serde(default)]
    pub last_destinations: VecDeque<String>,
    /// Tracked-event counts per time-of-day bucket (morning, afternoon,
    /// evening).
    #[serde(default)]
    pub time_of_day_counts: [u32; 3],
    #[serde(default)]
    pub budget: BudgetPreferences,
    /// Running average session duration in seconds.
    #[serde(default)]
    pub average_session_secs: f64,
}

impl UserBehaviorPattern {
    /// The context tag with the most visits, if any.
    pub fn most_visited_context(&self) -> Option<&str> {
        self.context_visits
            .iter()
            .max_by_key(|(_, count)| **count)
            .map(|(tag, _)| tag.as_str())
    }

    /// The time-of-day bucket with the most tracked events.
    pub fn preferred_time_of_day(&self) -> Option<TimeOfDay> {
        if self.time_of_day_counts.iter().all(|c| *c == 0) {
            return None;
        }
        let (idx, _) = self
            .time_of_day_counts
            .iter()
            .enumerate()
            .max_by_key(|(_, count)| **count)?;
        Some(match idx {
            0 => TimeOfDay::Morning,
            1 => TimeOfDay::Afternoon,
            _ => TimeOfDay::Evening,
        })
    }
}

/// Per-user predictive model.
pub struct BehaviorModel {
    pattern: UserBehaviorPattern,
    tracked_events: u32,
    confidence_step: f32,
    confidence_cap: f32,
    prediction_threshold: f32,
    max_search_terms: usize,
    max_destinations: usize,
}

impl BehaviorModel {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            pattern: UserBehaviorPattern::default(),
            tracked_events: 0,
            confidence_step: config.confidence_step,
            confidence_cap: config.confidence_cap,
            prediction_threshold: config.prediction_threshold,
            max_search_terms: config.max_search_terms,
            max_destinations: config.max_destinations,
        }
    }

    pub fn pattern(&self) -> &UserBehaviorPattern {
        &self.pattern
    }

    /// Current confidence score in `[0, cap]`. Never decreases.
    ///
    /// Derived from the event count rather than accumulated in floating
    /// point, so repeated tracking cannot drift below `n * step`.
    pub fn confidence(&self) -> f32 {
        (self.tracked_events as f32 * self.confidence_step).min(self.confidence_cap)
    }

    /// Fold one tracked event into the pattern and bump confidence.
    pub fn track(&mut self, event: &ActivityEvent, at: DateTime<Utc>) {
        if let Some(ref context) = event.context_visited {
            *self
                .pattern
                .context_visits
                .entry(context.clone())
                .or_insert(0) += 1;
        }
        if let Some(ref term) = event.search_term {
            push_bounded(
                &mut self.pattern.frequent_search_terms,
                term,
                self.max_search_terms,
            );
        }
        if let Some(ref destination) = event.destination {
            push_bounded(
                &mut self.pattern.last_destinations,
                destination,
                self.max_destinations,
            );
        }
        if let Some(amount) = event.spend_amount {
            let avg = self.pattern.budget.average_spend;
            self.pattern.budget.average_spend = if avg.is_zero() {
                amount
            } else {
                (avg + amount) / Decimal::from(2)
            };
            if let Some(ref category) = event.spend_category {
                self.pattern.budget.preferred_category = Some(category.clone());
            }
        }

        let bucket = TimeOfDay::from_hour(at.hour());
        self.pattern.time_of_day_counts[bucket as usize] += 1;

        self.tracked_events = self.tracked_events.saturating_add(1);
    }

    /// Fold a finished session's duration into the running average.
    pub fn track_session_duration(&mut self, secs: f64) {
        let avg = self.pattern.average_session_secs;
        self.pattern.average_session_secs = if avg == 0.0 { secs } else { (avg + secs) / 2.0 };
    }

    /// Predict suggestions for a context.
    ///
    /// Returns nothing below the confidence threshold (cold-start gate).
    /// Emits at most one destination-interest suggestion and one budget
    /// suggestion per call; term selection is pseudo-random over the
    /// tracked collections.
    pub fn predict(&self, context_tag: &str) -> Vec<SmartSuggestion> {
        // Tolerant comparison: the product in confidence() can land one ulp
        // under the threshold (15 * 0.02f32 < 0.3f32)
        if self.confidence() + f32::EPSILON < self.prediction_threshold {
            return Vec::new();
        }

        let mut rng = rand::thread_rng();
        let mut suggestions = Vec::new();

        let destinations: Vec<&String> = self.pattern.last_destinations.iter().collect();
        if let Some(destination) = destinations.choose(&mut rng) {
            let terms: Vec<&String> = self.pattern.frequent_search_terms.iter().collect();
            let interest = terms.choose(&mut rng).map(|t| t.to_string());
            let message = match &interest {
                Some(term) => format!(
                    "Still thinking about {destination}? There's plenty of {term} to explore there."
                ),
                None => format!("Ready to pick up planning for {destination}?"),
            };
            suggestions.push(
                SmartSuggestion::new(message, TriggerKind::Predictive, Priority::Medium)
                    .with_context(context_tag)
                    .with_payload(SuggestionPayload::SuggestDestination {
                        destination: destination.to_string(),
                        interest,
                    }),
            );
        }

        if !self.pattern.budget.average_spend.is_zero() {
            let category = self
                .pattern
                .budget
                .preferred_category
                .as_deref()
                .unwrap_or("travel");
            suggestions.push(
                SmartSuggestion::new(
                    format!(
                        "You typically spend around {} on {category}. Want a budget breakdown?",
                        self.pattern.budget.average_spend
                    ),
                    TriggerKind::Predictive,
                    Priority::Low,
                )
                .with_context(context_tag)
                .with_context_target("budget")
                .with_payload(SuggestionPayload::ViewBudget),
            );
        }

        suggestions
    }
}

/// FIFO push with bounded capacity. A repeated value moves to the back
/// instead of occupying two slots.
fn push_bounded(queue: &mut VecDeque<String>, value: &str, cap: usize) {
    queue.retain(|v| v != value);
    queue.push_back(value.to_string());
    while queue.len() > cap {
        queue.pop_front();
    }
}
