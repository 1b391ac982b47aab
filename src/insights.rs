//! Insight generator — a stateless batch scan over supplied domain data
//! (expenses, itineraries, weather, interests) producing severity-tagged,
//! read/unread-tracked observations.
//!
//! No state machine here: every call starts from the inputs alone. Routing
//! the results onto the event bus is the engine's job.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Insight severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Info,
    Warning,
}

/// Per-kind insight payload, carrying only the fields that kind needs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum InsightData {
    BudgetOverspend {
        spent: Decimal,
        budget: Decimal,
    },
    SpendConcentration {
        category: String,
        share_percent: u32,
    },
    UpcomingItinerary {
        title: String,
        destination: String,
        starts_at: DateTime<Utc>,
    },
    AdverseWeather {
        destination: String,
        condition: String,
    },
    DestinationIdea {
        destination: String,
        interest: String,
    },
}

/// A derived observation over batch domain data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AiInsight {
    pub id: Uuid,
    pub title: String,
    pub description: String,
    pub severity: Severity,
    pub data: InsightData,
    pub timestamp: DateTime<Utc>,
    /// The only field that mutates after creation.
    pub is_read: bool,
    /// Which rule produced this insight.
    pub source_tag: String,
    /// Static per-rule confidence in `[0, 1]`.
    pub confidence: f32,
}

impl AiInsight {
    fn new(
        title: impl Into<String>,
        description: impl Into<String>,
        severity: Severity,
        data: InsightData,
        source_tag: &str,
        confidence: f32,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.into(),
            description: description.into(),
            severity,
            data,
            timestamp: now,
            is_read: false,
            source_tag: source_tag.to_string(),
            confidence,
        }
    }

    pub fn mark_read(&mut self) {
        self.is_read = true;
    }
}

/// One recorded expense.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExpenseRecord {
    pub amount: Decimal,
    pub category: String,
    pub incurred_at: DateTime<Utc>,
}

/// One itinerary entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItineraryEntry {
    pub title: String,
    pub destination: String,
    pub starts_at: DateTime<Utc>,
}

/// A weather observation for one destination.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherSnapshot {
    pub destination: String,
    pub condition: String,
}

/// Batch inputs to one generation run.
#[derive(Debug, Clone, Default)]
pub struct InsightInputs {
    pub expenses: Vec<ExpenseRecord>,
    pub itineraries: Vec<ItineraryEntry>,
    pub interests: Vec<String>,
    pub past_destinations: Vec<String>,
    pub weather: Vec<WeatherSnapshot>,
    pub budget: Option<Decimal>,
}

const ADVERSE_CONDITIONS: &[&str] = &[
    "storm",
    "thunderstorm",
    "heavy rain",
    "snow",
    "hail",
    "hurricane",
    "typhoon",
    "flood",
];

/// Destination ideas keyed by interest keyword.
const INTEREST_DESTINATIONS: &[(&str, &str)] = &[
    ("food", "Bologna"),
    ("culture", "Kyoto"),
    ("hiking", "Patagonia"),
    ("beach", "Bali"),
    ("history", "Rome"),
    ("art", "Florence"),
    ("wildlife", "Costa Rica"),
    ("skiing", "Innsbruck"),
];

/// How far ahead an itinerary entry counts as "upcoming".
const UPCOMING_WINDOW_DAYS: i64 = 3;

/// Run all insight rules against `inputs` as of `now`.
///
/// Rules, in emission order: budget overspend, spend concentration,
/// upcoming itinerary entries, adverse weather at itinerary destinations,
/// interest-matched destination ideas.
pub fn generate_insights(inputs: &InsightInputs, now: DateTime<Utc>) -> Vec<AiInsight> {
    let mut insights = Vec::new();

    // Budget overspend
    let total_spent: Decimal = inputs.expenses.iter().map(|e| e.amount).sum();
    if let Some(budget) = inputs.budget {
        if !budget.is_zero() && total_spent > budget {
            insights.push(AiInsight::new(
                "Over budget",
                format!("You've spent {total_spent}, which is over your {budget} budget."),
                Severity::Warning,
                InsightData::BudgetOverspend {
                    spent: total_spent,
                    budget,
                },
                "budget-overspend",
                0.9,
                now,
            ));
        }
    }

    // Spend concentration: one category takes more than half of total spend
    if inputs.expenses.len() >= 2 && !total_spent.is_zero() {
        let mut by_category: std::collections::BTreeMap<&str, Decimal> = Default::default();
        for expense in &inputs.expenses {
            *by_category.entry(expense.category.as_str()).or_default() += expense.amount;
        }
        if let Some((category, amount)) = by_category.iter().max_by_key(|(_, amount)| **amount) {
            let share = *amount * Decimal::from(100) / total_spent;
            if share > Decimal::from(50) {
                let share_percent = share.trunc().to_u32().unwrap_or(100);
                insights.push(AiInsight::new(
                    "Spending concentrated",
                    format!("{share_percent}% of your spending so far is on {category}."),
                    Severity::Info,
                    InsightData::SpendConcentration {
                        category: category.to_string(),
                        share_percent,
                    },
                    "spend-concentration",
                    0.7,
                    now,
                ));
            }
        }
    }

    // Upcoming itinerary entries
    let horizon = now + chrono::Duration::days(UPCOMING_WINDOW_DAYS);
    for entry in &inputs.itineraries {
        if entry.starts_at > now && entry.starts_at <= horizon {
            insights.push(AiInsight::new(
                "Coming up soon",
                format!(
                    "{} in {} starts on {}.",
                    entry.title,
                    entry.destination,
                    entry.starts_at.format("%B %-d")
                ),
                Severity::Info,
                InsightData::UpcomingItinerary {
                    title: entry.title.clone(),
                    destination: entry.destination.clone(),
                    starts_at: entry.starts_at,
                },
                "upcoming-itinerary",
                0.95,
                now,
            ));
        }
    }

    // Adverse weather at an itinerary destination
    for snapshot in &inputs.weather {
        let condition = snapshot.condition.to_lowercase();
        let adverse = ADVERSE_CONDITIONS.iter().any(|c| condition.contains(c));
        let on_itinerary = inputs
            .itineraries
            .iter()
            .any(|e| e.destination.eq_ignore_ascii_case(&snapshot.destination));
        if adverse && on_itinerary {
            insights.push(AiInsight::new(
                "Weather alert",
                format!(
                    "{} is forecast in {} — your plans there may be affected.",
                    snapshot.condition, snapshot.destination
                ),
                Severity::Warning,
                InsightData::AdverseWeather {
                    destination: snapshot.destination.clone(),
                    condition: snapshot.condition.clone(),
                },
                "adverse-weather",
                0.8,
                now,
            ));
        }
    }

    // Interest-matched destination ideas, skipping places already visited
    for interest in &inputs.interests {
        let interest_lower = interest.to_lowercase();
        for (keyword, destination) in INTEREST_DESTINATIONS {
            if !interest_lower.contains(keyword) {
                continue;
            }
            let visited = inputs
                .past_destinations
                .iter()
                .any(|d| d.eq_ignore_ascii_case(destination));
            if visited {
                continue;
            }
            insights.push(AiInsight::new(
                "Destination idea",
                format!("Into {interest}? {destination} could be a great fit."),
                Severity::Info,
                InsightData::DestinationIdea {
                    destination: destination.to_string(),
                    interest: interest.clone(),
                },
                "destination-idea",
                0.5,
                now,
            ));
        }
    }

    insights
}
