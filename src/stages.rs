//! Profile interview state machine — tracks which stage of the guided
//! travel-profile conversation the user is in.
//!
//! Progresses linearly: Greeting → AskDestination → AskBudget → AskDates →
//! AskTravelers → AskInterests → ItineraryRequest → General. A recognized
//! greeting from any stage restarts the conversation at Greeting.

use serde::{Deserialize, Serialize};

/// Fixed multilingual greeting list. Matching is case-insensitive,
/// whole-token for single words and prefix for multi-word phrases.
const GREETINGS: &[&str] = &[
    "hello",
    "hi",
    "hey",
    "hola",
    "bonjour",
    "salut",
    "ciao",
    "hallo",
    "namaste",
    "good morning",
    "good afternoon",
    "good evening",
];

/// Check whether `text` is a greeting.
pub fn is_greeting(text: &str) -> bool {
    let normalized = text.trim().to_lowercase();
    if normalized.is_empty() {
        return false;
    }
    let first_token: String = normalized
        .split_whitespace()
        .next()
        .unwrap_or("")
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect();

    GREETINGS
        .iter()
        .any(|g| first_token == *g || (g.contains(' ') && normalized.starts_with(g)))
}

/// The stages of the profile interview.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationStage {
    Greeting,
    AskDestination,
    AskBudget,
    AskDates,
    AskTravelers,
    AskInterests,
    ItineraryRequest,
    General,
}

impl ConversationStage {
    /// Whether this stage is absorbing (only a fresh greeting leaves it).
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::General)
    }
}

impl Default for ConversationStage {
    fn default() -> Self {
        Self::Greeting
    }
}

impl std::fmt::Display for ConversationStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Greeting => "greeting",
            Self::AskDestination => "ask_destination",
            Self::AskBudget => "ask_budget",
            Self::AskDates => "ask_dates",
            Self::AskTravelers => "ask_travelers",
            Self::AskInterests => "ask_interests",
            Self::ItineraryRequest => "itinerary_request",
            Self::General => "general",
        };
        write!(f, "{s}")
    }
}

/// Structured travel profile collected by the interview.
///
/// Mutated only by [`advance`], one field per stage. Fields are never
/// cleared — a field is only overwritten by a later answer to the same
/// stage.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TravelProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub destination: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub budget: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dates: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub travelers: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub interests: Vec<String>,
}

/// Split an interests answer on commas and the conjunction "and".
fn split_interests(text: &str) -> Vec<String> {
    text.split(',')
        .flat_map(|part| part.split(" and "))
        .map(|s| s.trim())
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Advance the interview one turn.
///
/// Writes at most the profile field belonging to the current stage. Every
/// input is accepted as a candidate answer for its stage — validation is
/// not this component's job. A greeting from any non-Greeting stage resets
/// to Greeting without consuming the text as data.
pub fn advance(
    stage: ConversationStage,
    text: &str,
    profile: &mut TravelProfile,
) -> ConversationStage {
    use ConversationStage::*;

    if stage != Greeting && is_greeting(text) {
        return Greeting;
    }

    let answer = text.trim();
    match stage {
        Greeting => {
            if is_greeting(answer) {
                AskDestination
            } else {
                // Non-greeting opener doubles as the destination answer
                profile.destination = Some(answer.to_string());
                AskBudget
            }
        }
        AskDestination => {
            profile.destination = Some(answer.to_string());
            AskBudget
        }
        AskBudget => {
            profile.budget = Some(answer.to_string());
            AskDates
        }
        AskDates => {
            profile.dates = Some(answer.to_string());
            AskTravelers
        }
        AskTravelers => {
            profile.travelers = Some(answer.to_string());
            AskInterests
        }
        AskInterests => {
            profile.interests = split_interests(answer);
            ItineraryRequest
        }
        // The itinerary request itself is handed to the caller, not stored
        ItineraryRequest => General,
        General => General,
    }
}

/// The question the engine asks when entering a stage.
pub fn stage_prompt(stage: ConversationStage) -> &'static str {
    match stage {
        ConversationStage::Greeting => "Hi there! I can help plan your next trip. Where would you like to go?",
        ConversationStage::AskDestination => "Where would you like to go?",
        ConversationStage::AskBudget => "Great choice! What budget do you have in mind?",
        ConversationStage::AskDates => "When are you planning to travel?",
        ConversationStage::AskTravelers => "Who's coming along — how many travelers?",
        ConversationStage::AskInterests => {
            "What are you interested in? Food, culture, nature — list as many as you like."
        }
        ConversationStage::ItineraryRequest => {
            "I have everything I need. Want me to draft an itinerary?"
        }
        ConversationStage::General => "Anything else I can help you with?",
    }
}
