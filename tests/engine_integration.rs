//! End-to-end tests for the conversational engine.
//!
//! Each test builds a real engine over an in-memory document store (or a
//! libsql file for the persistence tests) and drives it through the public
//! entry points only.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rust_decimal_macros::dec;
use tokio::time::timeout;

use travel_assist::behavior::ActivityEvent;
use travel_assist::bus::{EngineEvent, EngineStatus};
use travel_assist::config::EngineConfig;
use travel_assist::engine::AssistantEngine;
use travel_assist::flows::StepAction;
use travel_assist::insights::{ExpenseRecord, InsightInputs, Severity};
use travel_assist::store::{DocumentStore, InMemoryStore, LibSqlStore};
use travel_assist::suggestions::{Priority, TriggerKind};

/// Maximum time any awaited event is allowed to take.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

fn engine() -> Arc<AssistantEngine> {
    AssistantEngine::new(EngineConfig::default(), Arc::new(InMemoryStore::new()))
}

#[tokio::test]
async fn profile_interview_full_walk() {
    let engine = engine();
    let user = "traveler";

    let turns = [
        ("hello", "Where would you like to go?"),
        ("Kyoto", "What budget do you have in mind?"),
        ("3000 USD", "When are you planning to travel?"),
        ("next April", "how many travelers?"),
        ("two of us", "What are you interested in?"),
        ("food, culture and hiking", "draft an itinerary?"),
    ];

    for (input, expected_fragment) in turns {
        let reply = engine.process_message(user, "dashboard", input).await;
        assert!(
            reply.reply.contains(expected_fragment),
            "input {input:?}: got {:?}",
            reply.reply
        );
        assert!(reply.active_flow.is_none());
    }
}

#[tokio::test]
async fn greeting_restarts_the_interview() {
    let engine = engine();
    engine.process_message("u", "dashboard", "hello").await;
    engine.process_message("u", "dashboard", "Kyoto").await;

    // Fresh greeting from mid-interview resets to the opening prompt
    let reply = engine.process_message("u", "dashboard", "bonjour").await;
    assert!(reply.reply.contains("Hi there!"), "got {:?}", reply.reply);
}

#[tokio::test]
async fn flow_lifecycle_with_substitution_and_action() {
    let engine = engine();
    let user = "traveler";

    let reply = engine
        .process_message(user, "dashboard", "let's plan a trip!")
        .await;
    assert_eq!(reply.active_flow.as_deref(), Some("plan-trip"));

    let reply = engine.process_message(user, "dashboard", "Lisbon").await;
    assert!(reply.reply.contains("Lisbon"), "got {:?}", reply.reply);
    assert_eq!(reply.active_flow.as_deref(), Some("plan-trip"));

    engine.process_message(user, "dashboard", "early June").await;
    let reply = engine.process_message(user, "dashboard", "around 2000").await;

    assert!(reply.active_flow.is_none());
    assert_eq!(reply.action, Some(StepAction::DraftItinerary));
}

#[tokio::test]
async fn flow_state_survives_process_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("assist.db");

    {
        let store = Arc::new(LibSqlStore::new_local(&path).await.unwrap());
        let engine = AssistantEngine::new(EngineConfig::default(), store);
        engine.process_message("u", "dashboard", "plan a trip").await;
        engine.process_message("u", "dashboard", "Oslo").await;
        engine.stop().await;
    }

    // A new engine over the same file picks up mid-flow
    let store = Arc::new(LibSqlStore::new_local(&path).await.unwrap());
    let engine = AssistantEngine::new(EngineConfig::default(), store);
    let reply = engine.process_message("u", "dashboard", "late May").await;
    assert_eq!(reply.active_flow.as_deref(), Some("plan-trip"));
    assert!(reply.reply.contains("Oslo"), "got {:?}", reply.reply);
}

#[tokio::test]
async fn scheduled_suggestion_arrives_on_the_bus() {
    let engine = engine();
    let mut rx = engine.bus().subscribe();

    let id = engine
        .schedule_suggestion(
            "u",
            Utc::now() + chrono::Duration::milliseconds(20),
            "Check in for your flight",
            Some("itinerary".into()),
            None,
        )
        .await
        .unwrap();

    let event = timeout(TEST_TIMEOUT, async {
        loop {
            if let EngineEvent::NewSuggestion { user_id, suggestion } = rx.recv().await.unwrap() {
                return (user_id, suggestion);
            }
        }
    })
    .await
    .unwrap();

    assert_eq!(event.0, "u");
    assert_eq!(event.1.id, id);

    let active = engine.active_suggestions("u").await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].trigger, TriggerKind::Scheduled);
}

#[tokio::test]
async fn past_schedule_is_a_noop() {
    let engine = engine();
    let id = engine
        .schedule_suggestion("u", Utc::now() - chrono::Duration::seconds(1), "late", None, None)
        .await;
    assert!(id.is_none());
    assert!(engine.active_suggestions("u").await.is_empty());
}

#[tokio::test]
async fn dismiss_twice_leaves_active_set_unchanged() {
    let engine = engine();
    engine
        .schedule_suggestion(
            "u",
            Utc::now() + chrono::Duration::milliseconds(10),
            "once",
            None,
            None,
        )
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    let id = engine.active_suggestions("u").await[0].id;
    assert!(engine.dismiss_suggestion("u", id).await);
    assert!(!engine.dismiss_suggestion("u", id).await);
    assert!(engine.active_suggestions("u").await.is_empty());
}

#[tokio::test]
async fn data_trigger_reacts_to_snapshots() {
    let engine = engine();
    engine
        .register_data_trigger(
            "u",
            "expenses",
            Box::new(|snapshot| {
                snapshot["daily_total"]
                    .as_f64()
                    .is_some_and(|total| total > 200.0)
            }),
            "Spending is running hot today — want a breakdown?",
            Priority::High,
        )
        .await;

    let under = serde_json::json!({"daily_total": 120.0});
    assert_eq!(engine.evaluate_data_snapshot("u", "expenses", &under).await, 0);

    let over = serde_json::json!({"daily_total": 260.0});
    assert_eq!(engine.evaluate_data_snapshot("u", "expenses", &over).await, 1);

    let active = engine.active_suggestions("u").await;
    assert_eq!(active.len(), 1);
    assert_eq!(active[0].priority, Priority::High);
}

#[tokio::test]
async fn insights_are_returned_and_published() {
    let engine = engine();
    let mut rx = engine.bus().subscribe();

    let inputs = InsightInputs {
        expenses: vec![ExpenseRecord {
            amount: dec!(1500),
            category: "hotel".into(),
            incurred_at: Utc::now(),
        }],
        budget: Some(dec!(1000)),
        ..Default::default()
    };

    let insights = engine.generate_insights(&inputs);
    assert_eq!(insights.len(), 1);
    assert_eq!(insights[0].severity, Severity::Warning);
    assert!(!insights[0].is_read);

    let published = timeout(TEST_TIMEOUT, async {
        loop {
            if let EngineEvent::NewInsight { insight } = rx.recv().await.unwrap() {
                return insight;
            }
        }
    })
    .await
    .unwrap();
    assert_eq!(published.id, insights[0].id);
}

#[tokio::test]
async fn status_subscription_sees_degraded_and_recovery() {
    let backend = Arc::new(InMemoryStore::new());
    let engine = AssistantEngine::new(EngineConfig::default(), backend.clone());

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let mut subscription = engine.subscribe_status(move |status| {
        let _ = tx.send(status);
    });

    backend.set_unavailable(true);
    engine.process_message("u", "dashboard", "hello").await;
    let status = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(status, EngineStatus::Degraded);

    backend.set_unavailable(false);
    engine.process_message("u", "dashboard", "Porto").await;
    let status = timeout(TEST_TIMEOUT, rx.recv()).await.unwrap().unwrap();
    assert_eq!(status, EngineStatus::Ready);

    subscription.unsubscribe();
    subscription.unsubscribe();
}

#[tokio::test]
async fn tracked_activity_feeds_predictions_on_tick() {
    let engine = engine();
    let user = "traveler";

    // Enough tracked events to clear the prediction gate
    for _ in 0..20 {
        engine
            .track_activity(
                user,
                "explore",
                ActivityEvent::default()
                    .with_destination("Kyoto")
                    .with_search_term("temples")
                    .with_spend(dec!(45), "food"),
            )
            .await;
    }

    engine.tick_all().await;

    let active = engine.active_suggestions(user).await;
    assert!(
        active.iter().any(|s| s.trigger == TriggerKind::Predictive),
        "expected a predictive suggestion, got {active:?}"
    );
    assert!(active.iter().any(|s| s.trigger == TriggerKind::TimeOfDay));
}

#[tokio::test]
async fn end_session_cancels_pending_one_shots() {
    let engine = engine();
    engine
        .schedule_suggestion(
            "u",
            Utc::now() + chrono::Duration::milliseconds(50),
            "never delivered",
            None,
            None,
        )
        .await
        .unwrap();

    engine.end_session("u").await;
    tokio::time::sleep(Duration::from_millis(150)).await;

    // The session (and its scheduler) is gone; a fresh one is empty
    assert!(engine.active_suggestions("u").await.is_empty());
}

#[tokio::test]
async fn context_switch_is_persisted_by_track_activity() {
    let backend = Arc::new(InMemoryStore::new());
    let engine = AssistantEngine::new(EngineConfig::default(), backend.clone());

    engine.process_message("u", "dashboard", "hello").await;
    engine
        .track_activity("u", "budget", ActivityEvent::default())
        .await;

    let doc = backend.get("memory:u").await.unwrap().unwrap();
    assert_eq!(doc["active_context"], "budget");
}
