//! Suggestion scheduler — one-shot timers, data triggers, and recurring
//! time-of-day / predictive generation.
//!
//! All generation paths only ever append to the active set and publish on
//! the event bus; they never touch `ConversationMemory`. Expiry is lazy:
//! [`SuggestionScheduler::active`] filters expired entries without mutating
//! storage, and [`SuggestionScheduler::purge_expired`] sweeps them out.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Timelike, Utc};
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::behavior::{BehaviorModel, TimeOfDay};
use crate::bus::{EngineEvent, EventBus};
use crate::error::ScheduleError;
use crate::suggestions::model::{Priority, SmartSuggestion, SuggestionPayload, TriggerKind};

/// Pure predicate over a data snapshot.
pub type TriggerPredicate = Box<dyn Fn(&Value) -> bool + Send + Sync>;

/// A registered condition over externally supplied data snapshots.
struct DataTrigger {
    id: Uuid,
    source_tag: String,
    predicate: TriggerPredicate,
    message: String,
    priority: Priority,
}

/// Per-session suggestion scheduler.
///
/// The active set and pending-timer table are shared with the one-shot
/// timer tasks, so they live behind `Arc` internally.
pub struct SuggestionScheduler {
    user_id: String,
    suggestions: Arc<RwLock<Vec<SmartSuggestion>>>,
    triggers: RwLock<Vec<DataTrigger>>,
    /// Pending one-shot timers, for pre-fire cancellation.
    timers: Arc<Mutex<HashMap<Uuid, JoinHandle<()>>>>,
    bus: EventBus,
    suggestion_ttl: Duration,
}

impl SuggestionScheduler {
    pub fn new(user_id: impl Into<String>, bus: EventBus, suggestion_ttl: Duration) -> Arc<Self> {
        Arc::new(Self {
            user_id: user_id.into(),
            suggestions: Arc::new(RwLock::new(Vec::new())),
            triggers: RwLock::new(Vec::new()),
            timers: Arc::new(Mutex::new(HashMap::new())),
            bus,
            suggestion_ttl,
        })
    }

    /// Configured TTL as a chrono duration.
    fn ttl(&self) -> chrono::Duration {
        chrono::Duration::from_std(self.suggestion_ttl).unwrap_or_else(|_| chrono::Duration::zero())
    }

    /// Append a suggestion to the active set and publish it.
    async fn emit(&self, suggestion: SmartSuggestion) {
        debug!(
            suggestion_id = %suggestion.id,
            trigger = ?suggestion.trigger,
            "Suggestion emitted"
        );
        self.bus.publish(EngineEvent::NewSuggestion {
            user_id: self.user_id.clone(),
            suggestion: suggestion.clone(),
        });
        self.suggestions.write().await.push(suggestion);
    }

    /// Schedule a one-shot suggestion for `at`.
    ///
    /// A past `at` is rejected: logged, `None` returned, nothing scheduled.
    /// The returned id can be used with [`cancel_scheduled`] before the
    /// timer fires, and with [`dismiss`] after.
    ///
    /// [`cancel_scheduled`]: SuggestionScheduler::cancel_scheduled
    /// [`dismiss`]: SuggestionScheduler::dismiss
    pub async fn schedule_once(
        &self,
        at: DateTime<Utc>,
        message: impl Into<String>,
        context_target: Option<String>,
        payload: Option<SuggestionPayload>,
    ) -> Option<Uuid> {
        let now = Utc::now();
        let Ok(delay) = (at - now).to_std() else {
            let e = ScheduleError::PastDeadline;
            warn!(user_id = %self.user_id, at = %at, error = %e, "One-shot suggestion rejected");
            return None;
        };

        let mut suggestion =
            SmartSuggestion::new(message, TriggerKind::Scheduled, Priority::Medium)
                .with_expiry(at + self.ttl());
        if let Some(target) = context_target {
            suggestion = suggestion.with_context_target(target);
        }
        if let Some(payload) = payload {
            suggestion = suggestion.with_payload(payload);
        }
        let id = suggestion.id;

        let suggestions = Arc::clone(&self.suggestions);
        let timers = Arc::clone(&self.timers);
        let bus = self.bus.clone();
        let user_id = self.user_id.clone();
        // Hold the timer table across spawn + insert: a zero-delay task's
        // cleanup blocks on this lock, so it cannot race ahead of the insert
        // and leave its finished handle behind.
        let mut pending = self.timers.lock().await;
        let handle = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            debug!(suggestion_id = %id, "One-shot suggestion fired");
            bus.publish(EngineEvent::NewSuggestion {
                user_id,
                suggestion: suggestion.clone(),
            });
            suggestions.write().await.push(suggestion);
            timers.lock().await.remove(&id);
        });
        pending.insert(id, handle);
        drop(pending);

        info!(user_id = %self.user_id, suggestion_id = %id, at = %at, "One-shot suggestion scheduled");
        Some(id)
    }

    /// Cancel a pending one-shot before it fires. Unknown or already-fired
    /// ids are a no-op; cancelling twice is safe.
    pub async fn cancel_scheduled(&self, id: Uuid) -> bool {
        match self.timers.lock().await.remove(&id) {
            Some(handle) => {
                handle.abort();
                debug!(suggestion_id = %id, "Scheduled suggestion cancelled");
                true
            }
            None => false,
        }
    }

    /// Cancel all pending one-shots (session teardown).
    pub async fn cancel_all_scheduled(&self) {
        let mut timers = self.timers.lock().await;
        for (_, handle) in timers.drain() {
            handle.abort();
        }
    }

    /// Register a data-condition trigger. The predicate is a pure function;
    /// evaluation happens only when the caller supplies a snapshot via
    /// [`SuggestionScheduler::evaluate_snapshot`].
    pub async fn register_data_trigger(
        &self,
        source_tag: impl Into<String>,
        predicate: TriggerPredicate,
        message: impl Into<String>,
        priority: Priority,
    ) -> Uuid {
        let trigger = DataTrigger {
            id: Uuid::new_v4(),
            source_tag: source_tag.into(),
            predicate,
            message: message.into(),
            priority,
        };
        let id = trigger.id;
        self.triggers.write().await.push(trigger);
        id
    }

    /// Remove a registered data trigger. Unknown ids are a no-op.
    pub async fn remove_data_trigger(&self, id: Uuid) -> bool {
        let mut triggers = self.triggers.write().await;
        let before = triggers.len();
        triggers.retain(|t| t.id != id);
        triggers.len() < before
    }

    /// Evaluate all triggers registered for `source_tag` against a data
    /// snapshot, emitting a suggestion per satisfied predicate. Returns the
    /// number emitted.
    pub async fn evaluate_snapshot(&self, source_tag: &str, snapshot: &Value) -> usize {
        let matched: Vec<SmartSuggestion> = {
            let triggers = self.triggers.read().await;
            triggers
                .iter()
                .filter(|t| t.source_tag == source_tag && (t.predicate)(snapshot))
                .map(|t| {
                    SmartSuggestion::new(t.message.clone(), TriggerKind::DataCondition, t.priority)
                        .with_expiry(Utc::now() + self.ttl())
                })
                .collect()
        };

        let count = matched.len();
        for suggestion in matched {
            self.emit(suggestion).await;
        }
        count
    }

    /// Run one recurring generation cycle: a time-of-day suggestion plus
    /// behavior-model predictions for the current context.
    ///
    /// Each cycle replaces the previous batch from the same trigger source
    /// instead of accumulating duplicates.
    pub async fn tick(&self, now: DateTime<Utc>, model: &BehaviorModel, context_tag: &str) {
        let expiry = now + self.ttl();

        let time_of_day = match TimeOfDay::from_hour(now.hour()) {
            TimeOfDay::Morning => "Good morning! Want to look over today's plan?",
            TimeOfDay::Afternoon => "Afternoon check-in: any expenses to log so far?",
            TimeOfDay::Evening => "Evening — a good moment to sketch out tomorrow.",
        };
        let time_suggestion =
            SmartSuggestion::new(time_of_day, TriggerKind::TimeOfDay, Priority::Low)
                .with_context(context_tag)
                .with_expiry(expiry);

        let predicted = model.predict(context_tag);

        {
            let mut suggestions = self.suggestions.write().await;
            suggestions.retain(|s| {
                s.trigger != TriggerKind::TimeOfDay && s.trigger != TriggerKind::Predictive
            });
        }

        self.emit(time_suggestion).await;
        for suggestion in predicted {
            let suggestion = suggestion.with_expiry(expiry);
            self.emit(suggestion).await;
        }
    }

    /// Active (non-expired) suggestions. Performs no mutation — expired
    /// entries stay in storage until [`SuggestionScheduler::purge_expired`].
    pub async fn active(&self) -> Vec<SmartSuggestion> {
        let now = Utc::now();
        self.suggestions
            .read()
            .await
            .iter()
            .filter(|s| !s.is_expired_at(now))
            .cloned()
            .collect()
    }

    /// Remove a suggestion from the active set. Unknown ids are a no-op.
    pub async fn dismiss(&self, id: Uuid) -> bool {
        let mut suggestions = self.suggestions.write().await;
        let before = suggestions.len();
        suggestions.retain(|s| s.id != id);
        let removed = suggestions.len() < before;
        if removed {
            info!(user_id = %self.user_id, suggestion_id = %id, "Suggestion dismissed");
        }
        removed
    }

    /// Sweep expired suggestions out of storage. Returns the number removed.
    pub async fn purge_expired(&self) -> usize {
        let now = Utc::now();
        let mut suggestions = self.suggestions.write().await;
        let before = suggestions.len();
        suggestions.retain(|s| !s.is_expired_at(now));
        let purged = before - suggestions.len();
        if purged > 0 {
            debug!(user_id = %self.user_id, count = purged, "Purged expired suggestions");
        }
        purged
    }

    /// Total stored suggestions, including lazily expired ones.
    pub async fn stored_count(&self) -> usize {
        self.suggestions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;

    fn scheduler() -> std::sync::Arc<SuggestionScheduler> {
        SuggestionScheduler::new("u1", EventBus::new(), Duration::from_secs(3600))
    }

    fn warm_model() -> BehaviorModel {
        let mut model = BehaviorModel::new(&EngineConfig::default());
        let at = Utc::now();
        for _ in 0..20 {
            model.track(
                &crate::behavior::ActivityEvent::default().with_destination("Kyoto"),
                at,
            );
        }
        model
    }

    #[tokio::test]
    async fn scenario_d_past_schedule_is_rejected() {
        let scheduler = scheduler();
        let id = scheduler
            .schedule_once(Utc::now() - chrono::Duration::seconds(1), "late", None, None)
            .await;
        assert!(id.is_none());
        assert!(scheduler.active().await.is_empty());
        assert_eq!(scheduler.stored_count().await, 0);
    }

    #[tokio::test]
    async fn one_shot_fires_and_publishes() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let scheduler = SuggestionScheduler::new("u1", bus, Duration::from_secs(3600));

        let id = scheduler
            .schedule_once(
                Utc::now() + chrono::Duration::milliseconds(20),
                "check in for your flight",
                Some("itinerary".into()),
                None,
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        let active = scheduler.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].id, id);
        assert_eq!(active[0].trigger, TriggerKind::Scheduled);
        assert_eq!(active[0].context_target.as_deref(), Some("itinerary"));

        match rx.recv().await.unwrap() {
            EngineEvent::NewSuggestion { user_id, suggestion } => {
                assert_eq!(user_id, "u1");
                assert_eq!(suggestion.id, id);
            }
            _ => panic!("Expected NewSuggestion"),
        }
    }

    #[tokio::test]
    async fn cancel_before_fire() {
        let scheduler = scheduler();
        let id = scheduler
            .schedule_once(
                Utc::now() + chrono::Duration::seconds(30),
                "never",
                None,
                None,
            )
            .await
            .unwrap();

        assert!(scheduler.cancel_scheduled(id).await);
        // Cancelling twice is safe
        assert!(!scheduler.cancel_scheduled(id).await);

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.active().await.is_empty());
    }

    #[tokio::test]
    async fn fired_one_shot_leaves_no_stale_timer_entry() {
        let scheduler = scheduler();
        // Near-zero delay: the timer task can run before schedule_once
        // returns, and its cleanup must still win
        let id = scheduler
            .schedule_once(
                Utc::now() + chrono::Duration::milliseconds(1),
                "now-ish",
                None,
                None,
            )
            .await
            .unwrap();

        tokio::time::sleep(Duration::from_millis(100)).await;

        assert_eq!(scheduler.active().await.len(), 1);
        assert!(scheduler.timers.lock().await.is_empty());
        // Nothing left to cancel once the timer has fired
        assert!(!scheduler.cancel_scheduled(id).await);
    }

    #[tokio::test]
    async fn scenario_e_dismiss_twice_is_safe() {
        let scheduler = scheduler();
        scheduler
            .emit(SmartSuggestion::new(
                "s",
                TriggerKind::DataCondition,
                Priority::High,
            ))
            .await;
        let id = scheduler.active().await[0].id;

        assert!(scheduler.dismiss(id).await);
        assert!(!scheduler.dismiss(id).await);
        assert!(scheduler.active().await.is_empty());
    }

    #[tokio::test]
    async fn expired_suggestions_hidden_but_stored() {
        let scheduler = scheduler();
        scheduler
            .emit(
                SmartSuggestion::new("old", TriggerKind::TimeOfDay, Priority::Low)
                    .with_expiry(Utc::now() - chrono::Duration::minutes(1)),
            )
            .await;

        assert!(scheduler.active().await.is_empty());
        assert_eq!(scheduler.stored_count().await, 1);

        assert_eq!(scheduler.purge_expired().await, 1);
        assert_eq!(scheduler.stored_count().await, 0);
    }

    #[tokio::test]
    async fn data_trigger_fires_on_matching_snapshot() {
        let scheduler = scheduler();
        scheduler
            .register_data_trigger(
                "weather",
                Box::new(|snapshot| snapshot["condition"] == "storm"),
                "Storms forecast at your destination — check your plans.",
                Priority::High,
            )
            .await;

        let calm = serde_json::json!({"condition": "clear"});
        assert_eq!(scheduler.evaluate_snapshot("weather", &calm).await, 0);

        let storm = serde_json::json!({"condition": "storm"});
        assert_eq!(scheduler.evaluate_snapshot("weather", &storm).await, 1);

        // Snapshots for other sources don't touch this trigger
        assert_eq!(scheduler.evaluate_snapshot("expenses", &storm).await, 0);

        let active = scheduler.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].priority, Priority::High);
        assert_eq!(active[0].trigger, TriggerKind::DataCondition);
    }

    #[tokio::test]
    async fn tick_replaces_previous_recurring_batch() {
        let scheduler = scheduler();
        let model = warm_model();
        let now = Utc::now();

        scheduler.tick(now, &model, "dashboard").await;
        let first = scheduler.active().await.len();
        assert!(first >= 2, "time-of-day + predictive expected");

        scheduler.tick(now, &model, "dashboard").await;
        assert_eq!(scheduler.active().await.len(), first);
    }

    #[tokio::test]
    async fn tick_does_not_displace_scheduled_or_data_suggestions() {
        let scheduler = scheduler();
        scheduler
            .emit(SmartSuggestion::new(
                "from a data trigger",
                TriggerKind::DataCondition,
                Priority::High,
            ))
            .await;

        scheduler.tick(Utc::now(), &warm_model(), "dashboard").await;

        let active = scheduler.active().await;
        assert!(
            active
                .iter()
                .any(|s| s.trigger == TriggerKind::DataCondition)
        );
    }

    #[tokio::test]
    async fn cold_model_tick_emits_only_time_of_day() {
        let scheduler = scheduler();
        let model = BehaviorModel::new(&EngineConfig::default());

        scheduler.tick(Utc::now(), &model, "dashboard").await;

        let active = scheduler.active().await;
        assert_eq!(active.len(), 1);
        assert_eq!(active[0].trigger, TriggerKind::TimeOfDay);
    }

    #[tokio::test]
    async fn teardown_cancels_all_pending_timers() {
        let scheduler = scheduler();
        for _ in 0..3 {
            scheduler
                .schedule_once(
                    Utc::now() + chrono::Duration::seconds(30),
                    "pending",
                    None,
                    None,
                )
                .await
                .unwrap();
        }
        scheduler.cancel_all_scheduled().await;
        // Idempotent
        scheduler.cancel_all_scheduled().await;

        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(scheduler.active().await.is_empty());
    }
}
