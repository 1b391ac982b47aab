//! Engine façade — the public entry points the surrounding application
//! calls, with explicit per-user sessions instead of ambient globals.
//!
//! Message routing: an active flow consumes the text first; otherwise the
//! registry tries to activate one by trigger phrase; otherwise the text
//! falls through to the profile interview. Within one user's session,
//! messages are processed strictly in arrival order.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{debug, info};
use uuid::Uuid;

use crate::behavior::{ActivityEvent, BehaviorModel};
use crate::bus::{EngineEvent, EngineStatus, EventBus, StatusSubscription};
use crate::config::EngineConfig;
use crate::flows::engine::FlowEngine;
use crate::flows::registry::{FlowRegistry, context_prompt};
use crate::flows::model::StepAction;
use crate::insights::{AiInsight, InsightInputs, generate_insights};
use crate::memory::MemoryStore;
use crate::stages::{advance, stage_prompt};
use crate::store::DocumentStore;
use crate::suggestions::{
    Priority, SmartSuggestion, SuggestionPayload, SuggestionScheduler, TriggerPredicate,
};

/// What the engine hands back for one inbound message.
#[derive(Debug, Clone, PartialEq)]
pub struct EngineReply {
    /// Plain reply text for the caller to render.
    pub reply: String,
    /// Flow that is (still) active after this message, if any.
    pub active_flow: Option<String>,
    /// Side-effecting action for the caller to execute.
    pub action: Option<StepAction>,
}

/// Per-user session state. Constructed on first contact, destroyed on
/// teardown.
struct Session {
    /// Serializes message handling for this user.
    turn_lock: Mutex<()>,
    behavior: Mutex<BehaviorModel>,
    scheduler: Arc<SuggestionScheduler>,
    started_at: chrono::DateTime<Utc>,
}

/// The conversational core. One instance per process; sessions per user.
pub struct AssistantEngine {
    config: EngineConfig,
    registry: FlowRegistry,
    memory: MemoryStore,
    bus: EventBus,
    sessions: RwLock<HashMap<String, Arc<Session>>>,
    degraded: AtomicBool,
}

impl AssistantEngine {
    pub fn new(config: EngineConfig, store: Arc<dyn DocumentStore>) -> Arc<Self> {
        Self::with_registry(config, store, FlowRegistry::with_builtin_catalog())
    }

    /// Engine with a custom flow catalog.
    pub fn with_registry(
        config: EngineConfig,
        store: Arc<dyn DocumentStore>,
        registry: FlowRegistry,
    ) -> Arc<Self> {
        let bus = EventBus::new();
        bus.publish(EngineEvent::StatusChanged {
            status: EngineStatus::Ready,
        });
        info!(name = %config.name, "Engine ready");
        Arc::new(Self {
            config,
            registry,
            memory: MemoryStore::new(store),
            bus,
            sessions: RwLock::new(HashMap::new()),
            degraded: AtomicBool::new(false),
        })
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn registry(&self) -> &FlowRegistry {
        &self.registry
    }

    async fn session(&self, user_id: &str) -> Arc<Session> {
        if let Some(session) = self.sessions.read().await.get(user_id) {
            return Arc::clone(session);
        }
        let mut sessions = self.sessions.write().await;
        Arc::clone(sessions.entry(user_id.to_string()).or_insert_with(|| {
            debug!(user_id, "Session created");
            Arc::new(Session {
                turn_lock: Mutex::new(()),
                behavior: Mutex::new(BehaviorModel::new(&self.config)),
                scheduler: SuggestionScheduler::new(
                    user_id,
                    self.bus.clone(),
                    self.config.suggestion_ttl,
                ),
                started_at: Utc::now(),
            })
        }))
    }

    /// Flip the degraded flag, publishing a status event on transitions.
    fn note_persistence(&self, saved: bool) {
        let was_degraded = self.degraded.swap(!saved, Ordering::SeqCst);
        if was_degraded != !saved {
            let status = if saved {
                EngineStatus::Ready
            } else {
                EngineStatus::Degraded
            };
            self.bus.publish(EngineEvent::StatusChanged { status });
        }
    }

    /// Handle one inbound message.
    pub async fn process_message(
        &self,
        user_id: &str,
        context_tag: &str,
        text: &str,
    ) -> EngineReply {
        let session = self.session(user_id).await;
        let _turn = session.turn_lock.lock().await;

        let mut memory = self.memory.load(user_id).await;
        memory.reconcile(&self.registry);
        memory.active_context = context_tag.to_string();

        let flow_engine = FlowEngine::new(&self.registry);

        let reply = if memory.has_active_flow() {
            let outcome = flow_engine.submit_response(&mut memory, text);
            match outcome.question {
                Some(question) => EngineReply {
                    reply: question,
                    active_flow: memory.active_flow_id.clone(),
                    action: outcome.action,
                },
                None => {
                    let name = outcome
                        .completed
                        .as_ref()
                        .and_then(|c| self.registry.flow(&c.flow_id))
                        .map(|f| f.name.as_str())
                        .unwrap_or("that");
                    EngineReply {
                        reply: format!("That's everything I need for {name} — on it!"),
                        active_flow: None,
                        action: outcome.action,
                    }
                }
            }
        } else if let Some(flow) = self.registry.match_flow(text, &memory.active_context) {
            match flow_engine.start_flow(&mut memory, flow) {
                Some(question) => EngineReply {
                    reply: question,
                    active_flow: memory.active_flow_id.clone(),
                    action: None,
                },
                None => EngineReply {
                    reply: context_prompt(&memory.active_context).to_string(),
                    active_flow: None,
                    action: None,
                },
            }
        } else {
            let next = advance(memory.interview_stage, text, &mut memory.profile);
            memory.interview_stage = next;
            EngineReply {
                reply: stage_prompt(next).to_string(),
                active_flow: None,
                action: None,
            }
        };

        let saved = self.memory.save(user_id, &memory).await;
        self.note_persistence(saved);

        reply
    }

    /// Fold one tracked interaction into the user's behavior model. The
    /// context visit is always recorded; other signals per the event.
    pub async fn track_activity(&self, user_id: &str, context_tag: &str, event: ActivityEvent) {
        let session = self.session(user_id).await;
        let event = ActivityEvent {
            context_visited: Some(context_tag.to_string()),
            ..event
        };
        session.behavior.lock().await.track(&event, Utc::now());
        self.memory.patch_active_context(user_id, context_tag).await;
    }

    /// Run the stateless insight rules over batch domain data, publishing
    /// each result as a `new-insight` event.
    pub fn generate_insights(&self, inputs: &InsightInputs) -> Vec<AiInsight> {
        let insights = generate_insights(inputs, Utc::now());
        for insight in &insights {
            self.bus.publish(EngineEvent::NewInsight {
                insight: insight.clone(),
            });
        }
        insights
    }

    /// The user's active (non-expired) suggestions.
    pub async fn active_suggestions(&self, user_id: &str) -> Vec<SmartSuggestion> {
        self.session(user_id).await.scheduler.active().await
    }

    /// Dismiss a suggestion. Unknown ids (and repeat dismissals) are no-ops.
    pub async fn dismiss_suggestion(&self, user_id: &str, id: Uuid) -> bool {
        self.session(user_id).await.scheduler.dismiss(id).await
    }

    /// Schedule a one-shot suggestion; `None` for a past deadline.
    pub async fn schedule_suggestion(
        &self,
        user_id: &str,
        at: chrono::DateTime<Utc>,
        message: impl Into<String>,
        context_target: Option<String>,
        payload: Option<SuggestionPayload>,
    ) -> Option<Uuid> {
        self.session(user_id)
            .await
            .scheduler
            .schedule_once(at, message, context_target, payload)
            .await
    }

    /// Register a data-condition trigger for a user.
    pub async fn register_data_trigger(
        &self,
        user_id: &str,
        source_tag: impl Into<String>,
        predicate: TriggerPredicate,
        message: impl Into<String>,
        priority: Priority,
    ) -> Uuid {
        self.session(user_id)
            .await
            .scheduler
            .register_data_trigger(source_tag, predicate, message, priority)
            .await
    }

    /// Evaluate a data snapshot against the user's registered triggers.
    /// Returns the number of suggestions emitted.
    pub async fn evaluate_data_snapshot(
        &self,
        user_id: &str,
        source_tag: &str,
        snapshot: &Value,
    ) -> usize {
        self.session(user_id)
            .await
            .scheduler
            .evaluate_snapshot(source_tag, snapshot)
            .await
    }

    /// Register a status-change callback. Dropping the subscription (or
    /// calling `unsubscribe`, safely repeatable) stops delivery.
    pub fn subscribe_status<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(EngineStatus) + Send + Sync + 'static,
    {
        self.bus.subscribe_status(callback)
    }

    /// Run one recurring generation cycle for every live session.
    pub async fn tick_all(&self) {
        let sessions: Vec<(String, Arc<Session>)> = self
            .sessions
            .read()
            .await
            .iter()
            .map(|(id, s)| (id.clone(), Arc::clone(s)))
            .collect();

        let now = Utc::now();
        for (user_id, session) in sessions {
            let context = self.memory.load(&user_id).await.active_context;
            let model = session.behavior.lock().await;
            session.scheduler.tick(now, &model, &context).await;
            drop(model);
            session.scheduler.purge_expired().await;
        }
    }

    /// Tear down a user's session: cancel pending one-shots, fold the
    /// session duration into the model, drop the state. Unknown users are
    /// a no-op; tearing down twice is safe.
    pub async fn end_session(&self, user_id: &str) {
        let Some(session) = self.sessions.write().await.remove(user_id) else {
            return;
        };
        session.scheduler.cancel_all_scheduled().await;
        let secs = (Utc::now() - session.started_at).num_seconds().max(0) as f64;
        session.behavior.lock().await.track_session_duration(secs);
        info!(user_id, duration_secs = secs, "Session ended");
    }

    /// Shut the engine down: end every session and announce it.
    pub async fn stop(&self) {
        let user_ids: Vec<String> = self.sessions.read().await.keys().cloned().collect();
        for user_id in user_ids {
            self.end_session(&user_id).await;
        }
        self.bus.publish(EngineEvent::StatusChanged {
            status: EngineStatus::Stopped,
        });
        info!("Engine stopped");
    }
}

/// Spawn the recurring suggestion-generation task. Abort the returned
/// handle to stop it; aborting twice is safe.
pub fn spawn_tick_task(engine: Arc<AssistantEngine>) -> JoinHandle<()> {
    let interval = engine.config.tick_interval;
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        // The first interval tick fires immediately; skip it so the cadence
        // starts one interval after spawn.
        ticker.tick().await;
        loop {
            ticker.tick().await;
            engine.tick_all().await;
        }
    })
}
