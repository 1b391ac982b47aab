//! Event bus — in-process pub/sub for suggestion, insight, and status events.
//!
//! Fire-and-forget publish over a `tokio::sync::broadcast` channel, decoupled
//! from any UI runtime. Zero subscribers is not an error.

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tokio::task::JoinHandle;

use crate::insights::AiInsight;
use crate::suggestions::SmartSuggestion;

/// Default broadcast channel capacity.
const DEFAULT_BROADCAST_CAPACITY: usize = 256;

/// Coarse engine status, published on lifecycle changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    /// Engine is processing messages normally.
    Ready,
    /// The document store is unreachable; running in-memory only.
    Degraded,
    /// Engine is shutting down.
    Stopped,
}

/// Events published by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "kebab-case")]
pub enum EngineEvent {
    /// A new suggestion entered a user's active set.
    NewSuggestion {
        user_id: String,
        suggestion: SmartSuggestion,
    },
    /// A new insight was generated.
    NewInsight { insight: AiInsight },
    /// Engine status changed.
    StatusChanged { status: EngineStatus },
}

/// Broadcast-backed event bus shared across the engine.
#[derive(Clone)]
pub struct EventBus {
    tx: broadcast::Sender<EngineEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(DEFAULT_BROADCAST_CAPACITY);
        Self { tx }
    }

    /// Subscribe to all engine events.
    pub fn subscribe(&self) -> broadcast::Receiver<EngineEvent> {
        self.tx.subscribe()
    }

    /// Publish an event. Ok if no receivers are listening yet.
    pub fn publish(&self, event: EngineEvent) {
        let _ = self.tx.send(event);
    }

    /// Register a callback for status changes.
    ///
    /// The callback runs on a detached task; dropping the returned
    /// subscription (or calling [`StatusSubscription::unsubscribe`])
    /// stops delivery. Unsubscribing twice is safe.
    pub fn subscribe_status<F>(&self, callback: F) -> StatusSubscription
    where
        F: Fn(EngineStatus) + Send + Sync + 'static,
    {
        let mut rx = self.tx.subscribe();
        let callback = Arc::new(callback);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(EngineEvent::StatusChanged { status }) => callback(status),
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(_)) => {}
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        StatusSubscription {
            handle: Some(handle),
        }
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Handle for a status-callback subscription. Aborts the delivery task on
/// drop.
pub struct StatusSubscription {
    handle: Option<JoinHandle<()>>,
}

impl StatusSubscription {
    /// Stop delivering status events. Idempotent.
    pub fn unsubscribe(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }
}

impl Drop for StatusSubscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}
