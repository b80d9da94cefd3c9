//! Event types and per-user EventBus
//!
//! Events are ephemeral: they are addressed to a user at publish time and
//! delivered to whatever receivers that user currently holds. Nothing is
//! queued for users who are not listening.

use crate::{DialId, UserId};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tokio::sync::broadcast;

/// WTF Dial event types
///
/// Serialized with a `type` tag so subscribers can dispatch on it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum WtfEvent {
    /// A dial's aggregate value changed
    ///
    /// Published once per member each time a recompute commits a new value.
    DialValueChanged {
        /// Dial whose value changed
        dial_id: DialId,
        /// New aggregate value
        value: i64,
    },
}

impl WtfEvent {
    /// Get event type as string
    pub fn event_type(&self) -> &str {
        match self {
            WtfEvent::DialValueChanged { .. } => "DialValueChanged",
        }
    }
}

/// Delivery failure reported by a publisher
#[derive(Error, Debug)]
pub enum PublishError {
    /// Nobody is listening for this user
    #[error("no subscribers for user {0}")]
    NoSubscribers(UserId),

    /// Transport-level failure
    #[error("delivery failed: {0}")]
    Delivery(String),
}

/// Fire-and-forget delivery of events to users
///
/// Callers log a returned error and move on; delivery is never retried and
/// never awaited.
pub trait EventPublisher: Send + Sync {
    fn publish_event(&self, user_id: UserId, event: WtfEvent) -> Result<(), PublishError>;
}

/// In-process event bus with one broadcast channel per user
///
/// Channels are created on first subscription and dropped once the last
/// receiver for a user goes away.
#[derive(Clone)]
pub struct EventBus {
    channels: Arc<Mutex<HashMap<UserId, broadcast::Sender<WtfEvent>>>>,
    capacity: usize,
}

impl EventBus {
    /// Creates a new EventBus
    ///
    /// * `capacity` - events buffered per user before the oldest are dropped
    pub fn new(capacity: usize) -> Self {
        Self {
            channels: Arc::new(Mutex::new(HashMap::new())),
            capacity: capacity.max(1),
        }
    }

    /// Subscribe to all future events addressed to `user_id`
    pub fn subscribe(&self, user_id: UserId) -> broadcast::Receiver<WtfEvent> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels
            .entry(user_id)
            .or_insert_with(|| broadcast::channel(self.capacity).0)
            .subscribe()
    }

    /// Number of live receivers for a user
    pub fn subscriber_count(&self, user_id: UserId) -> usize {
        let channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        channels.get(&user_id).map_or(0, |tx| tx.receiver_count())
    }

    /// Get the configured per-user channel capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

impl EventPublisher for EventBus {
    fn publish_event(&self, user_id: UserId, event: WtfEvent) -> Result<(), PublishError> {
        let mut channels = self.channels.lock().unwrap_or_else(|e| e.into_inner());
        let Some(tx) = channels.get(&user_id) else {
            return Err(PublishError::NoSubscribers(user_id));
        };

        if tx.send(event).is_err() {
            // Every receiver is gone.
            channels.remove(&user_id);
            return Err(PublishError::NoSubscribers(user_id));
        }
        Ok(())
    }
}
