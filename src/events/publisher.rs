//! # Telemetry Event Publisher
//!
//! Process-wide, fire-and-forget event bus for resilience telemetry.
//!
//! Events go out on a tokio broadcast channel (for async consumers such as the
//! [`EventAggregator`](super::EventAggregator)) and to synchronous handlers
//! registered per event name. Publishing never fails from the caller's point of
//! view: a missing subscriber, a lagging receiver or a panicking handler is
//! logged and swallowed.
//!
//! ```rust
//! use llm_resilience::events::EventPublisher;
//! use serde_json::json;
//!
//! # tokio_test::block_on(async {
//! let publisher = EventPublisher::new(16);
//! let mut receiver = publisher.subscribe();
//!
//! publisher.publish("call.succeeded", json!({"resource": "openai"}));
//!
//! let event = receiver.recv().await.unwrap();
//! assert_eq!(event.name, "call.succeeded");
//! # });
//! ```

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{trace, warn};
use uuid::Uuid;

/// Synchronous handler invoked for every event with a matching name
type EventHandler = Arc<dyn Fn(&PublishedEvent) + Send + Sync>;

/// Event that has been published
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PublishedEvent {
    pub event_id: Uuid,
    pub name: String,
    pub context: Value,
    pub published_at: DateTime<Utc>,
}

impl PublishedEvent {
    /// Resource name carried in the event context, if any
    pub fn resource(&self) -> Option<&str> {
        self.context.get("resource").and_then(Value::as_str)
    }
}

/// Broadcast-backed event publisher; clones share the same bus
#[derive(Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
    handlers: Arc<RwLock<HashMap<String, Vec<EventHandler>>>>,
}

impl std::fmt::Debug for EventPublisher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventPublisher")
            .field("subscribers", &self.sender.receiver_count())
            .field("handler_names", &self.handlers.read().len())
            .finish()
    }
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender,
            handlers: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Publish an event with the given name and context
    pub fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = PublishedEvent {
            event_id: Uuid::new_v4(),
            name: event_name.into(),
            context,
            published_at: Utc::now(),
        };

        self.dispatch_to_handlers(&event);

        // send() only fails when nobody is subscribed, which is fine for telemetry
        if self.sender.send(event).is_err() {
            trace!("No telemetry subscribers");
        }
    }

    fn dispatch_to_handlers(&self, event: &PublishedEvent) {
        let handlers = {
            let registered = self.handlers.read();
            match registered.get(&event.name) {
                Some(handlers) => handlers.clone(),
                None => return,
            }
        };

        for handler in handlers {
            if catch_unwind(AssertUnwindSafe(|| handler(event))).is_err() {
                warn!(event = %event.name, "Telemetry handler panicked; event dropped for that handler");
            }
        }
    }

    /// Subscribe to every event
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Register a synchronous handler for one event name
    pub fn on<F>(&self, event_name: impl Into<String>, handler: F)
    where
        F: Fn(&PublishedEvent) + Send + Sync + 'static,
    {
        self.handlers
            .write()
            .entry(event_name.into())
            .or_default()
            .push(Arc::new(handler));
    }

    /// Drop every handler registered for `event_name`
    pub fn clear_handlers(&self, event_name: &str) {
        self.handlers.write().remove(event_name);
    }

    /// Get the number of active broadcast subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(crate::constants::defaults::EVENT_CHANNEL_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[tokio::test]
    async fn test_publish_without_subscribers_is_silent() {
        let publisher = EventPublisher::new(4);
        publisher.publish("call.failed", json!({"resource": "anthropic"}));
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_broadcast_subscriber_receives_events() {
        let publisher = EventPublisher::new(4);
        let mut receiver = publisher.subscribe();

        publisher.publish("circuit.created", json!({"resource": "anthropic"}));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, "circuit.created");
        assert_eq!(event.resource(), Some("anthropic"));
    }

    #[test]
    fn test_named_handlers_only_see_their_events() {
        let publisher = EventPublisher::new(4);
        let seen = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&seen);
        publisher.on("call.rejected", move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
        });

        publisher.publish("call.rejected", json!({"resource": "a"}));
        publisher.publish("call.succeeded", json!({"resource": "a"}));
        publisher.publish("call.rejected", json!({"resource": "b"}));

        assert_eq!(seen.load(Ordering::SeqCst), 2);

        publisher.clear_handlers("call.rejected");
        publisher.publish("call.rejected", json!({"resource": "a"}));
        assert_eq!(seen.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_panicking_handler_does_not_escape() {
        let publisher = EventPublisher::new(4);
        publisher.on("call.failed", |_| panic!("backend down"));

        publisher.publish("call.failed", json!({"resource": "a"}));
    }
}
