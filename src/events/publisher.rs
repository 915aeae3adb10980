use serde_json::Value;
use tokio::sync::broadcast;
use tracing::trace;

/// Broadcast publisher for lifecycle and resilience events
#[derive(Debug, Clone)]
pub struct EventPublisher {
    sender: broadcast::Sender<PublishedEvent>,
}

/// Event that has been published
#[derive(Debug, Clone)]
pub struct PublishedEvent {
    pub name: String,
    pub context: Value,
    pub published_at: chrono::DateTime<chrono::Utc>,
}

impl EventPublisher {
    /// Create a new event publisher with the specified channel capacity
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    /// Publish an event with the given name and context.
    ///
    /// Publishing with no subscribers is not an error; the event is dropped.
    pub fn publish(&self, event_name: impl Into<String>, context: Value) {
        let event = PublishedEvent {
            name: event_name.into(),
            context,
            published_at: chrono::Utc::now(),
        };

        if let Err(broadcast::error::SendError(dropped)) = self.sender.send(event) {
            trace!(event = %dropped.name, "No subscribers for published event");
        }
    }

    /// Subscribe to events
    pub fn subscribe(&self) -> broadcast::Receiver<PublishedEvent> {
        self.sender.subscribe()
    }

    /// Get the number of active subscribers
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventPublisher {
    fn default() -> Self {
        Self::new(1000)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let publisher = EventPublisher::new(4);
        publisher.publish("task_dispatched", json!({}));
        assert_eq!(publisher.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn test_subscriber_receives_event() {
        let publisher = EventPublisher::default();
        let mut receiver = publisher.subscribe();

        publisher.publish("circuit_opened", json!({"name": "vision"}));

        let event = receiver.recv().await.unwrap();
        assert_eq!(event.name, "circuit_opened");
        assert_eq!(event.context["name"], "vision");
    }
}
