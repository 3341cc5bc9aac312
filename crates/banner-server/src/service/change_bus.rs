//! Change bus
//!
//! Fan-out of accepted config mutations to subscribers. One broadcast
//! channel carries every project's events; subscribers filter on their
//! project id. Delivery is at-least-once and publish-ordered; a
//! disconnected subscriber misses events and re-bootstraps from the
//! snapshot cache on reconnect — there is no replay buffer.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

const CHANNEL_CAPACITY: usize = 1024;

/// A config-change frame as delivered to subscribers.
#[derive(Clone, Debug, Serialize)]
pub struct ChangeEvent {
    #[serde(skip)]
    pub project_id: Uuid,
    pub action: String,
    pub flag_key: String,
    pub environment: String,
    pub enabled: Option<bool>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Clone)]
pub struct ChangeBus {
    sender: broadcast::Sender<ChangeEvent>,
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new()
    }
}

impl ChangeBus {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        Self { sender }
    }

    /// Publish an event; a send with no live subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn event(project: u128, action: &str) -> ChangeEvent {
        ChangeEvent {
            project_id: Uuid::from_u128(project),
            action: action.to_string(),
            flag_key: "checkout".to_string(),
            environment: "production".to_string(),
            enabled: Some(true),
            timestamp: Utc::now(),
        }
    }

    #[tokio::test]
    async fn test_subscriber_receives_published_events_in_order() {
        let bus = ChangeBus::new();
        let mut rx = bus.subscribe();

        bus.publish(event(1, "flag_created"));
        bus.publish(event(1, "flag_toggled"));

        assert_eq!(rx.recv().await.unwrap().action, "flag_created");
        assert_eq!(rx.recv().await.unwrap().action, "flag_toggled");
    }

    #[tokio::test]
    async fn test_publish_without_subscribers_is_harmless() {
        let bus = ChangeBus::new();
        bus.publish(event(1, "flag_created"));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn test_wire_frame_shape() {
        let json = serde_json::to_value(event(7, "flag_toggled")).unwrap();
        assert_eq!(json["action"], "flag_toggled");
        assert_eq!(json["flag_key"], "checkout");
        assert_eq!(json["environment"], "production");
        assert_eq!(json["enabled"], true);
        assert!(json.get("project_id").is_none());
        assert!(json.get("timestamp").is_some());
    }
}
