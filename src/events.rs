//! Realtime event hub
//!
//! In-process replacement for the hosted change feed: mutations publish
//! typed events onto per-submission and per-user broadcast channels, and the
//! SSE endpoints stream them to open viewers. A subscription is cancelled by
//! dropping its receiver; the hub unregisters a channel when a publish finds
//! no receivers left, so switching the viewed submission cannot cause
//! duplicate delivery through a stale channel.
//!
//! A poster's own message is delivered back on the feed like everyone
//! else's; there is no dedup key.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;
use tokio::sync::broadcast;
use uuid::Uuid;

use crate::models::{Notification, SubmissionMessage, SubmissionStatus};

/// Channel granularity: one per open submission, one per signed-in user
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Topic {
    Submission(Uuid),
    User(Uuid),
}

#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PortalEvent {
    MessagePosted {
        message: SubmissionMessage,
    },
    StatusChanged {
        submission_id: Uuid,
        request_no: String,
        status: SubmissionStatus,
    },
    NotificationCreated {
        notification: Notification,
    },
}

const CHANNEL_CAPACITY: usize = 64;

pub struct EventHub {
    channels: Mutex<HashMap<Topic, broadcast::Sender<PortalEvent>>>,
}

impl EventHub {
    pub fn new() -> Self {
        Self {
            channels: Mutex::new(HashMap::new()),
        }
    }

    /// Open a subscription on a topic. Dropping the receiver cancels it.
    pub fn subscribe(&self, topic: Topic) -> broadcast::Receiver<PortalEvent> {
        let mut channels = self.channels.lock().expect("event hub lock poisoned");
        channels
            .entry(topic)
            .or_insert_with(|| broadcast::channel(CHANNEL_CAPACITY).0)
            .subscribe()
    }

    /// Deliver an event to every live subscriber of a topic. Channels whose
    /// last subscriber has gone are unregistered here.
    pub fn publish(&self, topic: Topic, event: PortalEvent) {
        let mut channels = self.channels.lock().expect("event hub lock poisoned");
        let all_receivers_gone = match channels.get(&topic) {
            Some(tx) => tx.send(event).is_err(),
            None => false,
        };
        if all_receivers_gone {
            channels.remove(&topic);
        }
    }
}

impl Default for EventHub {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use crate::models::SenderRole;

    fn message_event(submission_id: Uuid) -> PortalEvent {
        PortalEvent::MessagePosted {
            message: SubmissionMessage {
                id: Uuid::new_v4(),
                submission_id,
                sender: SenderRole::Client,
                body: "hello".to_string(),
                created_at: Utc::now(),
            },
        }
    }

    #[tokio::test]
    async fn delivers_to_same_topic_subscriber() {
        let hub = EventHub::new();
        let sub_id = Uuid::new_v4();
        let mut rx = hub.subscribe(Topic::Submission(sub_id));

        hub.publish(Topic::Submission(sub_id), message_event(sub_id));

        let event = rx.recv().await.unwrap();
        assert!(matches!(event, PortalEvent::MessagePosted { .. }));
    }

    #[tokio::test]
    async fn does_not_cross_topics() {
        let hub = EventHub::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();
        let mut rx_b = hub.subscribe(Topic::Submission(b));

        hub.publish(Topic::Submission(a), message_event(a));

        assert!(matches!(
            rx_b.try_recv(),
            Err(broadcast::error::TryRecvError::Empty)
        ));
    }

    #[tokio::test]
    async fn unregisters_channel_after_last_receiver_drops() {
        let hub = EventHub::new();
        let sub_id = Uuid::new_v4();
        let rx = hub.subscribe(Topic::Submission(sub_id));
        drop(rx);

        hub.publish(Topic::Submission(sub_id), message_event(sub_id));

        let channels = hub.channels.lock().unwrap();
        assert!(!channels.contains_key(&Topic::Submission(sub_id)));
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_noop() {
        let hub = EventHub::new();
        hub.publish(Topic::User(Uuid::new_v4()), message_event(Uuid::new_v4()));
        assert!(hub.channels.lock().unwrap().is_empty());
    }
}
