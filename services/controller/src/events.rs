//! Fire-and-forget publication of lifecycle events.
//!
//! Publishing never fails from the caller's point of view. A sink that cannot
//! deliver (for example because nobody is subscribed) logs and moves on; the
//! orchestration call that produced the event has already committed.

use std::sync::atomic::{AtomicU64, Ordering};

use fleet_events::{EventEnvelope, FleetEvent};
use fleet_id::EventId;
use tokio::sync::broadcast;
use tracing::{debug, info};

/// Channel capacity for broadcast.
const CHANNEL_CAPACITY: usize = 1024;

/// Destination for lifecycle events.
pub trait EventSink: Send + Sync {
    /// Publishes `event` on `topic`. Best effort, never blocks.
    fn publish(&self, topic: &str, event: FleetEvent);
}

/// In-process sink backed by a tokio broadcast channel.
///
/// Slow subscribers lag and lose the oldest events rather than slowing the
/// publisher down; the envelope's `event_id` lets them notice the gap.
pub struct BroadcastEventSink {
    sender: broadcast::Sender<EventEnvelope>,
    next_id: AtomicU64,
}

impl BroadcastEventSink {
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(CHANNEL_CAPACITY);
        info!(capacity = CHANNEL_CAPACITY, "Broadcast event sink initialized");
        Self {
            sender,
            next_id: AtomicU64::new(1),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<EventEnvelope> {
        self.sender.subscribe()
    }
}

impl Default for BroadcastEventSink {
    fn default() -> Self {
        Self::new()
    }
}

impl EventSink for BroadcastEventSink {
    fn publish(&self, topic: &str, event: FleetEvent) {
        let event_id = EventId::new(self.next_id.fetch_add(1, Ordering::SeqCst));
        let envelope = EventEnvelope::new(event_id, topic, event);

        match self.sender.send(envelope) {
            Ok(receivers) => debug!(%event_id, topic, receivers, "Published event"),
            Err(broadcast::error::SendError(envelope)) => debug!(
                %event_id,
                topic,
                event_type = %envelope.event_type,
                "No subscribers for event"
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use fleet_events::{Cause, EVENT_TOPIC};
    use fleet_id::{HostId, ServerId};
    use fleet_model::{Server, ServerState};

    use super::*;

    fn server() -> Server {
        let now = Utc::now();
        Server {
            id: ServerId::new(),
            group: "lobby".into(),
            server_type: "lobby".into(),
            numeric_id: 1,
            host_id: HostId::new(),
            address: "10.0.0.4".into(),
            port: 30000,
            memory_min_mb: 512,
            memory_max_mb: 1024,
            max_players: 10,
            player_count: 0,
            properties: BTreeMap::new(),
            state: ServerState::Online,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let sink = BroadcastEventSink::new();
        sink.publish(EVENT_TOPIC, FleetEvent::started(server(), Cause::Api));
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let sink = BroadcastEventSink::new();
        let mut rx = sink.subscribe();

        sink.publish(EVENT_TOPIC, FleetEvent::started(server(), Cause::ScaleUp));
        sink.publish(EVENT_TOPIC, FleetEvent::stopped(server(), Cause::Api));

        let first = rx.recv().await.unwrap();
        let second = rx.recv().await.unwrap();
        assert_eq!(first.event_type, "server.started");
        assert_eq!(second.event_type, "server.stopped");
        assert!(first.event_id < second.event_id);
        assert_eq!(second.topic, EVENT_TOPIC);
    }
}
