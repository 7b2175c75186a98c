//! Event envelope - the wrapper every published event travels in.

use chrono::{DateTime, Utc};
use fleet_id::EventId;
use serde::{Deserialize, Serialize};

use crate::{EventError, FleetEvent};

/// The topic all lifecycle events are published on.
pub const EVENT_TOPIC: &str = "event";

/// A published event with its delivery metadata.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Monotonic publication counter.
    pub event_id: EventId,

    pub topic: String,

    /// The event type (e.g., "server.started").
    pub event_type: String,

    /// When the envelope was handed to the sink.
    pub published_at: DateTime<Utc>,

    pub event: FleetEvent,
}

impl EventEnvelope {
    pub fn new(event_id: EventId, topic: impl Into<String>, event: FleetEvent) -> Self {
        Self {
            event_id,
            topic: topic.into(),
            event_type: event.event_type().to_string(),
            published_at: Utc::now(),
            event,
        }
    }

    pub fn to_json(&self) -> Result<String, EventError> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self, EventError> {
        Ok(serde_json::from_str(json)?)
    }
}
