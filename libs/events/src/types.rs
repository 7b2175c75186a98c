//! Event payloads.

use chrono::{DateTime, Utc};
use fleet_model::Server;
use serde::{Deserialize, Serialize};

/// Event type names as constants.
pub mod event_types {
    pub const SERVER_STARTED: &str = "server.started";
    pub const SERVER_STOPPED: &str = "server.stopped";
    pub const SERVER_UPDATED: &str = "server.updated";
}

/// Why a server was started or stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Cause {
    /// The reconciliation loop found a deficit.
    ScaleUp,
    /// An explicit RPC call.
    #[default]
    Api,
    /// The owning host re-registered without the server.
    HostLost,
}

impl std::fmt::Display for Cause {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Cause::ScaleUp => write!(f, "SCALE_UP"),
            Cause::Api => write!(f, "API"),
            Cause::HostLost => write!(f, "HOST_LOST"),
        }
    }
}

/// A host confirmed a newly launched server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StartEvent {
    pub server: Server,
    pub cause: Cause,
    pub timestamp: DateTime<Utc>,
}

/// A server record was permanently removed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StopEvent {
    pub server: Server,
    pub cause: Cause,
    pub timestamp: DateTime<Utc>,
}

/// A server's state or a property was overridden.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateEvent {
    pub before: Server,
    pub after: Server,
    pub timestamp: DateTime<Utc>,
}

/// Any lifecycle event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FleetEvent {
    Start(StartEvent),
    Stop(StopEvent),
    Update(UpdateEvent),
}

impl FleetEvent {
    pub fn started(server: Server, cause: Cause) -> Self {
        FleetEvent::Start(StartEvent {
            server,
            cause,
            timestamp: Utc::now(),
        })
    }

    pub fn stopped(server: Server, cause: Cause) -> Self {
        FleetEvent::Stop(StopEvent {
            server,
            cause,
            timestamp: Utc::now(),
        })
    }

    pub fn updated(before: Server, after: Server) -> Self {
        FleetEvent::Update(UpdateEvent {
            before,
            after,
            timestamp: Utc::now(),
        })
    }

    /// Dotted event type name, e.g. `server.started`.
    pub fn event_type(&self) -> &'static str {
        match self {
            FleetEvent::Start(_) => event_types::SERVER_STARTED,
            FleetEvent::Stop(_) => event_types::SERVER_STOPPED,
            FleetEvent::Update(_) => event_types::SERVER_UPDATED,
        }
    }

    /// The server the event is about (the after-image for updates).
    pub fn server(&self) -> &Server {
        match self {
            FleetEvent::Start(e) => &e.server,
            FleetEvent::Stop(e) => &e.server,
            FleetEvent::Update(e) => &e.after,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            FleetEvent::Start(e) => e.timestamp,
            FleetEvent::Stop(e) => e.timestamp,
            FleetEvent::Update(e) => e.timestamp,
        }
    }
}
