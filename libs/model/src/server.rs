//! Server records and lifecycle states.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use fleet_id::{HostId, ServerId};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a server.
///
/// The controller only interprets `Preparing` (record exists, host has not
/// confirmed) and `Ingame` (busy, excluded from scaling). Hosts and operators
/// may report other states; those are kept upper-cased and trimmed in `Other`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum ServerState {
    Preparing,
    Online,
    Ingame,
    Other(String),
}

impl ServerState {
    /// Returns the canonical upper-case name of the state.
    pub fn as_str(&self) -> &str {
        match self {
            ServerState::Preparing => "PREPARING",
            ServerState::Online => "ONLINE",
            ServerState::Ingame => "INGAME",
            ServerState::Other(s) => s,
        }
    }

    /// Busy servers do not count as available capacity.
    pub fn is_busy(&self) -> bool {
        matches!(self, ServerState::Ingame)
    }
}

impl From<&str> for ServerState {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_uppercase().as_str() {
            "PREPARING" => ServerState::Preparing,
            "ONLINE" => ServerState::Online,
            "INGAME" => ServerState::Ingame,
            other => ServerState::Other(other.to_string()),
        }
    }
}

impl std::fmt::Display for ServerState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for ServerState {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for ServerState {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        Ok(ServerState::from(s.as_str()))
    }
}

/// One server instance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Server {
    pub id: ServerId,

    /// Owning group name.
    pub group: String,

    /// Instance type tag copied from the group.
    pub server_type: String,

    /// Unique within the group while the record exists.
    pub numeric_id: u32,

    pub host_id: HostId,
    pub address: String,
    pub port: u16,
    pub memory_min_mb: u32,
    pub memory_max_mb: u32,
    pub max_players: u32,

    #[serde(default)]
    pub player_count: u32,

    #[serde(default)]
    pub properties: BTreeMap<String, String>,

    pub state: ServerState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Server {
    /// Human-friendly name, e.g. `lobby-3`.
    pub fn display_name(&self) -> String {
        format!("{}-{}", self.group, self.numeric_id)
    }

    /// Current load as a percentage of player slots.
    pub fn load_percent(&self) -> u32 {
        if self.max_players == 0 {
            return 100;
        }
        let percent = u64::from(self.player_count) * 100 / u64::from(self.max_players);
        u32::try_from(percent).unwrap_or(u32::MAX)
    }

    /// Player slots still open on this server.
    pub fn free_slots(&self) -> u32 {
        self.max_players.saturating_sub(self.player_count)
    }
}
