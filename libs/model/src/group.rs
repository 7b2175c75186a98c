//! Group records.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::ModelError;

/// Which scaling policy the reconciliation loop applies to a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ScalingPolicyKind {
    /// Start servers when too few available servers are below the player ratio.
    #[default]
    PlayerRatio,
    /// Keep a fixed share of player slots free across available servers.
    SlotRatio,
}

impl std::fmt::Display for ScalingPolicyKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ScalingPolicyKind::PlayerRatio => write!(f, "player_ratio"),
            ScalingPolicyKind::SlotRatio => write!(f, "slot_ratio"),
        }
    }
}

/// A named pool of interchangeable servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Group {
    /// Unique group name; also the key in the group store.
    pub name: String,

    /// Instance type tag, used for type lookups.
    pub server_type: String,

    /// Minimum memory per server in megabytes.
    pub memory_min_mb: u32,

    /// Maximum memory per server in megabytes.
    pub memory_max_mb: u32,

    /// Port of the server with numeric id 1; later ids count up from here.
    pub start_port: u16,

    /// Servers that should be available below the player ratio.
    pub min_online_count: u32,

    /// Hard cap on servers in this group.
    pub max_online_count: u32,

    /// Player slots per server.
    pub max_players: u32,

    /// Load percentage (0-100) at which a server counts as nearly full.
    pub new_instance_ratio: u32,

    #[serde(default)]
    pub scaling_policy: ScalingPolicyKind,

    /// Free-form properties copied onto every new server.
    #[serde(default)]
    pub properties: BTreeMap<String, String>,
}

impl Group {
    /// Checks field bounds.
    pub fn validate(&self) -> Result<(), ModelError> {
        if self.name.trim().is_empty() {
            return Err(ModelError::Empty { field: "name" });
        }
        if self.server_type.trim().is_empty() {
            return Err(ModelError::Empty {
                field: "server_type",
            });
        }
        if self.memory_min_mb > self.memory_max_mb {
            return Err(ModelError::InvertedBounds {
                field: "memory_mb",
                min: self.memory_min_mb.into(),
                max: self.memory_max_mb.into(),
            });
        }
        if self.min_online_count > self.max_online_count {
            return Err(ModelError::InvertedBounds {
                field: "online_count",
                min: self.min_online_count.into(),
                max: self.max_online_count.into(),
            });
        }
        if self.max_players == 0 {
            return Err(ModelError::OutOfRange {
                field: "max_players",
                message: "must be at least 1".to_string(),
            });
        }
        if self.new_instance_ratio > 100 {
            return Err(ModelError::OutOfRange {
                field: "new_instance_ratio",
                message: format!("{} is not a percentage", self.new_instance_ratio),
            });
        }
        Ok(())
    }
}
