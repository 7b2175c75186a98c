//! Host descriptors.

use fleet_id::HostId;
use serde::{Deserialize, Serialize};

/// A worker agent able to launch and terminate servers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HostDescriptor {
    pub id: HostId,

    /// Address servers on this host are reachable at.
    pub address: String,

    /// Base URL of the agent's HTTP surface, e.g. `http://10.0.0.4:7070`.
    pub endpoint: String,
}
