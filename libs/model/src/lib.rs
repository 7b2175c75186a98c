//! # fleet-model
//!
//! Records exchanged between the fleet controller, its RPC clients, and the
//! host agents that run servers.
//!
//! - [`Group`]: a named pool of interchangeable servers and its scaling bounds
//! - [`Server`]: one instance belonging to a group and placed on a host
//! - [`HostDescriptor`]: a worker agent reachable over HTTP
//!
//! Groups are owned by an external store and are read-only to the
//! orchestration engine. Servers are created, mutated and removed only by
//! the controller.

mod error;
mod group;
mod host;
mod server;

pub use error::ModelError;
pub use group::{Group, ScalingPolicyKind};
pub use host::HostDescriptor;
pub use server::{Server, ServerState};
