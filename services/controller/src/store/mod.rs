//! Server and group persistence.
//!
//! The orchestration engine reads and writes servers through [`ServerStore`],
//! an in-memory index over a durable [`ServerRepository`]. Groups belong to an
//! external collaborator and are reached only through [`GroupRepository`].
//!
//! The shipped backend is SQLite ([`Database`]), which implements both
//! repository traits on one file.

mod servers;
mod sqlite;

pub use servers::ServerStore;
pub use sqlite::Database;

use fleet_id::ServerId;
use fleet_model::{Group, Server};
use thiserror::Error;

/// Errors from persistence operations.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Durable backing for live servers.
pub trait ServerRepository: Send + Sync {
    /// Every persisted server, used to rebuild the store on startup.
    fn load_servers(&self) -> Result<Vec<Server>, StoreError>;

    /// Inserts or replaces one server.
    fn save_server(&self, server: &Server) -> Result<(), StoreError>;

    /// Removes one server. Removing a missing server is not an error.
    fn delete_server(&self, id: &ServerId) -> Result<(), StoreError>;
}

/// Key-value store for group definitions.
pub trait GroupRepository: Send + Sync {
    fn load_groups(&self) -> Result<Vec<Group>, StoreError>;

    fn find_group(&self, name: &str) -> Result<Option<Group>, StoreError>;

    /// Inserts or replaces a group.
    fn save_group(&self, group: &Group) -> Result<(), StoreError>;

    /// Returns false if no group had that name.
    fn delete_group(&self, name: &str) -> Result<bool, StoreError>;
}
