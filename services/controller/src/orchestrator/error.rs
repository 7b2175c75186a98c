//! Orchestration errors.

use fleet_id::{HostId, ServerId};
use thiserror::Error;

use crate::agent::AgentError;
use crate::store::StoreError;

/// Result type for orchestration calls.
pub type OrchestratorResult<T> = Result<T, OrchestratorError>;

/// Coarse classification callers branch on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A referenced group, server or host does not exist. Not retryable.
    NotFound,
    /// A host or the backing store failed. State has been rolled back.
    Internal,
}

#[derive(Debug, Error)]
pub enum OrchestratorError {
    #[error("group not found: {0}")]
    GroupNotFound(String),

    #[error("server not found: {0}")]
    ServerNotFound(ServerId),

    #[error("server {group}-{numeric_id} not found")]
    NumericNotFound { group: String, numeric_id: u32 },

    #[error("host not found: {0}")]
    HostNotFound(HostId),

    #[error("no host available for placement")]
    NoHostAvailable,

    #[error("server {0} is still launching")]
    LaunchInProgress(ServerId),

    #[error("server {0} was removed while its launch was in flight")]
    Superseded(ServerId),

    #[error("host agent call failed: {0}")]
    Agent(#[from] AgentError),

    #[error("storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("orchestration task failed: {0}")]
    Task(String),
}

impl OrchestratorError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::GroupNotFound(_)
            | Self::ServerNotFound(_)
            | Self::NumericNotFound { .. }
            | Self::HostNotFound(_)
            | Self::NoHostAvailable => ErrorKind::NotFound,
            Self::LaunchInProgress(_)
            | Self::Superseded(_)
            | Self::Agent(_)
            | Self::Storage(_)
            | Self::Task(_) => ErrorKind::Internal,
        }
    }
}
