//! Remote call surface of a worker host.
//!
//! The controller never starts processes itself. It asks the agent running on
//! a host to launch, terminate, or reattach a server and trusts the record the
//! agent sends back. Every call is bounded by a timeout; a timeout is reported
//! as [`AgentError::Timeout`] and handled exactly like a transport failure.

mod http;
mod mock;

pub use http::HttpHostAgentClient;
pub use mock::MockHostAgent;

use std::future::Future;
use std::time::Duration;

use async_trait::async_trait;
use fleet_model::{Group, HostDescriptor, Server};
use thiserror::Error;

/// Why a call to a host agent failed.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("host rejected request with status {status}: {body}")]
    Rejected { status: u16, body: String },

    #[error("host did not answer within {0:?}")]
    Timeout(Duration),

    #[error("malformed response: {0}")]
    Malformed(String),

    #[error("host unreachable: {0}")]
    Unreachable(String),
}

/// Operations a host agent exposes to the controller.
///
/// Each call returns the host's view of the server, which the controller
/// stores as the confirmed definition.
#[async_trait]
pub trait HostAgentClient: Send + Sync {
    /// Starts a process for a provisional server record.
    async fn launch(
        &self,
        host: &HostDescriptor,
        group: &Group,
        server: &Server,
    ) -> Result<Server, AgentError>;

    /// Stops a server's process.
    async fn terminate(&self, host: &HostDescriptor, server: &Server) -> Result<Server, AgentError>;

    /// Confirms a server is still running after its host re-registered.
    async fn reattach(&self, host: &HostDescriptor, server: &Server) -> Result<Server, AgentError>;
}

/// Runs an agent call, turning an elapsed deadline into [`AgentError::Timeout`].
pub async fn with_timeout<F>(timeout: Duration, call: F) -> Result<Server, AgentError>
where
    F: Future<Output = Result<Server, AgentError>>,
{
    match tokio::time::timeout(timeout, call).await {
        Ok(result) => result,
        Err(_) => Err(AgentError::Timeout(timeout)),
    }
}

/// Accepts a host's record while keeping the fields the controller owns.
///
/// Hosts report address, port, state, load and properties. Identity,
/// placement and creation time stay as the controller assigned them.
pub fn merge_confirmed(ours: &Server, theirs: Server) -> Result<Server, AgentError> {
    if theirs.id != ours.id {
        return Err(AgentError::Malformed(format!(
            "host answered for {} while asked about {}",
            theirs.id, ours.id
        )));
    }

    Ok(Server {
        group: ours.group.clone(),
        server_type: ours.server_type.clone(),
        numeric_id: ours.numeric_id,
        host_id: ours.host_id,
        created_at: ours.created_at,
        updated_at: chrono::Utc::now(),
        ..theirs
    })
}
