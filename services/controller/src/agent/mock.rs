//! In-process host agent for tests and local development.

use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use fleet_id::ServerId;
use fleet_model::{Group, HostDescriptor, Server, ServerState};
use tracing::info;

use super::{AgentError, HostAgentClient};

/// Host agent that answers immediately (or after a fixed delay) without
/// starting anything.
#[derive(Debug, Default)]
pub struct MockHostAgent {
    launch_delay: Duration,
    fail_launch: AtomicBool,
    fail_terminate: AtomicBool,
    /// Servers whose reattach should fail, as if the host lost the process.
    lost: Mutex<HashSet<ServerId>>,
    launches: AtomicU64,
    terminations: AtomicU64,
    reattaches: AtomicU64,
}

impl MockHostAgent {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every launch take `delay` before answering.
    pub fn with_launch_delay(mut self, delay: Duration) -> Self {
        self.launch_delay = delay;
        self
    }

    pub fn set_fail_launch(&self, fail: bool) {
        self.fail_launch.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_terminate(&self, fail: bool) {
        self.fail_terminate.store(fail, Ordering::SeqCst);
    }

    /// Makes reattach fail for `id`.
    pub fn mark_lost(&self, id: ServerId) {
        self.lost
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .insert(id);
    }

    pub fn launch_count(&self) -> u64 {
        self.launches.load(Ordering::SeqCst)
    }

    pub fn terminate_count(&self) -> u64 {
        self.terminations.load(Ordering::SeqCst)
    }

    pub fn reattach_count(&self) -> u64 {
        self.reattaches.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl HostAgentClient for MockHostAgent {
    async fn launch(
        &self,
        host: &HostDescriptor,
        group: &Group,
        server: &Server,
    ) -> Result<Server, AgentError> {
        self.launches.fetch_add(1, Ordering::SeqCst);
        if !self.launch_delay.is_zero() {
            tokio::time::sleep(self.launch_delay).await;
        }

        if self.fail_launch.load(Ordering::SeqCst) {
            return Err(AgentError::Unreachable(
                "mock host configured to fail".to_string(),
            ));
        }

        info!(
            host_id = %host.id,
            group = %group.name,
            name = %server.display_name(),
            "[MOCK] Launching server"
        );

        Ok(Server {
            address: host.address.clone(),
            state: ServerState::Online,
            ..server.clone()
        })
    }

    async fn terminate(&self, host: &HostDescriptor, server: &Server) -> Result<Server, AgentError> {
        self.terminations.fetch_add(1, Ordering::SeqCst);
        if self.fail_terminate.load(Ordering::SeqCst) {
            return Err(AgentError::Rejected {
                status: 503,
                body: "mock host configured to fail".to_string(),
            });
        }

        info!(host_id = %host.id, name = %server.display_name(), "[MOCK] Terminating server");
        Ok(server.clone())
    }

    async fn reattach(&self, host: &HostDescriptor, server: &Server) -> Result<Server, AgentError> {
        self.reattaches.fetch_add(1, Ordering::SeqCst);
        let lost = self
            .lost
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .contains(&server.id);

        if lost {
            return Err(AgentError::Rejected {
                status: 404,
                body: format!("unknown server {}", server.id),
            });
        }

        info!(host_id = %host.id, name = %server.display_name(), "[MOCK] Reattached server");
        Ok(Server {
            address: host.address.clone(),
            ..server.clone()
        })
    }
}
