//! Registered worker hosts, placement, and reattachment.
//!
//! Registering a host (again) makes the controller ask that host about every
//! server it is recorded as owning. Servers the host still knows are refreshed
//! from its answer. Servers it does not know, or cannot answer for in time, are
//! purged: their record is deleted, their numeric id released, and a stop
//! event with cause `HOST_LOST` is published.

use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::Duration;

use fleet_events::{Cause, FleetEvent, EVENT_TOPIC};
use fleet_id::{HostId, ServerId};
use fleet_model::{HostDescriptor, Server};
use futures_util::future::join_all;
use serde::Serialize;
use tracing::{info, instrument, warn};

use crate::agent::{self, AgentError, HostAgentClient};
use crate::allocator::NumericIdAllocator;
use crate::events::EventSink;
use crate::store::ServerStore;

/// Outcome of a reattachment sweep.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ReattachReport {
    pub reattached: Vec<ServerId>,
    pub purged: Vec<ServerId>,
}

/// Known hosts in registration order.
pub struct HostRegistry {
    hosts: RwLock<Vec<HostDescriptor>>,
    store: Arc<ServerStore>,
    allocator: Arc<NumericIdAllocator>,
    agent: Arc<dyn HostAgentClient>,
    events: Arc<dyn EventSink>,
    agent_timeout: Duration,
}

impl HostRegistry {
    pub fn new(
        store: Arc<ServerStore>,
        allocator: Arc<NumericIdAllocator>,
        agent: Arc<dyn HostAgentClient>,
        events: Arc<dyn EventSink>,
        agent_timeout: Duration,
    ) -> Self {
        Self {
            hosts: RwLock::new(Vec::new()),
            store,
            allocator,
            agent,
            events,
            agent_timeout,
        }
    }

    fn read(&self) -> RwLockReadGuard<'_, Vec<HostDescriptor>> {
        self.hosts.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, Vec<HostDescriptor>> {
        self.hosts.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn get(&self, id: &HostId) -> Option<HostDescriptor> {
        self.read().iter().find(|h| h.id == *id).cloned()
    }

    pub fn list(&self) -> Vec<HostDescriptor> {
        self.read().clone()
    }

    /// Picks the host owning the fewest servers. Ties go to the host
    /// registered first.
    pub fn select_for_placement(&self) -> Option<HostDescriptor> {
        self.read()
            .iter()
            .min_by_key(|host| self.store.count_on_host(&host.id))
            .cloned()
    }

    /// Registers `host`, replacing an earlier registration with the same id,
    /// then reconciles the servers recorded under it.
    #[instrument(skip_all, fields(host_id = %host.id, address = %host.address))]
    pub async fn register(&self, host: HostDescriptor) -> ReattachReport {
        let replaced = {
            let mut hosts = self.write();
            match hosts.iter_mut().find(|h| h.id == host.id) {
                Some(existing) => {
                    *existing = host.clone();
                    true
                }
                None => {
                    hosts.push(host.clone());
                    false
                }
            }
        };
        info!(replaced, endpoint = %host.endpoint, "Host registered");

        let owned: Vec<Server> = self
            .store
            .by_host(&host.id)
            .into_iter()
            .filter(|server| !self.store.is_launching(&server.id))
            .collect();

        if owned.is_empty() {
            return ReattachReport::default();
        }

        let answers = join_all(owned.iter().map(|server| {
            let host = &host;
            async move {
                let answer = agent::with_timeout(
                    self.agent_timeout,
                    self.agent.reattach(host, server),
                )
                .await
                .and_then(|theirs| agent::merge_confirmed(server, theirs));
                (server, answer)
            }
        }))
        .await;

        let mut report = ReattachReport::default();
        for (server, answer) in answers {
            match answer {
                Ok(confirmed) => match self.store.replace(confirmed) {
                    Ok(true) => report.reattached.push(server.id),
                    Ok(false) => {}
                    Err(e) => warn!(
                        server_id = %server.id,
                        error = %e,
                        "Failed to store reattached server"
                    ),
                },
                Err(e) => {
                    if self.purge(server, &e) {
                        report.purged.push(server.id);
                    }
                }
            }
        }

        info!(
            reattached = report.reattached.len(),
            purged = report.purged.len(),
            "Reattachment sweep complete"
        );
        report
    }

    fn purge(&self, server: &Server, cause: &AgentError) -> bool {
        warn!(
            server_id = %server.id,
            name = %server.display_name(),
            error = %cause,
            "Host lost server, purging"
        );

        match self.store.remove(&server.id) {
            Ok(Some(removed)) => {
                self.allocator.release(&removed.group, removed.numeric_id);
                self.events
                    .publish(EVENT_TOPIC, FleetEvent::stopped(removed, Cause::HostLost));
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(server_id = %server.id, error = %e, "Failed to purge server");
                false
            }
        }
    }
}
