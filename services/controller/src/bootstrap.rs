//! Wiring of the orchestration components over one database.

use std::sync::Arc;

use tracing::info;

use crate::agent::HostAgentClient;
use crate::allocator::NumericIdAllocator;
use crate::events::BroadcastEventSink;
use crate::hosts::HostRegistry;
use crate::orchestrator::{OrchestratorSettings, ServerOrchestrator};
use crate::store::{Database, ServerStore, StoreError};

/// Everything the HTTP layer and the scheduler share.
pub struct Controller {
    pub db: Arc<Database>,
    pub store: Arc<ServerStore>,
    pub allocator: Arc<NumericIdAllocator>,
    pub hosts: Arc<HostRegistry>,
    pub events: Arc<BroadcastEventSink>,
    pub orchestrator: ServerOrchestrator,
}

impl Controller {
    /// Rebuilds the server store from `db` and reserves every numeric id it
    /// holds. Hosts start out unregistered; servers are reconciled when their
    /// host registers again.
    pub fn assemble(
        db: Arc<Database>,
        agent: Arc<dyn HostAgentClient>,
        settings: OrchestratorSettings,
    ) -> Result<Self, StoreError> {
        let store = Arc::new(ServerStore::load(db.clone())?);

        let allocator = Arc::new(NumericIdAllocator::new());
        for server in store.all() {
            allocator.reserve(&server.group, server.numeric_id);
        }
        info!(servers = store.len(), "Server store loaded");

        let events = Arc::new(BroadcastEventSink::new());
        let hosts = Arc::new(HostRegistry::new(
            store.clone(),
            allocator.clone(),
            agent.clone(),
            events.clone(),
            settings.agent_timeout,
        ));

        let orchestrator = ServerOrchestrator::new(
            db.clone(),
            store.clone(),
            allocator.clone(),
            hosts.clone(),
            agent,
            events.clone(),
            settings,
        );

        Ok(Self {
            db,
            store,
            allocator,
            hosts,
            events,
            orchestrator,
        })
    }
}
