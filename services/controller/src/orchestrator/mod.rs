//! Server lifecycle: start, stop and local overrides.
//!
//! A start places a provisional `PREPARING` record before asking the host to
//! launch it, then either commits the host's answer or rolls everything back
//! (record deleted, numeric id released) before returning. A stop only
//! removes the record once the host confirmed termination, and is refused
//! while the server's launch is still in flight.
//!
//! Start, stop and host attachment run on a spawned task which the caller
//! awaits. Dropping the caller's future therefore never leaves a placement
//! half finished.

mod error;

pub use error::{ErrorKind, OrchestratorError, OrchestratorResult};

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use fleet_events::{Cause, FleetEvent, EVENT_TOPIC};
use fleet_id::ServerId;
use fleet_model::{Group, HostDescriptor, Server, ServerState};
use tracing::{info, instrument, warn};

use crate::agent::{self, HostAgentClient};
use crate::allocator::NumericIdAllocator;
use crate::events::EventSink;
use crate::hosts::{HostRegistry, ReattachReport};
use crate::store::{GroupRepository, ServerStore};

/// Property under which every server receives the proxy forwarding secret.
pub const FORWARDING_SECRET_PROPERTY: &str = "forwarding-secret";

/// Settings that are not collaborators.
#[derive(Debug, Clone)]
pub struct OrchestratorSettings {
    pub agent_timeout: Duration,
    pub forwarding_secret: String,
}

/// Coordinates allocator, hosts, store, agent and event sink.
///
/// Cheap to clone; all clones share the same collaborators.
#[derive(Clone)]
pub struct ServerOrchestrator {
    groups: Arc<dyn GroupRepository>,
    store: Arc<ServerStore>,
    allocator: Arc<NumericIdAllocator>,
    hosts: Arc<HostRegistry>,
    agent: Arc<dyn HostAgentClient>,
    events: Arc<dyn EventSink>,
    settings: Arc<OrchestratorSettings>,
}

impl ServerOrchestrator {
    pub fn new(
        groups: Arc<dyn GroupRepository>,
        store: Arc<ServerStore>,
        allocator: Arc<NumericIdAllocator>,
        hosts: Arc<HostRegistry>,
        agent: Arc<dyn HostAgentClient>,
        events: Arc<dyn EventSink>,
        settings: OrchestratorSettings,
    ) -> Self {
        Self {
            groups,
            store,
            allocator,
            hosts,
            agent,
            events,
            settings: Arc::new(settings),
        }
    }

    pub fn store(&self) -> &Arc<ServerStore> {
        &self.store
    }

    pub fn hosts(&self) -> &Arc<HostRegistry> {
        &self.hosts
    }

    pub fn groups(&self) -> &Arc<dyn GroupRepository> {
        &self.groups
    }

    /// Places and launches a new server in `group_name`.
    pub async fn start_server(&self, group_name: &str, cause: Cause) -> OrchestratorResult<Server> {
        let this = self.clone();
        let group_name = group_name.to_string();
        tokio::spawn(async move { this.run_start(&group_name, cause).await })
            .await
            .map_err(|e| OrchestratorError::Task(e.to_string()))?
    }

    /// Terminates a server and forgets it.
    pub async fn stop_server(&self, id: ServerId, cause: Cause) -> OrchestratorResult<Server> {
        let this = self.clone();
        tokio::spawn(async move { this.run_stop(id, cause).await })
            .await
            .map_err(|e| OrchestratorError::Task(e.to_string()))?
    }

    /// Stops the server addressed as `{group}-{numeric_id}`.
    pub async fn stop_by_numeric(
        &self,
        group: &str,
        numeric_id: u32,
        cause: Cause,
    ) -> OrchestratorResult<Server> {
        let server = self.store.by_numeric(group, numeric_id).ok_or_else(|| {
            OrchestratorError::NumericNotFound {
                group: group.to_string(),
                numeric_id,
            }
        })?;
        self.stop_server(server.id, cause).await
    }

    /// Registers a host and waits for its reattachment sweep.
    pub async fn attach_host(
        &self,
        host: HostDescriptor,
    ) -> OrchestratorResult<(HostDescriptor, ReattachReport)> {
        let hosts = self.hosts.clone();
        tokio::spawn(async move {
            let report = hosts.register(host.clone()).await;
            (host, report)
        })
        .await
        .map_err(|e| OrchestratorError::Task(e.to_string()))
    }

    /// Overrides a server's lifecycle state.
    #[instrument(skip_all, fields(server_id = %id, state = %state))]
    pub fn update_server_state(&self, id: ServerId, state: ServerState) -> OrchestratorResult<Server> {
        self.update(id, |server| server.state = state)
    }

    /// Sets one property on a server.
    #[instrument(skip_all, fields(server_id = %id))]
    pub fn update_server_property(
        &self,
        id: ServerId,
        key: &str,
        value: &str,
    ) -> OrchestratorResult<Server> {
        self.update(id, |server| {
            server.properties.insert(key.to_string(), value.to_string());
        })
    }

    fn update<F>(&self, id: ServerId, mutate: F) -> OrchestratorResult<Server>
    where
        F: FnOnce(&mut Server),
    {
        let before = self
            .store
            .get(&id)
            .ok_or(OrchestratorError::ServerNotFound(id))?;

        let mut after = before.clone();
        mutate(&mut after);
        after.updated_at = Utc::now();

        if !self.store.replace(after.clone())? {
            return Err(OrchestratorError::ServerNotFound(id));
        }

        self.events
            .publish(EVENT_TOPIC, FleetEvent::updated(before, after.clone()));
        Ok(after)
    }

    #[instrument(skip_all, fields(group = %group_name, cause = %cause))]
    async fn run_start(&self, group_name: &str, cause: Cause) -> OrchestratorResult<Server> {
        let group = self
            .groups
            .find_group(group_name)?
            .ok_or_else(|| OrchestratorError::GroupNotFound(group_name.to_string()))?;
        let host = self
            .hosts
            .select_for_placement()
            .ok_or(OrchestratorError::NoHostAvailable)?;

        let numeric_id = self.allocator.allocate(&group.name);
        let provisional = self.provisional(&group, &host, numeric_id);
        let id = provisional.id;

        self.store.begin_launch(id);
        if let Err(e) = self.store.save(provisional.clone()) {
            self.allocator.release(&group.name, numeric_id);
            self.store.end_launch(&id);
            return Err(e.into());
        }

        info!(
            server_id = %id,
            name = %provisional.display_name(),
            host_id = %host.id,
            "Launching server"
        );

        let launched = agent::with_timeout(
            self.settings.agent_timeout,
            self.agent.launch(&host, &group, &provisional),
        )
        .await
        .and_then(|theirs| agent::merge_confirmed(&provisional, theirs));

        let result = match launched {
            Ok(confirmed) => self.commit_start(&host, &provisional, confirmed, cause).await,
            Err(e) => {
                warn!(server_id = %id, error = %e, "Launch failed, rolling back");
                self.roll_back(&provisional);
                Err(e.into())
            }
        };

        self.store.end_launch(&id);
        result
    }

    async fn commit_start(
        &self,
        host: &HostDescriptor,
        provisional: &Server,
        confirmed: Server,
        cause: Cause,
    ) -> OrchestratorResult<Server> {
        match self.store.replace(confirmed.clone()) {
            Ok(true) => {
                info!(
                    server_id = %confirmed.id,
                    address = %confirmed.address,
                    port = confirmed.port,
                    state = %confirmed.state,
                    "Server started"
                );
                self.events
                    .publish(EVENT_TOPIC, FleetEvent::started(confirmed.clone(), cause));
                Ok(confirmed)
            }
            // The record was removed while the launch was in flight and its
            // numeric id is no longer ours.
            Ok(false) => {
                warn!(server_id = %confirmed.id, "Server removed during launch, terminating");
                self.terminate_uncommitted(host, &confirmed).await;
                Err(OrchestratorError::Superseded(confirmed.id))
            }
            Err(e) => {
                warn!(server_id = %confirmed.id, error = %e, "Failed to commit launch, rolling back");
                self.terminate_uncommitted(host, &confirmed).await;
                self.roll_back(provisional);
                Err(e.into())
            }
        }
    }

    async fn terminate_uncommitted(&self, host: &HostDescriptor, server: &Server) {
        if let Err(e) = agent::with_timeout(
            self.settings.agent_timeout,
            self.agent.terminate(host, server),
        )
        .await
        {
            warn!(server_id = %server.id, error = %e, "Failed to terminate uncommitted server");
        }
    }

    fn roll_back(&self, provisional: &Server) {
        match self.store.remove(&provisional.id) {
            Ok(Some(_)) => {
                self.allocator
                    .release(&provisional.group, provisional.numeric_id);
            }
            Ok(None) => {}
            Err(e) => warn!(
                server_id = %provisional.id,
                error = %e,
                "Failed to delete provisional server"
            ),
        }
    }

    #[instrument(skip_all, fields(server_id = %id, cause = %cause))]
    async fn run_stop(&self, id: ServerId, cause: Cause) -> OrchestratorResult<Server> {
        let server = self
            .store
            .get(&id)
            .ok_or(OrchestratorError::ServerNotFound(id))?;
        if self.store.is_launching(&id) {
            return Err(OrchestratorError::LaunchInProgress(id));
        }
        let host = self
            .hosts
            .get(&server.host_id)
            .ok_or(OrchestratorError::HostNotFound(server.host_id))?;

        agent::with_timeout(
            self.settings.agent_timeout,
            self.agent.terminate(&host, &server),
        )
        .await?;

        let removed = self
            .store
            .remove(&id)?
            .ok_or(OrchestratorError::ServerNotFound(id))?;
        self.allocator.release(&removed.group, removed.numeric_id);

        info!(name = %removed.display_name(), "Server stopped");
        self.events
            .publish(EVENT_TOPIC, FleetEvent::stopped(removed.clone(), cause));
        Ok(removed)
    }

    fn provisional(&self, group: &Group, host: &HostDescriptor, numeric_id: u32) -> Server {
        let mut properties = group.properties.clone();
        properties.insert(
            FORWARDING_SECRET_PROPERTY.to_string(),
            self.settings.forwarding_secret.clone(),
        );

        let port = u32::from(group.start_port) + numeric_id - 1;
        let now = Utc::now();

        Server {
            id: ServerId::new(),
            group: group.name.clone(),
            server_type: group.server_type.clone(),
            numeric_id,
            host_id: host.id,
            address: host.address.clone(),
            port: u16::try_from(port).unwrap_or(u16::MAX),
            memory_min_mb: group.memory_min_mb,
            memory_max_mb: group.memory_max_mb,
            max_players: group.max_players,
            player_count: 0,
            properties,
            state: ServerState::Preparing,
            created_at: now,
            updated_at: now,
        }
    }
}
