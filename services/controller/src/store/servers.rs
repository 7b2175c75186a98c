//! In-memory server index over a durable repository.

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock, RwLockReadGuard, RwLockWriteGuard};

use fleet_id::{HostId, ServerId};
use fleet_model::Server;
use tracing::{debug, info};

use super::{ServerRepository, StoreError};

/// Authoritative record of every live server.
///
/// Reads are served from memory. Each write goes to the repository first and
/// is applied to the map under the same write guard, so a record is either
/// durable and visible or neither.
///
/// The store also tracks which records belong to a launch that is still in
/// flight, so a reattachment sweep does not purge a server its host has not
/// been told about yet.
pub struct ServerStore {
    servers: RwLock<HashMap<ServerId, Server>>,
    launching: Mutex<HashSet<ServerId>>,
    repo: Arc<dyn ServerRepository>,
}

impl ServerStore {
    /// Rebuilds the store from everything the repository holds.
    pub fn load(repo: Arc<dyn ServerRepository>) -> Result<Self, StoreError> {
        let servers: HashMap<_, _> = repo
            .load_servers()?
            .into_iter()
            .map(|s| (s.id, s))
            .collect();

        info!(server_count = servers.len(), "Loaded servers from storage");

        Ok(Self {
            servers: RwLock::new(servers),
            launching: Mutex::new(HashSet::new()),
            repo,
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<ServerId, Server>> {
        self.servers.read().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ServerId, Server>> {
        self.servers.write().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn collect_sorted<F>(&self, filter: F) -> Vec<Server>
    where
        F: Fn(&Server) -> bool,
    {
        let mut servers: Vec<_> = self.read().values().filter(|s| filter(s)).cloned().collect();
        servers.sort_by(|a, b| (&a.group, a.numeric_id).cmp(&(&b.group, b.numeric_id)));
        servers
    }

    pub fn get(&self, id: &ServerId) -> Option<Server> {
        self.read().get(id).cloned()
    }

    /// All servers ordered by group then numeric id.
    pub fn all(&self) -> Vec<Server> {
        self.collect_sorted(|_| true)
    }

    pub fn by_group(&self, group: &str) -> Vec<Server> {
        self.collect_sorted(|s| s.group == group)
    }

    pub fn by_host(&self, host_id: &HostId) -> Vec<Server> {
        self.collect_sorted(|s| s.host_id == *host_id)
    }

    pub fn by_type(&self, server_type: &str) -> Vec<Server> {
        self.collect_sorted(|s| s.server_type == server_type)
    }

    pub fn by_numeric(&self, group: &str, numeric_id: u32) -> Option<Server> {
        self.read()
            .values()
            .find(|s| s.group == group && s.numeric_id == numeric_id)
            .cloned()
    }

    pub fn count_in_group(&self, group: &str) -> usize {
        self.read().values().filter(|s| s.group == group).count()
    }

    pub fn count_on_host(&self, host_id: &HostId) -> usize {
        self.read().values().filter(|s| s.host_id == *host_id).count()
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Inserts or replaces a server.
    pub fn save(&self, server: Server) -> Result<(), StoreError> {
        let mut servers = self.write();
        self.repo.save_server(&server)?;
        debug!(server_id = %server.id, name = %server.display_name(), state = %server.state, "Saved server");
        servers.insert(server.id, server);
        Ok(())
    }

    /// Replaces an existing server. Returns false, writing nothing, if the
    /// record has been removed in the meantime.
    pub fn replace(&self, server: Server) -> Result<bool, StoreError> {
        let mut servers = self.write();
        if !servers.contains_key(&server.id) {
            return Ok(false);
        }
        self.repo.save_server(&server)?;
        debug!(server_id = %server.id, name = %server.display_name(), state = %server.state, "Replaced server");
        servers.insert(server.id, server);
        Ok(true)
    }

    /// Removes a server, returning the record that was stored.
    pub fn remove(&self, id: &ServerId) -> Result<Option<Server>, StoreError> {
        let mut servers = self.write();
        if !servers.contains_key(id) {
            return Ok(None);
        }
        self.repo.delete_server(id)?;
        debug!(server_id = %id, "Removed server");
        Ok(servers.remove(id))
    }

    fn launching(&self) -> std::sync::MutexGuard<'_, HashSet<ServerId>> {
        self.launching.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Marks a server as owned by an in-flight launch.
    pub fn begin_launch(&self, id: ServerId) {
        self.launching().insert(id);
    }

    pub fn end_launch(&self, id: &ServerId) {
        self.launching().remove(id);
    }

    pub fn is_launching(&self, id: &ServerId) -> bool {
        self.launching().contains(id)
    }
}
