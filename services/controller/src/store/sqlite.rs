//! SQLite-backed repositories.
//!
//! Records are stored as JSON bodies next to the few columns the database
//! needs to index or constrain. The `(group_name, numeric_id)` unique index
//! backs the in-memory allocator: a bug that hands out a duplicate id fails
//! the write instead of silently persisting two `lobby-3`s.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use fleet_id::ServerId;
use fleet_model::{Group, Server};
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use super::{GroupRepository, ServerRepository, StoreError};

/// SQLite database holding groups and servers.
pub struct Database {
    conn: Mutex<Connection>,
}

impl Database {
    /// Open or create a database at the given path.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let conn = Connection::open(path)?;

        // Enable WAL mode for better concurrency
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;

        let db = Self {
            conn: Mutex::new(conn),
        };
        db.init_schema()?;

        Ok(db)
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let db = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
        };
        db.init_schema()?;
        Ok(db)
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn init_schema(&self) -> Result<(), StoreError> {
        self.conn().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS groups (
                name TEXT PRIMARY KEY,
                body TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS servers (
                server_id TEXT PRIMARY KEY,
                group_name TEXT NOT NULL,
                numeric_id INTEGER NOT NULL,
                body TEXT NOT NULL,
                updated_at INTEGER NOT NULL
            );

            CREATE UNIQUE INDEX IF NOT EXISTS idx_servers_group_numeric
                ON servers(group_name, numeric_id);
            "#,
        )?;

        debug!("Database schema initialized");
        Ok(())
    }

    /// Cheap connectivity probe for readiness checks.
    pub fn health_check(&self) -> Result<(), StoreError> {
        self.conn().query_row("SELECT 1", [], |_| Ok(()))?;
        Ok(())
    }
}

impl ServerRepository for Database {
    fn load_servers(&self) -> Result<Vec<Server>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT body FROM servers ORDER BY group_name, numeric_id")?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let servers = bodies
            .iter()
            .map(|body| serde_json::from_str(body))
            .collect::<Result<Vec<Server>, _>>()?;
        Ok(servers)
    }

    fn save_server(&self, server: &Server) -> Result<(), StoreError> {
        let body = serde_json::to_string(server)?;
        self.conn().execute(
            r#"
            INSERT INTO servers (server_id, group_name, numeric_id, body, updated_at)
            VALUES (?1, ?2, ?3, ?4, ?5)
            ON CONFLICT(server_id) DO UPDATE SET
                group_name = excluded.group_name,
                numeric_id = excluded.numeric_id,
                body = excluded.body,
                updated_at = excluded.updated_at
            "#,
            params![
                server.id.to_string(),
                server.group,
                server.numeric_id,
                body,
                server.updated_at.timestamp()
            ],
        )?;
        Ok(())
    }

    fn delete_server(&self, id: &ServerId) -> Result<(), StoreError> {
        self.conn().execute(
            "DELETE FROM servers WHERE server_id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }
}

impl GroupRepository for Database {
    fn load_groups(&self) -> Result<Vec<Group>, StoreError> {
        let conn = self.conn();
        let mut stmt = conn.prepare("SELECT body FROM groups ORDER BY name")?;
        let bodies = stmt
            .query_map([], |row| row.get::<_, String>(0))?
            .collect::<Result<Vec<_>, _>>()?;

        let groups = bodies
            .iter()
            .map(|body| serde_json::from_str(body))
            .collect::<Result<Vec<Group>, _>>()?;
        Ok(groups)
    }

    fn find_group(&self, name: &str) -> Result<Option<Group>, StoreError> {
        let body: Option<String> = self
            .conn()
            .query_row(
                "SELECT body FROM groups WHERE name = ?1",
                params![name],
                |row| row.get(0),
            )
            .optional()?;

        body.map(|b| serde_json::from_str(&b).map_err(StoreError::from))
            .transpose()
    }

    fn save_group(&self, group: &Group) -> Result<(), StoreError> {
        let body = serde_json::to_string(group)?;
        self.conn().execute(
            "INSERT INTO groups (name, body) VALUES (?1, ?2)
             ON CONFLICT(name) DO UPDATE SET body = excluded.body",
            params![group.name, body],
        )?;
        Ok(())
    }

    fn delete_group(&self, name: &str) -> Result<bool, StoreError> {
        let deleted = self
            .conn()
            .execute("DELETE FROM groups WHERE name = ?1", params![name])?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use chrono::Utc;
    use fleet_id::HostId;
    use fleet_model::{ScalingPolicyKind, ServerState};

    use super::*;

    fn group(name: &str) -> Group {
        Group {
            name: name.to_string(),
            server_type: "lobby".to_string(),
            memory_min_mb: 512,
            memory_max_mb: 1024,
            start_port: 30000,
            min_online_count: 1,
            max_online_count: 4,
            max_players: 20,
            new_instance_ratio: 80,
            scaling_policy: ScalingPolicyKind::PlayerRatio,
            properties: BTreeMap::new(),
        }
    }

    fn server(group: &str, numeric_id: u32) -> Server {
        let now = Utc::now();
        Server {
            id: ServerId::new(),
            group: group.to_string(),
            server_type: "lobby".to_string(),
            numeric_id,
            host_id: HostId::new(),
            address: "10.0.0.4".to_string(),
            port: 30000,
            memory_min_mb: 512,
            memory_max_mb: 1024,
            max_players: 20,
            player_count: 0,
            properties: BTreeMap::new(),
            state: ServerState::Online,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_group_crud() {
        let db = Database::open_in_memory().unwrap();
        db.save_group(&group("lobby")).unwrap();
        db.save_group(&group("bedwars")).unwrap();

        let mut updated = group("lobby");
        updated.max_online_count = 8;
        db.save_group(&updated).unwrap();

        assert_eq!(db.find_group("lobby").unwrap(), Some(updated));
        let names: Vec<_> = db.load_groups().unwrap().into_iter().map(|g| g.name).collect();
        assert_eq!(names, vec!["bedwars", "lobby"]);

        assert!(db.delete_group("lobby").unwrap());
        assert!(!db.delete_group("lobby").unwrap());
        assert_eq!(db.find_group("lobby").unwrap(), None);
    }

    #[test]
    fn test_server_upsert_and_delete() {
        let db = Database::open_in_memory().unwrap();
        let mut s = server("lobby", 1);
        db.save_server(&s).unwrap();

        s.state = ServerState::Ingame;
        db.save_server(&s).unwrap();

        let loaded = db.load_servers().unwrap();
        assert_eq!(loaded, vec![s.clone()]);

        db.delete_server(&s.id).unwrap();
        assert!(db.load_servers().unwrap().is_empty());
    }

    #[test]
    fn test_duplicate_numeric_id_rejected() {
        let db = Database::open_in_memory().unwrap();
        db.save_server(&server("lobby", 1)).unwrap();
        assert!(db.save_server(&server("lobby", 1)).is_err());
        db.save_server(&server("bedwars", 1)).unwrap();
    }

    #[test]
    fn test_reopen_keeps_records() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("fleet.db");
        let s = server("lobby", 2);

        {
            let db = Database::open(&path).unwrap();
            db.save_group(&group("lobby")).unwrap();
            db.save_server(&s).unwrap();
        }

        let db = Database::open(&path).unwrap();
        assert_eq!(db.load_servers().unwrap(), vec![s]);
        assert!(db.find_group("lobby").unwrap().is_some());
        db.health_check().unwrap();
    }
}
