use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use base64::Engine;

#[derive(Debug, Clone)]
pub struct Config {
    pub listen_addr: SocketAddr,
    pub log_level: String,
    pub database_path: PathBuf,
    pub reconcile_interval: Duration,
    pub agent_timeout: Duration,
    /// Bearer token required on `/v1`. `None` leaves the API open.
    pub api_token: Option<String>,
    pub forwarding_secret: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup<F>(get: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let listen_addr = get("FLEET_LISTEN_ADDR")
            .unwrap_or_else(|| "127.0.0.1:8080".to_string())
            .parse()
            .context("invalid FLEET_LISTEN_ADDR")?;

        let log_level = get("FLEET_LOG_LEVEL").unwrap_or_else(|| "info".to_string());

        let database_path = get("FLEET_DATABASE_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("fleet.db"));

        let reconcile_interval = secs(
            &get,
            "FLEET_RECONCILE_INTERVAL_SECS",
            fleet_reconcile::DEFAULT_RECONCILE_INTERVAL.as_secs(),
        )?;
        let agent_timeout = secs(&get, "FLEET_AGENT_TIMEOUT_SECS", 10)?;

        let api_token = get("FLEET_API_TOKEN").filter(|t| !t.is_empty());

        let forwarding_secret = get("FLEET_FORWARDING_SECRET")
            .filter(|s| !s.is_empty())
            .unwrap_or_else(random_secret);

        Ok(Self {
            listen_addr,
            log_level,
            database_path,
            reconcile_interval,
            agent_timeout,
            api_token,
            forwarding_secret,
        })
    }
}

fn secs<F>(get: &F, key: &str, default: u64) -> Result<Duration>
where
    F: Fn(&str) -> Option<String>,
{
    let secs = match get(key) {
        Some(raw) => raw
            .parse::<u64>()
            .with_context(|| format!("invalid {key}: {raw}"))?,
        None => default,
    };
    anyhow::ensure!(secs > 0, "{key} must be positive");
    Ok(Duration::from_secs(secs))
}

fn random_secret() -> String {
    let bytes: [u8; 32] = rand::random();
    base64::engine::general_purpose::STANDARD.encode(bytes)
}
