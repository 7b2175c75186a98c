#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use fleet_controller::{
    agent::MockHostAgent,
    bootstrap::Controller,
    orchestrator::OrchestratorSettings,
    store::{Database, GroupRepository},
};
use fleet_id::HostId;
use fleet_model::{Group, HostDescriptor, ScalingPolicyKind};

pub const FORWARDING_SECRET: &str = "test-forwarding-secret";

pub struct Harness {
    pub controller: Controller,
    pub agent: Arc<MockHostAgent>,
}

pub fn harness() -> Harness {
    harness_with(MockHostAgent::new())
}

pub fn harness_with(agent: MockHostAgent) -> Harness {
    let db = Arc::new(Database::open_in_memory().unwrap());
    harness_on(db, agent)
}

pub fn harness_on(db: Arc<Database>, agent: MockHostAgent) -> Harness {
    harness_custom(db, agent, settings())
}

pub fn harness_custom(
    db: Arc<Database>,
    agent: MockHostAgent,
    settings: OrchestratorSettings,
) -> Harness {
    let agent = Arc::new(agent);
    let controller = Controller::assemble(db, agent.clone(), settings).unwrap();
    Harness { controller, agent }
}

pub fn settings() -> OrchestratorSettings {
    OrchestratorSettings {
        agent_timeout: Duration::from_secs(2),
        forwarding_secret: FORWARDING_SECRET.to_string(),
    }
}

pub fn group(name: &str) -> Group {
    Group {
        name: name.to_string(),
        server_type: "minigame".to_string(),
        memory_min_mb: 512,
        memory_max_mb: 1024,
        start_port: 30000,
        min_online_count: 2,
        max_online_count: 5,
        max_players: 10,
        new_instance_ratio: 80,
        scaling_policy: ScalingPolicyKind::PlayerRatio,
        properties: BTreeMap::from([("motd".to_string(), "hello".to_string())]),
    }
}

pub fn host(address: &str) -> HostDescriptor {
    HostDescriptor {
        id: HostId::new(),
        address: address.to_string(),
        endpoint: format!("http://{address}:7000"),
    }
}

impl Harness {
    pub fn add_group(&self, group: &Group) {
        self.controller.db.save_group(group).unwrap();
    }

    pub async fn add_host(&self, address: &str) -> HostDescriptor {
        let host = host(address);
        self.controller.hosts.register(host.clone()).await;
        host
    }
}
