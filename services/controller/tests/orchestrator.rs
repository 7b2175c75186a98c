mod common;

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use common::{group, harness, harness_custom, harness_on, harness_with, settings, FORWARDING_SECRET};
use fleet_controller::{
    agent::MockHostAgent,
    orchestrator::{ErrorKind, OrchestratorError, OrchestratorSettings, FORWARDING_SECRET_PROPERTY},
    store::Database,
};
use fleet_events::{Cause, FleetEvent};
use fleet_id::ServerId;
use fleet_model::ServerState;
use tokio::sync::broadcast::error::TryRecvError;

#[tokio::test]
async fn start_places_and_commits_server() {
    let h = harness();
    h.add_group(&group("lobby"));
    let host = h.add_host("10.0.0.1").await;
    let mut rx = h.controller.events.subscribe();

    let server = h
        .controller
        .orchestrator
        .start_server("lobby", Cause::Api)
        .await
        .unwrap();

    assert_eq!(server.numeric_id, 1);
    assert_eq!(server.display_name(), "lobby-1");
    assert_eq!(server.host_id, host.id);
    assert_eq!(server.port, 30000);
    assert_eq!(server.state, ServerState::Online);
    assert_eq!(server.server_type, "minigame");
    assert_eq!(server.max_players, 10);
    assert_eq!(server.player_count, 0);
    assert_eq!(server.properties["motd"], "hello");
    assert_eq!(server.properties[FORWARDING_SECRET_PROPERTY], FORWARDING_SECRET);

    assert_eq!(h.controller.store.get(&server.id), Some(server.clone()));
    assert_eq!(h.controller.allocator.held("lobby"), vec![1]);

    let envelope = rx.try_recv().unwrap();
    match envelope.event {
        FleetEvent::Start(start) => {
            assert_eq!(start.server.id, server.id);
            assert_eq!(start.cause, Cause::Api);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn start_assigns_ports_from_numeric_id() {
    let h = harness();
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;

    let first = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    let second = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();

    assert_eq!((first.numeric_id, first.port), (1, 30000));
    assert_eq!((second.numeric_id, second.port), (2, 30001));
}

#[tokio::test]
async fn start_spreads_across_hosts() {
    let h = harness();
    h.add_group(&group("lobby"));
    let a = h.add_host("10.0.0.1").await;
    let b = h.add_host("10.0.0.2").await;

    let first = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    let second = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();

    assert_eq!(first.host_id, a.id);
    assert_eq!(second.host_id, b.id);
    assert_eq!(second.address, "10.0.0.2");
}

#[tokio::test]
async fn start_unknown_group_is_not_found() {
    let h = harness();
    h.add_host("10.0.0.1").await;

    let err = h
        .controller
        .orchestrator
        .start_server("missing", Cause::Api)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::GroupNotFound(_)));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(h.agent.launch_count(), 0);
}

#[tokio::test]
async fn start_without_hosts_is_not_found() {
    let h = harness();
    h.add_group(&group("lobby"));

    let err = h
        .controller
        .orchestrator
        .start_server("lobby", Cause::Api)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::NoHostAvailable));
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(h.controller.allocator.held("lobby").is_empty());
}

#[tokio::test]
async fn failed_launch_rolls_back() {
    let h = harness();
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;
    let mut rx = h.controller.events.subscribe();

    h.agent.set_fail_launch(true);
    let err = h
        .controller
        .orchestrator
        .start_server("lobby", Cause::Api)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(h.controller.store.is_empty());
    assert!(h.controller.allocator.held("lobby").is_empty());
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));

    h.agent.set_fail_launch(false);
    let server = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    assert_eq!(server.numeric_id, 1);
}

#[tokio::test]
async fn launch_timeout_rolls_back() {
    let db = Arc::new(Database::open_in_memory().unwrap());
    let h = harness_custom(
        db,
        MockHostAgent::new().with_launch_delay(Duration::from_millis(500)),
        OrchestratorSettings {
            agent_timeout: Duration::from_millis(50),
            ..settings()
        },
    );
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;

    let err = h
        .controller
        .orchestrator
        .start_server("lobby", Cause::Api)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::Agent(_)));
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(h.controller.store.is_empty());
    assert!(h.controller.allocator.held("lobby").is_empty());
}

#[tokio::test]
async fn abandoned_start_still_commits() {
    let h = harness_with(MockHostAgent::new().with_launch_delay(Duration::from_millis(200)));
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;

    let abandoned = tokio::time::timeout(
        Duration::from_millis(50),
        h.controller.orchestrator.start_server("lobby", Cause::Api),
    )
    .await;
    assert!(abandoned.is_err());

    tokio::time::sleep(Duration::from_millis(500)).await;

    let servers = h.controller.store.by_group("lobby");
    assert_eq!(servers.len(), 1);
    assert_eq!(servers[0].state, ServerState::Online);
    assert_eq!(h.controller.allocator.held("lobby"), vec![1]);
}

#[tokio::test]
async fn stop_during_launch_is_refused() {
    let h = harness_with(MockHostAgent::new().with_launch_delay(Duration::from_millis(300)));
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;

    let orchestrator = h.controller.orchestrator.clone();
    let start = tokio::spawn(async move { orchestrator.start_server("lobby", Cause::Api).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let pending = h.controller.store.by_group("lobby");
    assert_eq!(pending.len(), 1);
    assert_eq!(pending[0].state, ServerState::Preparing);

    let err = h
        .controller
        .orchestrator
        .stop_server(pending[0].id, Cause::Api)
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::LaunchInProgress(id) if id == pending[0].id));
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(h.agent.terminate_count(), 0);

    let server = start.await.unwrap().unwrap();
    assert_eq!(server.state, ServerState::Online);
    assert_eq!(h.controller.store.by_group("lobby").len(), 1);
    assert_eq!(h.controller.allocator.held("lobby"), vec![1]);

    let stopped = h
        .controller
        .orchestrator
        .stop_server(server.id, Cause::Api)
        .await
        .unwrap();
    assert_eq!(stopped.id, server.id);
    assert_eq!(h.agent.terminate_count(), 1);
    assert!(h.controller.allocator.held("lobby").is_empty());
}

#[tokio::test]
async fn launch_whose_record_vanished_is_terminated() {
    let h = harness_with(MockHostAgent::new().with_launch_delay(Duration::from_millis(200)));
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;

    let orchestrator = h.controller.orchestrator.clone();
    let start = tokio::spawn(async move { orchestrator.start_server("lobby", Cause::Api).await });
    tokio::time::sleep(Duration::from_millis(50)).await;

    let pending = h.controller.store.by_group("lobby");
    assert_eq!(pending.len(), 1);
    h.controller.store.remove(&pending[0].id).unwrap();

    let err = start.await.unwrap().unwrap_err();
    assert!(matches!(err, OrchestratorError::Superseded(id) if id == pending[0].id));
    assert_eq!(err.kind(), ErrorKind::Internal);
    assert_eq!(h.agent.launch_count(), 1);
    assert_eq!(h.agent.terminate_count(), 1);
    assert!(h.controller.store.by_group("lobby").is_empty());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_starts_get_distinct_numeric_ids() {
    let h = harness();
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;

    let starts = (0..20).map(|_| {
        let orchestrator = h.controller.orchestrator.clone();
        tokio::spawn(async move { orchestrator.start_server("lobby", Cause::ScaleUp).await })
    });
    let results = futures_util::future::join_all(starts).await;

    let ids: HashSet<u32> = results
        .into_iter()
        .map(|r| r.unwrap().unwrap().numeric_id)
        .collect();
    assert_eq!(ids, (1..=20).collect());
}

#[tokio::test]
async fn stop_removes_and_releases() {
    let h = harness();
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;
    let server = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    let mut rx = h.controller.events.subscribe();

    let stopped = h
        .controller
        .orchestrator
        .stop_server(server.id, Cause::Api)
        .await
        .unwrap();

    assert_eq!(stopped.id, server.id);
    assert!(h.controller.store.get(&server.id).is_none());
    assert!(h.controller.allocator.held("lobby").is_empty());
    assert_eq!(h.agent.terminate_count(), 1);

    match rx.try_recv().unwrap().event {
        FleetEvent::Stop(stop) => {
            assert_eq!(stop.server.id, server.id);
            assert_eq!(stop.cause, Cause::Api);
        }
        other => panic!("unexpected event {other:?}"),
    }
}

#[tokio::test]
async fn stop_by_numeric_id() {
    let h = harness();
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;
    h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    let second = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();

    let stopped = h
        .controller
        .orchestrator
        .stop_by_numeric("lobby", 2, Cause::Api)
        .await
        .unwrap();

    assert_eq!(stopped.id, second.id);
    assert_eq!(h.controller.allocator.held("lobby"), vec![1]);

    let err = h
        .controller
        .orchestrator
        .stop_by_numeric("lobby", 2, Cause::Api)
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn stop_unknown_server_is_not_found() {
    let h = harness();
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;
    h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    let before = h.controller.store.all();

    let err = h
        .controller
        .orchestrator
        .stop_server(ServerId::new(), Cause::Api)
        .await
        .unwrap_err();

    assert!(matches!(err, OrchestratorError::ServerNotFound(_)));
    assert_eq!(h.controller.store.all(), before);
    assert_eq!(h.agent.terminate_count(), 0);
}

#[tokio::test]
async fn failed_terminate_leaves_record() {
    let h = harness();
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;
    let server = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();

    h.agent.set_fail_terminate(true);
    let err = h
        .controller
        .orchestrator
        .stop_server(server.id, Cause::Api)
        .await
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Internal);
    assert!(h.controller.store.get(&server.id).is_some());
    assert_eq!(h.controller.allocator.held("lobby"), vec![1]);
}

#[tokio::test]
async fn property_update_publishes_before_and_after() {
    let h = harness();
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;
    let server = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    h.controller
        .orchestrator
        .update_server_property(server.id, "k", "old")
        .unwrap();
    let mut rx = h.controller.events.subscribe();

    let updated = h
        .controller
        .orchestrator
        .update_server_property(server.id, "k", "v")
        .unwrap();

    assert_eq!(updated.properties["k"], "v");
    assert_eq!(h.controller.store.get(&server.id).unwrap().properties["k"], "v");

    match rx.try_recv().unwrap().event {
        FleetEvent::Update(update) => {
            assert_eq!(update.before.properties["k"], "old");
            assert_eq!(update.after.properties["k"], "v");
        }
        other => panic!("unexpected event {other:?}"),
    }
    assert_eq!(h.agent.launch_count(), 1);
}

#[tokio::test]
async fn state_update_is_local_override() {
    let h = harness();
    h.add_group(&group("lobby"));
    h.add_host("10.0.0.1").await;
    let server = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();

    let updated = h
        .controller
        .orchestrator
        .update_server_state(server.id, ServerState::Ingame)
        .unwrap();
    assert_eq!(updated.state, ServerState::Ingame);
    assert!(updated.updated_at >= server.updated_at);

    let custom = h
        .controller
        .orchestrator
        .update_server_state(server.id, ServerState::from("draining"))
        .unwrap();
    assert_eq!(custom.state, ServerState::Other("DRAINING".to_string()));

    let err = h
        .controller
        .orchestrator
        .update_server_state(ServerId::new(), ServerState::Online)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[tokio::test]
async fn reattach_purges_lost_servers() {
    let h = harness();
    h.add_group(&group("lobby"));
    let host = h.add_host("10.0.0.1").await;
    let a = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    let b = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    h.agent.mark_lost(b.id);
    let mut rx = h.controller.events.subscribe();

    let (attached, report) = h.controller.orchestrator.attach_host(host.clone()).await.unwrap();

    assert_eq!(attached.id, host.id);
    assert_eq!(report.reattached, vec![a.id]);
    assert_eq!(report.purged, vec![b.id]);
    assert_eq!(h.controller.store.by_group("lobby").len(), 1);
    assert!(h.controller.store.get(&a.id).is_some());
    assert_eq!(h.controller.allocator.held("lobby"), vec![a.numeric_id]);

    match rx.try_recv().unwrap().event {
        FleetEvent::Stop(stop) => {
            assert_eq!(stop.server.id, b.id);
            assert_eq!(stop.cause, Cause::HostLost);
        }
        other => panic!("unexpected event {other:?}"),
    }

    // The released id is handed out again.
    let next = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    assert_eq!(next.numeric_id, b.numeric_id);
}

#[tokio::test]
async fn servers_survive_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("fleet.db");

    let host = {
        let h = harness_on(Arc::new(Database::open(&path).unwrap()), MockHostAgent::new());
        h.add_group(&group("lobby"));
        let host = h.add_host("10.0.0.1").await;
        h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
        h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
        host
    };

    let h = harness_on(Arc::new(Database::open(&path).unwrap()), MockHostAgent::new());
    assert_eq!(h.controller.store.len(), 2);
    assert_eq!(h.controller.allocator.held("lobby"), vec![1, 2]);
    assert!(h.controller.hosts.list().is_empty());

    let (_, report) = h.controller.orchestrator.attach_host(host).await.unwrap();
    assert_eq!(report.reattached.len(), 2);

    let third = h.controller.orchestrator.start_server("lobby", Cause::Api).await.unwrap();
    assert_eq!(third.numeric_id, 3);
}
