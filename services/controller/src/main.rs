//! Fleet controller
//!
//! Places servers on registered hosts, keeps the fleet record durable, and
//! scales groups up on a fixed interval.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use fleet_controller::{
    agent::HttpHostAgentClient,
    api,
    bootstrap::Controller,
    config,
    orchestrator::OrchestratorSettings,
    scheduler::{ScalingReconciler, SchedulerWorker},
    state::AppState,
    store::Database,
};
use tokio::sync::watch;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let config = config::Config::from_env()?;

    // Prefer RUST_LOG, fall back to FLEET_LOG_LEVEL
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| config.log_level.clone().into()))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    info!("Starting fleet controller");
    info!(
        listen_addr = %config.listen_addr,
        database = %config.database_path.display(),
        auth = config.api_token.is_some(),
        "Configuration loaded"
    );

    let db = match Database::open(&config.database_path) {
        Ok(db) => Arc::new(db),
        Err(e) => {
            error!(error = %e, "Failed to open database");
            return Err(e.into());
        }
    };

    let agent = Arc::new(HttpHostAgentClient::new(config.agent_timeout)?);
    let controller = Controller::assemble(
        db,
        agent,
        OrchestratorSettings {
            agent_timeout: config.agent_timeout,
            forwarding_secret: config.forwarding_secret.clone(),
        },
    )?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let scheduler_worker = SchedulerWorker::new(
        ScalingReconciler::new(controller.orchestrator.clone()),
        config.reconcile_interval,
    );
    let scheduler_handle = tokio::spawn({
        let shutdown_rx = shutdown_rx.clone();
        async move {
            scheduler_worker.run(shutdown_rx).await;
        }
    });

    let state = AppState::new(
        controller.db.clone(),
        controller.orchestrator.clone(),
        controller.events.clone(),
        config.api_token.clone(),
    );
    let app = api::create_router(state);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await?;
    info!(addr = %config.listen_addr, "Listening for connections");

    let server_handle = tokio::spawn(async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let mut shutdown_rx = shutdown_rx;
                loop {
                    if *shutdown_rx.borrow() {
                        break;
                    }
                    if shutdown_rx.changed().await.is_err() {
                        break;
                    }
                }
                info!("HTTP server shutting down");
            })
            .await
    });

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = server_handle => {
            match result {
                Ok(Ok(())) => info!("Server exited normally"),
                Ok(Err(e)) => error!(error = %e, "Server error"),
                Err(e) => error!(error = %e, "Server task panicked"),
            }
        }
    }

    let _ = shutdown_tx.send(true);

    info!("Waiting for scheduler to shut down...");
    if tokio::time::timeout(Duration::from_secs(10), scheduler_handle)
        .await
        .is_err()
    {
        warn!("Scheduler worker did not shut down in time");
    }

    info!("Fleet controller shutdown complete");
    Ok(())
}
