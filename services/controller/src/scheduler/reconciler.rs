//! Scaling reconciler.
//!
//! For every group the reconciler:
//! - Collects the group's servers and drops the busy ones
//! - Asks the group's scaling policy how many servers are missing
//! - Starts them one at a time, re-reading the group's total before each
//!   start so `max_online_count` is never exceeded
//!
//! Starts race freely with API-driven starts and stops. A group that ends up
//! one server off is corrected on the next pass.

use fleet_events::Cause;
use fleet_model::{Group, Server};
use fleet_reconcile::policy_for;
use tracing::{debug, info, instrument, warn};

use crate::orchestrator::{OrchestratorError, ServerOrchestrator};
use crate::store::StoreError;

/// Result type for reconciliation.
pub type SchedulerResult<T> = Result<T, SchedulerError>;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("failed to load groups: {0}")]
    Groups(#[from] StoreError),

    #[error("failed to start server: {0}")]
    Start(#[from] OrchestratorError),
}

/// Statistics from one reconciliation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReconcileStats {
    pub groups_processed: usize,
    pub groups_failed: usize,
    pub servers_started: usize,
}

/// Drives groups toward the size their scaling policy asks for.
pub struct ScalingReconciler {
    orchestrator: ServerOrchestrator,
}

impl ScalingReconciler {
    pub fn new(orchestrator: ServerOrchestrator) -> Self {
        Self { orchestrator }
    }

    /// Run a single reconciliation pass over all groups.
    #[instrument(skip(self))]
    pub async fn reconcile_all(&self) -> SchedulerResult<ReconcileStats> {
        let mut stats = ReconcileStats::default();

        let groups = self.orchestrator.groups().load_groups()?;
        debug!(group_count = groups.len(), "Found groups to reconcile");

        for group in groups {
            let mut started = 0;
            let outcome = self.reconcile_group(&group, &mut started).await;
            stats.servers_started += started;

            match outcome {
                Ok(()) => stats.groups_processed += 1,
                Err(e) => {
                    warn!(
                        group = %group.name,
                        started,
                        error = %e,
                        "Failed to reconcile group"
                    );
                    stats.groups_failed += 1;
                }
            }
        }

        if stats.servers_started > 0 || stats.groups_failed > 0 {
            info!(
                groups_processed = stats.groups_processed,
                groups_failed = stats.groups_failed,
                servers_started = stats.servers_started,
                "Reconciliation pass complete"
            );
        }

        Ok(stats)
    }

    /// Reconcile one group, counting successful starts into `started`.
    async fn reconcile_group(&self, group: &Group, started: &mut usize) -> SchedulerResult<()> {
        let store = self.orchestrator.store();
        let available: Vec<Server> = store
            .by_group(&group.name)
            .into_iter()
            .filter(|server| !server.state.is_busy())
            .collect();

        let policy = policy_for(group.scaling_policy);
        let wanted = policy.desired_additional(&available, group);
        if wanted == 0 {
            return Ok(());
        }

        debug!(
            group = %group.name,
            policy = policy.name(),
            available = available.len(),
            wanted,
            "Group needs servers"
        );

        for _ in 0..wanted {
            let total = store.count_in_group(&group.name);
            if total >= group.max_online_count as usize {
                debug!(group = %group.name, total, "Group at max online count");
                break;
            }

            self.orchestrator
                .start_server(&group.name, Cause::ScaleUp)
                .await?;
            *started += 1;
        }

        Ok(())
    }
}
