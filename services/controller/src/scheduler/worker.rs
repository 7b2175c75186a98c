//! Scheduler background worker.
//!
//! Runs the scaling reconciler on a fixed interval, independent of API
//! traffic.

use std::time::Duration;

use tokio::sync::watch;
use tracing::{error, info, instrument};

use super::reconciler::ScalingReconciler;

/// Periodic driver for [`ScalingReconciler`].
pub struct SchedulerWorker {
    reconciler: ScalingReconciler,
    interval: Duration,
}

impl SchedulerWorker {
    pub fn new(reconciler: ScalingReconciler, interval: Duration) -> Self {
        Self {
            reconciler,
            interval,
        }
    }

    /// Run until `shutdown` flips to true.
    #[instrument(skip(self, shutdown))]
    pub async fn run(&self, mut shutdown: watch::Receiver<bool>) {
        info!(
            interval_ms = self.interval.as_millis() as u64,
            "Starting scheduler worker"
        );

        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // First tick completes immediately; wait a full period before the first pass.
        interval.tick().await;

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    if let Err(e) = self.reconciler.reconcile_all().await {
                        error!(error = %e, "Scheduler reconciliation failed");
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        info!("Scheduler worker shutting down");
                        break;
                    }
                }
            }
        }
    }
}
