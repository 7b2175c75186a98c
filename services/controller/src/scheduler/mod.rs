//! Scale-up control loop.
//!
//! [`ScalingReconciler`] does one pass over all groups; [`SchedulerWorker`]
//! repeats it on an interval. Servers are never stopped from here: only
//! explicit stop calls and host loss remove them.

mod reconciler;
mod worker;

pub use reconciler::{ReconcileStats, ScalingReconciler, SchedulerError, SchedulerResult};
pub use worker::SchedulerWorker;
