//! Scaling policies for the reconciliation loop.
//!
//! A policy looks at the *available* servers of one group (servers that are
//! not busy) and answers a single question: how many more servers should
//! exist? The reconciliation loop turns that answer into start requests,
//! bounded by the group's `max_online_count`.
//!
//! # Invariants
//!
//! - Policies are pure: the same inputs always give the same answer
//! - Policies only ever ask for more servers; scale-down is not modelled
//! - The answer ignores `max_online_count`; capping is the caller's job

use std::time::Duration;

use fleet_model::{Group, ScalingPolicyKind, Server};

/// Default reconciliation interval.
pub const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(5);

/// Decides how many servers a group is missing.
pub trait ScalingPolicy: Send + Sync {
    /// Number of additional servers wanted, given the group's available servers.
    fn desired_additional(&self, available: &[Server], group: &Group) -> u32;

    /// Short name for logs.
    fn name(&self) -> &'static str;
}

/// Returns the policy configured for a group.
pub fn policy_for(kind: ScalingPolicyKind) -> &'static dyn ScalingPolicy {
    match kind {
        ScalingPolicyKind::PlayerRatio => &PlayerRatioPolicy,
        ScalingPolicyKind::SlotRatio => &SlotRatioPolicy,
    }
}

/// Keeps `min_online_count` servers below the group's player ratio.
///
/// A server whose load is at or above `new_instance_ratio` percent is about to
/// fill up and does not count toward the minimum. With two servers at 9/10
/// players, a ratio of 80 and a minimum of 2, both servers are "high", none
/// are "low", and the policy asks for two more.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlayerRatioPolicy;

impl PlayerRatioPolicy {
    /// Servers at or above the group's ratio threshold.
    pub fn high_ratio_count(available: &[Server], group: &Group) -> usize {
        available
            .iter()
            .filter(|s| s.load_percent() >= group.new_instance_ratio)
            .count()
    }
}

impl ScalingPolicy for PlayerRatioPolicy {
    fn desired_additional(&self, available: &[Server], group: &Group) -> u32 {
        let high = Self::high_ratio_count(available, group);
        let low = available.len() - high;
        let min_online = group.min_online_count as usize;

        let desired_total = if low < min_online {
            available.len() + (min_online - low)
        } else {
            available.len()
        };

        u32::try_from(desired_total - available.len()).unwrap_or(u32::MAX)
    }

    fn name(&self) -> &'static str {
        "player_ratio"
    }
}

/// Keeps `new_instance_ratio` percent of all player slots free.
///
/// Slots are counted across available servers using each server's own
/// `max_players`; new servers are assumed to open `group.max_players` empty
/// slots. At least `min_online_count` available servers are always requested.
#[derive(Debug, Clone, Copy, Default)]
pub struct SlotRatioPolicy;

impl ScalingPolicy for SlotRatioPolicy {
    fn desired_additional(&self, available: &[Server], group: &Group) -> u32 {
        let existing = u32::try_from(available.len()).unwrap_or(u32::MAX);
        let floor = group.min_online_count.saturating_sub(existing);

        let total_slots: u64 = available.iter().map(|s| u64::from(s.max_players)).sum();
        let free_slots: u64 = available.iter().map(|s| u64::from(s.free_slots())).sum();
        let ratio = u64::from(group.new_instance_ratio);
        let per_server = u64::from(group.max_players);

        // The loop caller caps at max_online_count, so searching past it is pointless.
        for extra in floor..=group.max_online_count.max(floor) {
            let added = u64::from(extra) * per_server;
            let total = total_slots + added;
            let free = free_slots + added;
            if free * 100 >= ratio * total {
                return extra;
            }
        }

        group.max_online_count.max(floor)
    }

    fn name(&self) -> &'static str {
        "slot_ratio"
    }
}
