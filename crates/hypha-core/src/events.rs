// crates/hypha-core/src/events.rs
//
// Notifications produced by the engine for external observers (dashboards,
// indexers, log sinks). Events are emitted only for operations that fully
// succeeded; a rejected call never produces one.

use serde::{Deserialize, Serialize};

use crate::identity::{Address, NodeId, ReportId};
use crate::{Amount, Timestamp};

/// Events emitted by the engine, in the order the state changes happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A node registered and became Active.
    NodeRegistered {
        node: NodeId,
        operator: Address,
        region: String,
        stake: Amount,
    },
    /// The oracle pushed fresh telemetry for a node.
    NodeMetricsUpdated {
        node: NodeId,
        quality_score: u64,
        bytes_served_total: u64,
    },
    /// A node withdrew its pending rewards.
    RewardsClaimed { node: NodeId, amount: Amount },
    /// A node started unbonding.
    ExitInitiated {
        node: NodeId,
        unlocks_at: Timestamp,
    },
    /// A node finished unbonding and recovered its balances.
    NodeExited {
        node: NodeId,
        stake_returned: Amount,
        rewards_returned: Amount,
    },
    /// The rewards pool received funds.
    RewardsPoolFunded { amount: Amount, balance: Amount },
    /// A reward epoch completed.
    EpochCompleted {
        epoch: u64,
        total_distributed: Amount,
        node_count: usize,
    },
    /// A misbehavior report was filed.
    ReportSubmitted {
        report: ReportId,
        reporter: Address,
        accused: NodeId,
        slash_amount: Amount,
    },
    /// A reviewer cast a vote on a report.
    ReportReviewed {
        report: ReportId,
        reviewer: Address,
        confirm: bool,
        confirms: u32,
        rejects: u32,
    },
    /// A confirmed report forfeited part of a node's stake.
    SlashExecuted {
        report: ReportId,
        node: NodeId,
        amount: Amount,
        reporter_reward: Amount,
        node_slashed: bool,
    },
    /// A report was rejected by vote or by expiry.
    ReportRejected {
        report: ReportId,
        expired: bool,
        reporter_penalty: Amount,
    },
    /// A reporter withdrew refunds and bonuses.
    ReporterPaid { reporter: Address, amount: Amount },
    /// An administrative parameter changed.
    ConfigUpdated { setting: String },
}

impl EngineEvent {
    /// Stable event name, matching the serialized `type` tag.
    pub fn name(&self) -> &'static str {
        match self {
            EngineEvent::NodeRegistered { .. } => "node_registered",
            EngineEvent::NodeMetricsUpdated { .. } => "node_metrics_updated",
            EngineEvent::RewardsClaimed { .. } => "rewards_claimed",
            EngineEvent::ExitInitiated { .. } => "exit_initiated",
            EngineEvent::NodeExited { .. } => "node_exited",
            EngineEvent::RewardsPoolFunded { .. } => "rewards_pool_funded",
            EngineEvent::EpochCompleted { .. } => "epoch_completed",
            EngineEvent::ReportSubmitted { .. } => "report_submitted",
            EngineEvent::ReportReviewed { .. } => "report_reviewed",
            EngineEvent::SlashExecuted { .. } => "slash_executed",
            EngineEvent::ReportRejected { .. } => "report_rejected",
            EngineEvent::ReporterPaid { .. } => "reporter_paid",
            EngineEvent::ConfigUpdated { .. } => "config_updated",
        }
    }
}
