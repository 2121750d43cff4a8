// crates/hypha-economics/src/rewards.rs
//
// Epoch reward distribution for the Hypha incentive engine.
//
// Once per epoch, anyone may trigger a distribution. The amount paid out is
//   distributable = min(rewards_per_epoch, rewards_pool)
// and is split between eligible nodes (Active, quality >= min_quality_score)
// in proportion to a three-factor weight. Each factor is on a bps scale:
//
//   weight = quality_score              * w_quality
//          + bytes_share_of_epoch_bps   * w_bytes
//          + success_rate_bps           * w_uptime
//
// with w_quality + w_bytes + w_uptime = 100. Shares are truncated; rounding
// dust stays in the pool. Bytes are measured against each node's baseline
// from the previous distribution.

use serde::{Deserialize, Serialize};

use hypha_core::{mul_div, ratio_bps, Amount, HyphaError, NodeId, Timestamp, BPS_DENOMINATOR};

use crate::config::{EconomicsConfig, RewardWeights};
use crate::registry::{Node, NodeRegistry};
use crate::treasury::Treasury;

/// Weight assigned to one eligible node for the coming distribution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct NodeWeight {
    pub node: NodeId,
    pub weight: u64,
}

/// Outcome of a completed reward epoch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochSummary {
    /// Number of the epoch just completed (1-based).
    pub epoch: u64,
    /// Sum actually credited to nodes and drawn from the pool.
    pub total_distributed: Amount,
    /// Eligible nodes that took part.
    pub node_count: usize,
    /// Per-node credits, in node id order.
    pub payouts: Vec<(NodeId, Amount)>,
    pub distributed_at: Timestamp,
}

/// Epoch clock and distribution algorithm.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardDistributor {
    epoch: u64,
    last_distribution_at: Timestamp,
}

impl RewardDistributor {
    /// Start the epoch clock at `genesis`; the first distribution is due one
    /// epoch later.
    pub fn new(genesis: Timestamp) -> Self {
        Self {
            epoch: 0,
            last_distribution_at: genesis,
        }
    }

    /// Number of completed epochs.
    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Time of the last successful distribution (or genesis).
    pub fn last_distribution_at(&self) -> Timestamp {
        self.last_distribution_at
    }

    /// Earliest time the next distribution may run.
    pub fn next_distribution_at(&self, config: &EconomicsConfig) -> Timestamp {
        self.last_distribution_at
            .saturating_add(config.epoch_duration_secs)
    }

    /// Run one epoch: credit every eligible node and draw the pool.
    ///
    /// # Errors
    /// - `Timing` if the epoch duration has not elapsed.
    /// - `InvalidState` if no node is eligible or all weights are zero. The
    ///   epoch clock does not advance and the pool is untouched.
    pub fn distribute(
        &mut self,
        registry: &mut NodeRegistry,
        treasury: &mut Treasury,
        config: &EconomicsConfig,
        now: Timestamp,
    ) -> Result<EpochSummary, HyphaError> {
        let due = self.next_distribution_at(config);
        if now < due {
            return Err(HyphaError::Timing(format!(
                "Epoch {} is not due until {} ({}s remaining)",
                self.epoch + 1,
                due,
                due - now
            )));
        }

        let weights = eligible_weights(registry, config);
        if weights.is_empty() {
            return Err(HyphaError::InvalidState(
                "No nodes are eligible for rewards this epoch".to_string(),
            ));
        }
        if weights.iter().all(|w| w.weight == 0) {
            return Err(HyphaError::InvalidState(format!(
                "All {} eligible nodes have zero weight; rewards stay in the pool",
                weights.len()
            )));
        }

        let distributable = config.rewards_per_epoch.min(treasury.rewards_pool());
        let payouts = allocate(distributable, &weights);
        let total_distributed: Amount = payouts.iter().map(|(_, amount)| *amount).sum();

        // Pool first: it is the only step that can fail after validation.
        treasury.draw_rewards(total_distributed)?;
        for (node, amount) in &payouts {
            if *amount > 0 {
                registry.credit_reward(*node, *amount)?;
            }
        }
        registry.snapshot_epoch_baselines();
        self.epoch += 1;
        self.last_distribution_at = now;

        tracing::info!(
            epoch = self.epoch,
            total_distributed,
            distributable,
            nodes = payouts.len(),
            "Reward epoch completed"
        );

        Ok(EpochSummary {
            epoch: self.epoch,
            total_distributed,
            node_count: payouts.len(),
            payouts,
            distributed_at: now,
        })
    }

    /// Approximate what `node` would receive if the epoch ran now.
    ///
    /// Returns 0 for unknown or ineligible nodes. Never mutates state.
    pub fn estimate(
        &self,
        registry: &NodeRegistry,
        treasury: &Treasury,
        config: &EconomicsConfig,
        node: NodeId,
    ) -> Amount {
        let weights = eligible_weights(registry, config);
        let distributable = config.rewards_per_epoch.min(treasury.rewards_pool());
        allocate(distributable, &weights)
            .into_iter()
            .find(|(id, _)| *id == node)
            .map(|(_, amount)| amount)
            .unwrap_or(0)
    }
}

/// Compute the weight of every eligible node, in node id order.
pub fn eligible_weights(registry: &NodeRegistry, config: &EconomicsConfig) -> Vec<NodeWeight> {
    let eligible: Vec<&Node> = registry
        .active()
        .filter(|n| n.quality_score >= config.min_quality_score)
        .collect();
    let total_bytes: u128 = eligible.iter().map(|n| n.bytes_this_epoch() as u128).sum();

    eligible
        .iter()
        .map(|n| NodeWeight {
            node: n.id,
            weight: node_weight(n, total_bytes, &config.reward_weights),
        })
        .collect()
}

/// Three-factor weight of one node.
///
/// `total_bytes` is the epoch's bytes across all eligible nodes.
pub fn node_weight(node: &Node, total_bytes: u128, weights: &RewardWeights) -> u64 {
    let quality = node.quality_score.min(BPS_DENOMINATOR);
    let bytes_share = if total_bytes == 0 {
        0
    } else {
        ((node.bytes_this_epoch() as u128) * (BPS_DENOMINATOR as u128) / total_bytes) as u64
    };
    let success_rate = ratio_bps(node.successful_requests, node.total_requests());

    quality * weights.quality + bytes_share * weights.bytes + success_rate * weights.uptime
}

/// Split `distributable` proportionally to `weights`, truncating each share.
///
/// The returned sum never exceeds `distributable`.
pub fn allocate(distributable: Amount, weights: &[NodeWeight]) -> Vec<(NodeId, Amount)> {
    let total: u128 = weights.iter().map(|w| w.weight as u128).sum();
    weights
        .iter()
        .map(|w| {
            let share = if total == 0 {
                0
            } else if let Ok(total) = u64::try_from(total) {
                mul_div(distributable, w.weight, total)
            } else {
                ((distributable as u128) * (w.weight as u128) / total) as u64
            };
            (w.node, share)
        })
        .collect()
}
