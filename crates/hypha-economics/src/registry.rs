// crates/hypha-economics/src/registry.rs
//
// Node Registry: the canonical record of every CDN node.
//
// Records live in an arena indexed by `NodeId`; an operator index maps each
// address to its single record. The registry never calls out: the reward
// distributor and slashing arbiter read it and write through its entry
// points. Stake decreases only through `slash` or `complete_exit`.
//
// Lifecycle:
//   (register) -> Active -> Exiting -> Inactive
//                 Active  -> Slashed -> Inactive
//                 Exiting -> Slashed
//
// Every operation validates fully before mutating, so a rejected call
// leaves the registry untouched.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use hypha_core::{Address, Amount, HyphaError, NodeId, Timestamp, MAX_QUALITY_SCORE};

use crate::config::EconomicsConfig;
use crate::slashing::Offense;

/// Default number of nodes returned by `best_nodes_for_region`.
pub const DEFAULT_ROUTING_LIMIT: usize = 5;

/// Region label that matches every node in routing queries.
pub const GLOBAL_REGION: &str = "global";

/// Lifecycle status of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NodeStatus {
    /// Exited (or never active). Holds no stake.
    Inactive,
    /// Serving content and eligible for rewards.
    Active,
    /// Unbonding after a voluntary exit; stake still at risk of slashing.
    Exiting,
    /// Stake fell below the minimum after a slash. Earns nothing further.
    Slashed,
}

impl NodeStatus {
    /// The single source of truth for legal lifecycle transitions.
    pub fn can_transition_to(self, next: NodeStatus) -> bool {
        matches!(
            (self, next),
            (NodeStatus::Inactive, NodeStatus::Active)
                | (NodeStatus::Active, NodeStatus::Exiting)
                | (NodeStatus::Active, NodeStatus::Slashed)
                | (NodeStatus::Exiting, NodeStatus::Inactive)
                | (NodeStatus::Exiting, NodeStatus::Slashed)
                | (NodeStatus::Slashed, NodeStatus::Inactive)
        )
    }

    /// Validate a transition and return the target status.
    ///
    /// # Errors
    /// Returns `HyphaError::InvalidState` naming both ends of an illegal transition.
    pub fn transition(self, next: NodeStatus) -> Result<NodeStatus, HyphaError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(HyphaError::InvalidState(format!(
                "Invalid node transition: {} -> {}",
                self, next
            )))
        }
    }
}

impl fmt::Display for NodeStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeStatus::Inactive => write!(f, "Inactive"),
            NodeStatus::Active => write!(f, "Active"),
            NodeStatus::Exiting => write!(f, "Exiting"),
            NodeStatus::Slashed => write!(f, "Slashed"),
        }
    }
}

/// A registered CDN node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    /// Arena index of this record.
    pub id: NodeId,
    /// Operator account. Controls claims and exit.
    pub operator: Address,
    /// Network endpoint descriptor (e.g. an IPFS peer id).
    pub peer_id: String,
    /// Declared geographic region.
    pub region: String,
    /// Staked collateral.
    pub stake: Amount,
    /// Rewards credited but not yet claimed.
    pub pending_rewards: Amount,
    /// Everything ever credited to this node: the initial stake plus all rewards.
    pub credited_total: Amount,
    /// Cumulative bytes served, as reported by the oracle.
    pub bytes_served: u64,
    /// Cumulative successful requests.
    pub successful_requests: u64,
    /// Cumulative failed requests.
    pub failed_requests: u64,
    /// Current quality score in bps (0..=10_000).
    pub quality_score: u64,
    /// Number of executed slashes against this node.
    pub slash_count: u32,
    /// Lifecycle status.
    pub status: NodeStatus,
    /// Registration time.
    pub registered_at: Timestamp,
    /// Time of the last accepted oracle update.
    pub last_metrics_at: Option<Timestamp>,
    /// Start of the unbonding hold, set by `initiate_exit`.
    pub exit_requested_at: Option<Timestamp>,
    /// Time the node entered `Slashed`.
    pub slashed_at: Option<Timestamp>,
    /// `bytes_served` at the last reward distribution.
    pub epoch_bytes_baseline: u64,
}

impl Node {
    /// Successful plus failed requests.
    pub fn total_requests(&self) -> u64 {
        self.successful_requests.saturating_add(self.failed_requests)
    }

    /// Bytes served since the last reward distribution.
    pub fn bytes_this_epoch(&self) -> u64 {
        self.bytes_served.saturating_sub(self.epoch_bytes_baseline)
    }

    /// Earliest time `complete_exit` may succeed, if the node is unbonding.
    pub fn unlocks_at(&self, unbonding_period_secs: u64) -> Option<Timestamp> {
        let started = match self.status {
            NodeStatus::Exiting => self.exit_requested_at?,
            NodeStatus::Slashed => self.slashed_at?,
            NodeStatus::Active | NodeStatus::Inactive => return None,
        };
        Some(started.saturating_add(unbonding_period_secs))
    }
}

/// Telemetry deltas pushed by the oracle for one node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct MetricsUpdate {
    /// New quality score (bps). Overwrites the previous one.
    pub quality_score: u64,
    pub bytes_served_delta: u64,
    pub successful_requests_delta: u64,
    pub failed_requests_delta: u64,
}

/// Result of a registry slash.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashOutcome {
    /// Stake actually forfeited (requested amount capped at the stake).
    pub slashed: Amount,
    /// Stake left afterwards.
    pub remaining: Amount,
    /// Whether the node was moved to `Slashed` by this call.
    pub moved_to_slashed: bool,
}

/// Arena-backed store of node records plus the aggregate counters.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NodeRegistry {
    nodes: Vec<Node>,
    by_operator: HashMap<Address, NodeId>,
    total_staked: Amount,
    active_nodes: usize,
}

impl NodeRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new node in `Active` status.
    ///
    /// # Errors
    /// - `Validation` if peer id or region is empty, or `stake < min_stake`.
    /// - `InvalidState` if the operator already has a record.
    pub fn register(
        &mut self,
        operator: Address,
        peer_id: &str,
        region: &str,
        stake: Amount,
        config: &EconomicsConfig,
        now: Timestamp,
    ) -> Result<NodeId, HyphaError> {
        let peer_id = peer_id.trim();
        let region = region.trim();
        if peer_id.is_empty() {
            return Err(HyphaError::Validation("peer_id must not be empty".to_string()));
        }
        if region.is_empty() {
            return Err(HyphaError::Validation("region must not be empty".to_string()));
        }
        if let Some(existing) = self.by_operator.get(&operator) {
            return Err(HyphaError::InvalidState(format!(
                "Operator {} is already registered as {}",
                operator, existing
            )));
        }
        if stake < config.min_stake {
            return Err(HyphaError::Validation(format!(
                "Stake {} is below the minimum of {}",
                stake, config.min_stake
            )));
        }
        let total_staked = self.total_staked.checked_add(stake).ok_or_else(|| {
            HyphaError::Validation("Stake overflows the total staked counter".to_string())
        })?;
        let index = u32::try_from(self.nodes.len())
            .map_err(|_| HyphaError::InvalidState("Node registry is full".to_string()))?;
        let status = NodeStatus::Inactive.transition(NodeStatus::Active)?;

        let id = NodeId(index);
        self.nodes.push(Node {
            id,
            operator: operator.clone(),
            peer_id: peer_id.to_string(),
            region: region.to_string(),
            stake,
            pending_rewards: 0,
            credited_total: stake,
            bytes_served: 0,
            successful_requests: 0,
            failed_requests: 0,
            quality_score: 0,
            slash_count: 0,
            status,
            registered_at: now,
            last_metrics_at: None,
            exit_requested_at: None,
            slashed_at: None,
            epoch_bytes_baseline: 0,
        });
        self.by_operator.insert(operator, id);
        self.total_staked = total_staked;
        self.active_nodes += 1;

        tracing::info!(node = %id, stake, region, "Node registered");
        Ok(id)
    }

    /// Accumulate oracle telemetry into an Active node.
    ///
    /// Authorization is enforced upstream by the oracle gate; the registry
    /// only checks that the update is possible.
    pub fn update_metrics(
        &mut self,
        id: NodeId,
        update: &MetricsUpdate,
        now: Timestamp,
    ) -> Result<&Node, HyphaError> {
        if update.quality_score > MAX_QUALITY_SCORE {
            return Err(HyphaError::Validation(format!(
                "Quality score {} exceeds {}",
                update.quality_score, MAX_QUALITY_SCORE
            )));
        }
        let node = self.get(id)?;
        require_status(node, NodeStatus::Active, "receive metrics")?;

        let overflow = || HyphaError::Validation(format!("Metrics counters overflow for {}", id));
        let bytes = node
            .bytes_served
            .checked_add(update.bytes_served_delta)
            .ok_or_else(overflow)?;
        let successes = node
            .successful_requests
            .checked_add(update.successful_requests_delta)
            .ok_or_else(overflow)?;
        let failures = node
            .failed_requests
            .checked_add(update.failed_requests_delta)
            .ok_or_else(overflow)?;

        let node = self.node_mut(id)?;
        node.bytes_served = bytes;
        node.successful_requests = successes;
        node.failed_requests = failures;
        node.quality_score = update.quality_score;
        node.last_metrics_at = Some(now);

        tracing::debug!(
            node = %id,
            quality = update.quality_score,
            bytes_served = bytes,
            "Node metrics updated"
        );
        Ok(node)
    }

    /// Pay out the full pending-reward balance of an Active node.
    pub fn claim_rewards(&mut self, id: NodeId) -> Result<Amount, HyphaError> {
        let node = self.get(id)?;
        require_status(node, NodeStatus::Active, "claim rewards")?;
        if node.pending_rewards == 0 {
            return Err(HyphaError::InvalidState(format!(
                "{} has no pending rewards",
                id
            )));
        }

        let node = self.node_mut(id)?;
        let amount = std::mem::take(&mut node.pending_rewards);
        tracing::info!(node = %id, amount, "Rewards claimed");
        Ok(amount)
    }

    /// Start the unbonding hold. Irreversible.
    ///
    /// Returns the time at which `complete_exit` becomes possible.
    pub fn initiate_exit(
        &mut self,
        id: NodeId,
        config: &EconomicsConfig,
        now: Timestamp,
    ) -> Result<Timestamp, HyphaError> {
        let next = self.get(id)?.status.transition(NodeStatus::Exiting)?;

        let node = self.node_mut(id)?;
        node.status = next;
        node.exit_requested_at = Some(now);
        self.active_nodes = self.active_nodes.saturating_sub(1);

        let unlocks_at = now.saturating_add(config.unbonding_period_secs);
        tracing::info!(node = %id, unlocks_at, "Node exit initiated");
        Ok(unlocks_at)
    }

    /// Finish unbonding: return stake plus pending rewards and go `Inactive`.
    ///
    /// Also available to `Slashed` nodes holding residual stake, with the
    /// unbonding period counted from the slash.
    ///
    /// Returns `(stake_returned, rewards_returned)`.
    pub fn complete_exit(
        &mut self,
        id: NodeId,
        config: &EconomicsConfig,
        now: Timestamp,
    ) -> Result<(Amount, Amount), HyphaError> {
        let node = self.get(id)?;
        let next = node.status.transition(NodeStatus::Inactive)?;
        let unlocks_at = node.unlocks_at(config.unbonding_period_secs).ok_or_else(|| {
            HyphaError::InvalidState(format!("{} has no unbonding start time", id))
        })?;
        if now < unlocks_at {
            return Err(HyphaError::Timing(format!(
                "{} is unbonding until {} ({}s remaining)",
                id,
                unlocks_at,
                unlocks_at - now
            )));
        }

        let node = self.node_mut(id)?;
        let stake = std::mem::take(&mut node.stake);
        let rewards = std::mem::take(&mut node.pending_rewards);
        node.status = next;
        self.total_staked = self.total_staked.saturating_sub(stake);

        tracing::info!(node = %id, stake, rewards, "Node exited");
        Ok((stake, rewards))
    }

    /// Forfeit part of a node's stake. Only the slashing arbiter calls this.
    ///
    /// The amount is capped at the current stake. If the remaining stake is
    /// below the minimum, an Active or Exiting node is forced to `Slashed`.
    pub(crate) fn slash(
        &mut self,
        id: NodeId,
        amount: Amount,
        reason: Offense,
        config: &EconomicsConfig,
        now: Timestamp,
    ) -> Result<SlashOutcome, HyphaError> {
        let node = self.get(id)?;
        let slashed = amount.min(node.stake);
        let remaining = node.stake - slashed;
        let was_active = node.status == NodeStatus::Active;
        let next = if remaining < config.min_stake
            && node.status.can_transition_to(NodeStatus::Slashed)
        {
            Some(node.status.transition(NodeStatus::Slashed)?)
        } else {
            None
        };

        let node = self.node_mut(id)?;
        node.stake = remaining;
        node.slash_count = node.slash_count.saturating_add(1);
        if let Some(status) = next {
            node.status = status;
            node.slashed_at = Some(now);
        }
        self.total_staked = self.total_staked.saturating_sub(slashed);
        if next.is_some() && was_active {
            self.active_nodes = self.active_nodes.saturating_sub(1);
        }

        tracing::info!(
            node = %id,
            reason = %reason,
            slashed,
            remaining,
            moved_to_slashed = next.is_some(),
            "Node stake slashed"
        );
        Ok(SlashOutcome {
            slashed,
            remaining,
            moved_to_slashed: next.is_some(),
        })
    }

    /// Add an epoch reward to a node's pending balance.
    pub(crate) fn credit_reward(&mut self, id: NodeId, amount: Amount) -> Result<(), HyphaError> {
        let node = self.node_mut(id)?;
        node.pending_rewards = node.pending_rewards.saturating_add(amount);
        node.credited_total = node.credited_total.saturating_add(amount);
        Ok(())
    }

    /// Record every node's cumulative bytes as the next epoch's baseline.
    pub(crate) fn snapshot_epoch_baselines(&mut self) {
        for node in &mut self.nodes {
            node.epoch_bytes_baseline = node.bytes_served;
        }
    }

    /// Look up a node by id.
    pub fn get(&self, id: NodeId) -> Result<&Node, HyphaError> {
        self.nodes
            .get(id.0 as usize)
            .ok_or_else(|| HyphaError::NotFound(format!("{} is not registered", id)))
    }

    /// Resolve an operator address to its node id.
    pub fn id_of(&self, operator: &Address) -> Result<NodeId, HyphaError> {
        self.by_operator.get(operator).copied().ok_or_else(|| {
            HyphaError::NotFound(format!("Operator {} has no registered node", operator))
        })
    }

    /// Look up a node by operator address.
    pub fn get_by_operator(&self, operator: &Address) -> Result<&Node, HyphaError> {
        self.get(self.id_of(operator)?)
    }

    /// All node records, in registration order.
    pub fn nodes(&self) -> &[Node] {
        &self.nodes
    }

    /// Nodes currently in `Active` status.
    pub fn active(&self) -> impl Iterator<Item = &Node> {
        self.nodes.iter().filter(|n| n.status == NodeStatus::Active)
    }

    /// Sum of all node stakes.
    pub fn total_staked(&self) -> Amount {
        self.total_staked
    }

    /// Number of nodes in `Active` status.
    pub fn active_node_count(&self) -> usize {
        self.active_nodes
    }

    /// Best Active nodes for serving a region, by quality then bytes served.
    ///
    /// The region `"global"` matches every node.
    pub fn best_nodes_for_region(&self, region: &str, limit: usize) -> Vec<&Node> {
        let mut candidates: Vec<&Node> = self
            .active()
            .filter(|n| region == GLOBAL_REGION || n.region.eq_ignore_ascii_case(region))
            .collect();
        candidates.sort_by(|a, b| {
            b.quality_score
                .cmp(&a.quality_score)
                .then(b.bytes_served.cmp(&a.bytes_served))
                .then(a.id.cmp(&b.id))
        });
        candidates.truncate(limit);
        candidates
    }

    /// Audit the aggregate counters against the individual records.
    pub fn check_invariants(&self) -> Result<(), HyphaError> {
        let stake_sum: u128 = self.nodes.iter().map(|n| n.stake as u128).sum();
        if stake_sum != self.total_staked as u128 {
            return Err(HyphaError::InvalidState(format!(
                "total_staked {} != sum of stakes {}",
                self.total_staked, stake_sum
            )));
        }

        let active = self.active().count();
        if active != self.active_nodes {
            return Err(HyphaError::InvalidState(format!(
                "active counter {} != {} Active nodes",
                self.active_nodes, active
            )));
        }

        for node in &self.nodes {
            let held = (node.stake as u128) + (node.pending_rewards as u128);
            if held > node.credited_total as u128 {
                return Err(HyphaError::InvalidState(format!(
                    "{} holds {} but was only ever credited {}",
                    node.id, held, node.credited_total
                )));
            }
        }
        Ok(())
    }

    fn node_mut(&mut self, id: NodeId) -> Result<&mut Node, HyphaError> {
        self.nodes
            .get_mut(id.0 as usize)
            .ok_or_else(|| HyphaError::NotFound(format!("{} is not registered", id)))
    }
}

fn require_status(node: &Node, required: NodeStatus, action: &str) -> Result<(), HyphaError> {
    if node.status == required {
        Ok(())
    } else {
        Err(HyphaError::InvalidState(format!(
            "{} must be {} to {} (is {})",
            node.id, required, action, node.status
        )))
    }
}
