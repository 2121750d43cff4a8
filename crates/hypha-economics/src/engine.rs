// crates/hypha-economics/src/engine.rs
//
// The single-writer facade over the registry, distributor, arbiter,
// treasury and oracle gate.
//
// Every mutating method takes `&mut self`, runs all of its checks before
// touching state, and records one or more `EngineEvent`s only on success.
// Callers identify themselves with an `Address`; operator-scoped calls act
// on the caller's own node. Time is always supplied by the caller.

use serde::{Deserialize, Serialize};

use hypha_core::{Address, Amount, EngineEvent, HyphaError, NodeId, ReportId, Timestamp};

use crate::config::{AdminAction, EconomicsConfig};
use crate::oracle::{OracleGate, SignedMetricsReport};
use crate::registry::{Node, NodeRegistry};
use crate::rewards::{EpochSummary, RewardDistributor};
use crate::slashing::{Offense, ReportStatus, Resolution, SlashReport, SlashingArbiter};
use crate::treasury::Treasury;

/// Snapshot of the epoch clock and treasury balances.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpochStatus {
    pub epoch: u64,
    pub last_distribution_at: Timestamp,
    pub next_distribution_at: Timestamp,
    pub rewards_pool: Amount,
    pub forfeited: Amount,
    pub total_distributed: Amount,
}

/// The CDN incentive engine.
#[derive(Debug, Clone)]
pub struct Engine {
    config: EconomicsConfig,
    admin: Address,
    registry: NodeRegistry,
    distributor: RewardDistributor,
    arbiter: SlashingArbiter,
    treasury: Treasury,
    oracle: OracleGate,
    events: Vec<EngineEvent>,
}

impl Engine {
    /// Build an engine whose first epoch starts at `genesis`.
    ///
    /// # Errors
    /// `Validation` if the configuration is inconsistent.
    pub fn new(
        config: EconomicsConfig,
        admin: Address,
        oracle: OracleGate,
        reviewers: impl IntoIterator<Item = Address>,
        genesis: Timestamp,
    ) -> Result<Self, HyphaError> {
        config.validate()?;
        Ok(Self {
            config,
            admin,
            registry: NodeRegistry::new(),
            distributor: RewardDistributor::new(genesis),
            arbiter: SlashingArbiter::new(reviewers),
            treasury: Treasury::new(),
            oracle,
            events: Vec::new(),
        })
    }

    // ------------------------------------------------------------------
    // Node lifecycle
    // ------------------------------------------------------------------

    /// Register the caller's node with the given stake.
    pub fn register_node(
        &mut self,
        caller: &Address,
        peer_id: &str,
        region: &str,
        stake: Amount,
        now: Timestamp,
    ) -> Result<NodeId, HyphaError> {
        let id = rejected(
            "register_node",
            self.registry
                .register(caller.clone(), peer_id, region, stake, &self.config, now),
        )?;
        let node = self.registry.get(id)?;
        self.events.push(EngineEvent::NodeRegistered {
            node: id,
            operator: caller.clone(),
            region: node.region.clone(),
            stake,
        });
        Ok(id)
    }

    /// Apply an authenticated oracle push.
    ///
    /// The replay counter advances only if the registry accepts the update.
    pub fn ingest_metrics(
        &mut self,
        signed: &SignedMetricsReport,
        now: Timestamp,
    ) -> Result<(), HyphaError> {
        rejected(
            "ingest_metrics",
            self.oracle
                .verify(signed, self.config.oracle_max_staleness_secs, now),
        )?;
        let report = &signed.report;
        let node = rejected(
            "ingest_metrics",
            self.registry.update_metrics(report.node, &report.update(), now),
        )?;
        let event = EngineEvent::NodeMetricsUpdated {
            node: node.id,
            quality_score: node.quality_score,
            bytes_served_total: node.bytes_served,
        };
        self.oracle.commit(report.sequence);
        self.events.push(event);
        Ok(())
    }

    /// Withdraw the caller's pending rewards.
    pub fn claim_rewards(&mut self, caller: &Address) -> Result<Amount, HyphaError> {
        let id = rejected("claim_rewards", self.registry.id_of(caller))?;
        let amount = rejected("claim_rewards", self.registry.claim_rewards(id))?;
        self.events.push(EngineEvent::RewardsClaimed { node: id, amount });
        Ok(amount)
    }

    /// Start unbonding the caller's node.
    pub fn initiate_exit(&mut self, caller: &Address, now: Timestamp) -> Result<Timestamp, HyphaError> {
        let id = rejected("initiate_exit", self.registry.id_of(caller))?;
        let unlocks_at = rejected(
            "initiate_exit",
            self.registry.initiate_exit(id, &self.config, now),
        )?;
        self.events.push(EngineEvent::ExitInitiated {
            node: id,
            unlocks_at,
        });
        Ok(unlocks_at)
    }

    /// Finish unbonding the caller's node, returning `(stake, rewards)`.
    ///
    /// Refused while any report against the node is still open.
    pub fn complete_exit(
        &mut self,
        caller: &Address,
        now: Timestamp,
    ) -> Result<(Amount, Amount), HyphaError> {
        let id = rejected("complete_exit", self.registry.id_of(caller))?;
        let open = self
            .arbiter
            .reports()
            .iter()
            .filter(|r| r.accused == id && r.is_open())
            .count();
        if open > 0 {
            tracing::debug!(node = %id, open, "Rejected complete_exit with open reports");
            return Err(HyphaError::InvalidState(format!(
                "{} has {} open report(s) pending review",
                id, open
            )));
        }
        let (stake_returned, rewards_returned) = rejected(
            "complete_exit",
            self.registry.complete_exit(id, &self.config, now),
        )?;
        self.events.push(EngineEvent::NodeExited {
            node: id,
            stake_returned,
            rewards_returned,
        });
        Ok((stake_returned, rewards_returned))
    }

    // ------------------------------------------------------------------
    // Rewards
    // ------------------------------------------------------------------

    /// Add funds to the rewards pool. Anyone may call this.
    pub fn fund_rewards_pool(&mut self, amount: Amount) -> Result<Amount, HyphaError> {
        let balance = rejected("fund_rewards_pool", self.treasury.fund_rewards(amount))?;
        self.events
            .push(EngineEvent::RewardsPoolFunded { amount, balance });
        Ok(balance)
    }

    /// Run the epoch distribution if it is due. Anyone may call this.
    pub fn distribute_rewards(&mut self, now: Timestamp) -> Result<EpochSummary, HyphaError> {
        let summary = rejected(
            "distribute_rewards",
            self.distributor
                .distribute(&mut self.registry, &mut self.treasury, &self.config, now),
        )?;
        self.events.push(EngineEvent::EpochCompleted {
            epoch: summary.epoch,
            total_distributed: summary.total_distributed,
            node_count: summary.node_count,
        });
        Ok(summary)
    }

    /// What `node` would receive if the epoch ran now (0 when ineligible).
    pub fn estimate_rewards(&self, node: NodeId) -> Amount {
        self.distributor
            .estimate(&self.registry, &self.treasury, &self.config, node)
    }

    // ------------------------------------------------------------------
    // Slashing
    // ------------------------------------------------------------------

    /// File a misbehavior report, posting `stake` from the caller.
    pub fn submit_report(
        &mut self,
        caller: &Address,
        accused: NodeId,
        offense: Offense,
        evidence: &str,
        stake: Amount,
        now: Timestamp,
    ) -> Result<ReportId, HyphaError> {
        let id = rejected(
            "submit_report",
            self.arbiter.submit_report(
                caller.clone(),
                accused,
                offense,
                evidence,
                stake,
                &self.registry,
                &self.config,
                now,
            ),
        )?;
        let report = self.arbiter.get(id)?;
        self.events.push(EngineEvent::ReportSubmitted {
            report: id,
            reporter: caller.clone(),
            accused,
            slash_amount: report.slash_amount,
        });
        Ok(id)
    }

    /// Cast the caller's review vote.
    pub fn vote_on_report(
        &mut self,
        caller: &Address,
        report: ReportId,
        confirm: bool,
        now: Timestamp,
    ) -> Result<ReportStatus, HyphaError> {
        let status = rejected(
            "vote_on_report",
            self.arbiter.vote(
                caller,
                report,
                confirm,
                &mut self.registry,
                &mut self.treasury,
                &self.config,
                now,
            ),
        )?;
        let resolved = self.arbiter.get(report)?;
        self.events.push(EngineEvent::ReportReviewed {
            report,
            reviewer: caller.clone(),
            confirm,
            confirms: resolved.confirms,
            rejects: resolved.rejects,
        });
        if let Some(resolution) = resolved.resolution {
            let event = resolution_event(resolved, &resolution);
            self.events.push(event);
        }
        Ok(status)
    }

    /// Reject an open report whose review period has elapsed. Anyone may call this.
    pub fn check_expired_report(
        &mut self,
        report: ReportId,
        now: Timestamp,
    ) -> Result<Resolution, HyphaError> {
        let resolution = rejected(
            "check_expired_report",
            self.arbiter
                .check_expired_report(report, &mut self.treasury, &self.config, now),
        )?;
        self.events.push(EngineEvent::ReportRejected {
            report,
            expired: true,
            reporter_penalty: resolution.reporter_penalty,
        });
        Ok(resolution)
    }

    /// Withdraw the refunds and bonuses owed to the caller as a reporter.
    pub fn claim_reporter_payout(&mut self, caller: &Address) -> Result<Amount, HyphaError> {
        let amount = rejected("claim_reporter_payout", self.arbiter.claim_payout(caller))?;
        self.events.push(EngineEvent::ReporterPaid {
            reporter: caller.clone(),
            amount,
        });
        Ok(amount)
    }

    // ------------------------------------------------------------------
    // Administration
    // ------------------------------------------------------------------

    /// Apply an administrative change on behalf of `caller`.
    pub fn apply_admin(&mut self, caller: &Address, action: &AdminAction) -> Result<(), HyphaError> {
        if caller != &self.admin {
            tracing::debug!(%caller, "Rejected admin action from non-admin");
            return Err(HyphaError::Unauthorized(format!(
                "{} is not the administrator",
                caller
            )));
        }

        let setting = match action {
            AdminAction::AddReviewer { reviewer } => {
                rejected("apply_admin", self.arbiter.add_reviewer(reviewer.clone()))?;
                "reviewers"
            }
            AdminAction::RemoveReviewer { reviewer } => {
                rejected("apply_admin", self.arbiter.remove_reviewer(reviewer))?;
                "reviewers"
            }
            AdminAction::RotateOracleKey { public_key } => {
                rejected("apply_admin", self.oracle.rotate_key(public_key))?;
                "oracle_public_key"
            }
            other => rejected("apply_admin", self.config.apply(other))?,
        };

        if !self.quorum_reachable() {
            tracing::warn!(
                quorum = self.config.vote_quorum,
                reviewers = self.arbiter.reviewers().len(),
                "Vote quorum exceeds the reviewer set; reports can only expire"
            );
        }

        tracing::info!(setting, "Configuration updated");
        self.events.push(EngineEvent::ConfigUpdated {
            setting: setting.to_string(),
        });
        Ok(())
    }

    /// Whether the designated reviewers can reach the vote quorum.
    pub fn quorum_reachable(&self) -> bool {
        usize::try_from(self.config.vote_quorum)
            .map(|quorum| quorum <= self.arbiter.reviewers().len())
            .unwrap_or(false)
    }

    /// Drain the events recorded since the last call.
    pub fn take_events(&mut self) -> Vec<EngineEvent> {
        std::mem::take(&mut self.events)
    }

    /// Audit the cross-component accounting invariants.
    pub fn check_invariants(&self) -> Result<(), HyphaError> {
        self.registry.check_invariants()?;

        let held: u128 = self
            .arbiter
            .reports()
            .iter()
            .filter(|r| r.is_open())
            .map(|r| r.reporter_stake as u128)
            .sum();
        if held != self.arbiter.escrowed() as u128 {
            return Err(HyphaError::InvalidState(format!(
                "escrow {} != open reporter stake {}",
                self.arbiter.escrowed(),
                held
            )));
        }

        let weights = self.config.reward_weights;
        weights.validate()?;
        Ok(())
    }

    // ------------------------------------------------------------------
    // Queries
    // ------------------------------------------------------------------

    pub fn config(&self) -> &EconomicsConfig {
        &self.config
    }

    pub fn admin(&self) -> &Address {
        &self.admin
    }

    pub fn registry(&self) -> &NodeRegistry {
        &self.registry
    }

    pub fn arbiter(&self) -> &SlashingArbiter {
        &self.arbiter
    }

    pub fn treasury(&self) -> &Treasury {
        &self.treasury
    }

    pub fn oracle(&self) -> &OracleGate {
        &self.oracle
    }

    pub fn node(&self, id: NodeId) -> Result<&Node, HyphaError> {
        self.registry.get(id)
    }

    pub fn node_by_operator(&self, operator: &Address) -> Result<&Node, HyphaError> {
        self.registry.get_by_operator(operator)
    }

    pub fn report(&self, id: ReportId) -> Result<&SlashReport, HyphaError> {
        self.arbiter.get(id)
    }

    /// Open reports that `check_expired_report` would close at `now`.
    pub fn expired_reports(&self, now: Timestamp) -> Vec<ReportId> {
        self.arbiter.expired_open_reports(&self.config, now)
    }

    /// Whether `distribute_rewards` would pass its timing check at `now`.
    pub fn epoch_due(&self, now: Timestamp) -> bool {
        now >= self.distributor.next_distribution_at(&self.config)
    }

    pub fn epoch_status(&self) -> EpochStatus {
        EpochStatus {
            epoch: self.distributor.epoch(),
            last_distribution_at: self.distributor.last_distribution_at(),
            next_distribution_at: self.distributor.next_distribution_at(&self.config),
            rewards_pool: self.treasury.rewards_pool(),
            forfeited: self.treasury.forfeited(),
            total_distributed: self.treasury.total_distributed(),
        }
    }
}

fn resolution_event(report: &SlashReport, resolution: &Resolution) -> EngineEvent {
    if report.status == ReportStatus::Executed {
        EngineEvent::SlashExecuted {
            report: report.id,
            node: report.accused,
            amount: resolution.slashed,
            reporter_reward: resolution.reporter_reward,
            node_slashed: resolution.node_slashed,
        }
    } else {
        EngineEvent::ReportRejected {
            report: report.id,
            expired: resolution.expired,
            reporter_penalty: resolution.reporter_penalty,
        }
    }
}

/// Log a rejected operation at debug level and pass the result through.
fn rejected<T>(operation: &'static str, result: Result<T, HyphaError>) -> Result<T, HyphaError> {
    if let Err(e) = &result {
        tracing::debug!(operation, kind = e.kind(), error = %e, "Operation rejected");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RewardWeights;
    use crate::oracle::MetricsReport;
    use hypha_core::crypto::Keypair;

    const DAY: u64 = 86_400;

    fn addr(n: u8) -> Address {
        Address::parse(&format!("0x{}", format!("{:02x}", n).repeat(20))).unwrap()
    }

    fn engine() -> (Engine, Keypair) {
        let oracle = Keypair::generate();
        let engine = Engine::new(
            EconomicsConfig::default(),
            addr(0xad),
            OracleGate::new(oracle.public_key_bytes()),
            [addr(10), addr(11), addr(12)],
            0,
        )
        .unwrap();
        (engine, oracle)
    }

    fn push(engine: &mut Engine, oracle: &Keypair, node: NodeId, quality: u64, sequence: u64, now: Timestamp) -> Result<(), HyphaError> {
        let signed = MetricsReport {
            node,
            quality_score: quality,
            bytes_served_delta: 1_000,
            successful_requests_delta: 10,
            failed_requests_delta: 0,
            sequence,
            observed_at: now,
        }
        .sign(oracle)
        .unwrap();
        engine.ingest_metrics(&signed, now)
    }

    #[test]
    fn test_register_emits_event() {
        let (mut engine, _) = engine();
        let id = engine.register_node(&addr(1), "peer-1", "eu-west", 1_000, 5).unwrap();
        assert_eq!(
            engine.take_events(),
            vec![EngineEvent::NodeRegistered {
                node: id,
                operator: addr(1),
                region: "eu-west".to_string(),
                stake: 1_000,
            }]
        );
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn test_rejected_call_emits_nothing() {
        let (mut engine, _) = engine();
        assert!(engine.register_node(&addr(1), "peer", "eu", 999, 0).is_err());
        assert!(engine.take_events().is_empty());
        assert_eq!(engine.registry().total_staked(), 0);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = EconomicsConfig {
            vote_quorum: 0,
            ..EconomicsConfig::default()
        };
        let gate = OracleGate::new(Keypair::generate().public_key_bytes());
        assert!(Engine::new(config, addr(0xad), gate, Vec::new(), 0).is_err());
    }

    #[test]
    fn test_ingest_metrics_advances_sequence_only_on_success() {
        let (mut engine, oracle) = engine();
        let id = engine.register_node(&addr(1), "peer", "eu", 1_000, 0).unwrap();

        // Quality out of range: registry rejects, sequence stays free.
        assert!(push(&mut engine, &oracle, id, 20_000, 1, 10).is_err());
        assert_eq!(engine.oracle().last_sequence(), None);

        push(&mut engine, &oracle, id, 9_000, 1, 10).unwrap();
        assert_eq!(engine.oracle().last_sequence(), Some(1));
        assert!(push(&mut engine, &oracle, id, 9_000, 1, 11).is_err());
        assert_eq!(engine.node(id).unwrap().bytes_served, 1_000);
    }

    #[test]
    fn test_metrics_signed_by_other_key_rejected() {
        let (mut engine, _) = engine();
        let id = engine.register_node(&addr(1), "peer", "eu", 1_000, 0).unwrap();
        let impostor = Keypair::generate();
        let err = push(&mut engine, &impostor, id, 9_000, 1, 10).unwrap_err();
        assert!(matches!(err, HyphaError::Unauthorized(_)));
        assert_eq!(engine.node(id).unwrap().quality_score, 0);
    }

    #[test]
    fn test_claim_rewards_after_distribution() {
        let (mut engine, oracle) = engine();
        let id = engine.register_node(&addr(1), "peer", "eu", 1_000, 0).unwrap();
        push(&mut engine, &oracle, id, 9_000, 1, 100).unwrap();
        engine.fund_rewards_pool(50_000).unwrap();

        assert!(engine.claim_rewards(&addr(1)).is_err());
        let summary = engine.distribute_rewards(DAY).unwrap();
        assert_eq!(summary.total_distributed, 10_000);
        assert_eq!(engine.claim_rewards(&addr(1)).unwrap(), 10_000);
        assert_eq!(engine.epoch_status().rewards_pool, 40_000);
        engine.check_invariants().unwrap();
    }

    #[test]
    fn test_admin_only() {
        let (mut engine, _) = engine();
        let action = AdminAction::SetVoteQuorum { quorum: 5 };
        assert!(matches!(
            engine.apply_admin(&addr(1), &action),
            Err(HyphaError::Unauthorized(_))
        ));
        engine.apply_admin(&addr(0xad), &action).unwrap();
        assert_eq!(engine.config().vote_quorum, 5);
        assert_eq!(
            engine.take_events(),
            vec![EngineEvent::ConfigUpdated {
                setting: "vote_quorum".to_string()
            }]
        );
    }

    #[test]
    fn test_admin_reviewer_and_weights() {
        let (mut engine, _) = engine();
        engine
            .apply_admin(&addr(0xad), &AdminAction::AddReviewer { reviewer: addr(20) })
            .unwrap();
        assert!(engine.arbiter().reviewers().contains(&addr(20)));

        let bad = AdminAction::SetRewardWeights {
            weights: RewardWeights {
                quality: 90,
                bytes: 30,
                uptime: 20,
            },
        };
        assert!(engine.apply_admin(&addr(0xad), &bad).is_err());
        assert_eq!(engine.config().reward_weights, RewardWeights::default());
    }

    #[test]
    fn test_quorum_reachable_tracks_reviewer_set() {
        let (mut engine, _) = engine();
        assert!(engine.quorum_reachable());

        // Accepted, but only expiry can close reports until a reviewer joins.
        engine
            .apply_admin(&addr(0xad), &AdminAction::SetVoteQuorum { quorum: 4 })
            .unwrap();
        assert!(!engine.quorum_reachable());

        engine
            .apply_admin(&addr(0xad), &AdminAction::AddReviewer { reviewer: addr(20) })
            .unwrap();
        assert!(engine.quorum_reachable());
    }

    #[test]
    fn test_complete_exit_blocked_by_open_report() {
        let (mut engine, _) = engine();
        let node = engine.register_node(&addr(1), "peer", "eu", 2_000, 0).unwrap();
        let unlocks_at = engine.initiate_exit(&addr(1), 0).unwrap();
        engine
            .submit_report(&addr(2), node, Offense::Unavailability, "cid", 100, DAY)
            .unwrap();
        engine.take_events();

        let err = engine.complete_exit(&addr(1), unlocks_at).unwrap_err();
        assert!(matches!(err, HyphaError::InvalidState(_)));
        assert_eq!(engine.node(node).unwrap().stake, 2_000);
        assert!(engine.take_events().is_empty());
    }

    #[test]
    fn test_vote_emits_review_and_slash_events() {
        let (mut engine, _) = engine();
        let node = engine.register_node(&addr(1), "peer", "eu", 1_000, 0).unwrap();
        let report = engine
            .submit_report(&addr(2), node, Offense::Unavailability, "cid", 100, 0)
            .unwrap();
        for reviewer in [10, 11, 12] {
            engine.vote_on_report(&addr(reviewer), report, true, 1).unwrap();
        }
        let events = engine.take_events();
        assert_eq!(events.last().map(EngineEvent::name), Some("slash_executed"));
        assert_eq!(
            events.iter().filter(|e| e.name() == "report_reviewed").count(),
            3
        );
        assert_eq!(engine.node(node).unwrap().stake, 900);
        assert_eq!(engine.node(node).unwrap().status, crate::registry::NodeStatus::Slashed);
        engine.check_invariants().unwrap();
    }

    #[test]
    fn test_epoch_status_tracks_schedule() {
        let (mut engine, oracle) = engine();
        let id = engine.register_node(&addr(1), "peer", "eu", 1_000, 0).unwrap();
        push(&mut engine, &oracle, id, 9_000, 1, 10).unwrap();

        assert!(!engine.epoch_due(DAY - 1));
        assert!(engine.epoch_due(DAY));
        engine.distribute_rewards(DAY + 5).unwrap();

        let status = engine.epoch_status();
        assert_eq!(status.epoch, 1);
        assert_eq!(status.next_distribution_at, 2 * DAY + 5);
    }
}
