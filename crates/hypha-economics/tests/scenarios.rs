// crates/hypha-economics/tests/scenarios.rs
//
// End-to-end scenarios for the incentive engine.
//
// Each test drives the public `Engine` API the way the RPC layer does:
// signed oracle pushes, operator calls identified by address, and
// permissionless triggers with explicit timestamps.

use hypha_core::crypto::Keypair;
use hypha_core::{Address, EngineEvent, HyphaError, NodeId, Timestamp};
use hypha_economics::{
    AdminAction, EconomicsConfig, Engine, MetricsReport, NodeStatus, Offense, OracleGate,
    ReportStatus, RewardWeights,
};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

const DAY: u64 = 86_400;
const ADMIN: u8 = 0xad;
const REVIEWERS: [u8; 3] = [0x10, 0x11, 0x12];

fn addr(n: u8) -> Address {
    Address::parse(&format!("0x{}", format!("{:02x}", n).repeat(20))).unwrap()
}

struct Harness {
    engine: Engine,
    oracle: Keypair,
    sequence: u64,
}

impl Harness {
    fn new(config: EconomicsConfig) -> Self {
        let oracle = Keypair::generate();
        let engine = Engine::new(
            config,
            addr(ADMIN),
            OracleGate::new(oracle.public_key_bytes()),
            REVIEWERS.iter().map(|&n| addr(n)),
            0,
        )
        .unwrap();
        Self {
            engine,
            oracle,
            sequence: 0,
        }
    }

    fn register(&mut self, operator: u8, stake: u64) -> NodeId {
        self.engine
            .register_node(&addr(operator), "12D3KooWpeer", "eu-west", stake, 0)
            .unwrap()
    }

    fn metrics(&mut self, node: NodeId, quality: u64, bytes: u64, ok: u64, failed: u64, now: Timestamp) {
        self.sequence += 1;
        let signed = MetricsReport {
            node,
            quality_score: quality,
            bytes_served_delta: bytes,
            successful_requests_delta: ok,
            failed_requests_delta: failed,
            sequence: self.sequence,
            observed_at: now,
        }
        .sign(&self.oracle)
        .unwrap();
        self.engine.ingest_metrics(&signed, now).unwrap();
    }
}

fn quality_only_config(rewards_per_epoch: u64) -> EconomicsConfig {
    EconomicsConfig {
        rewards_per_epoch,
        min_quality_score: 0,
        reward_weights: RewardWeights::new(100, 0, 0).unwrap(),
        ..EconomicsConfig::default()
    }
}

// ---------------------------------------------------------------------------
// Scenarios
// ---------------------------------------------------------------------------

#[test]
fn scenario_register_at_minimum_then_duplicate_fails() {
    let mut h = Harness::new(EconomicsConfig::default());
    let id = h.register(1, 1_000);
    let node = h.engine.node(id).unwrap();
    assert_eq!(node.status, NodeStatus::Active);
    assert_eq!(h.engine.registry().total_staked(), 1_000);
    assert_eq!(h.engine.registry().active_node_count(), 1);

    let again = h
        .engine
        .register_node(&addr(1), "other-peer", "us-east", 5_000, 10);
    assert!(matches!(again, Err(HyphaError::InvalidState(_))));
    assert_eq!(h.engine.registry().total_staked(), 1_000);
    h.engine.check_invariants().unwrap();
}

#[test]
fn scenario_proportional_split_empties_pool() {
    let mut h = Harness::new(quality_only_config(100));
    let a = h.register(1, 1_000);
    let b = h.register(2, 1_000);
    h.metrics(a, 7_000, 0, 0, 0, 10);
    h.metrics(b, 3_000, 0, 0, 0, 10);
    h.engine.fund_rewards_pool(100).unwrap();

    let summary = h.engine.distribute_rewards(DAY).unwrap();
    assert_eq!(summary.payouts, vec![(a, 70), (b, 30)]);
    assert_eq!(h.engine.node(a).unwrap().pending_rewards, 70);
    assert_eq!(h.engine.node(b).unwrap().pending_rewards, 30);
    assert_eq!(h.engine.epoch_status().rewards_pool, 0);
    h.engine.check_invariants().unwrap();
}

#[test]
fn scenario_underfunded_pool_preserves_ratio() {
    let mut h = Harness::new(quality_only_config(100));
    let a = h.register(1, 1_000);
    let b = h.register(2, 1_000);
    h.metrics(a, 6_000, 0, 0, 0, 10);
    h.metrics(b, 6_000, 0, 0, 0, 10);
    h.engine.fund_rewards_pool(50).unwrap();

    let summary = h.engine.distribute_rewards(DAY).unwrap();
    assert_eq!(summary.total_distributed, 50);
    assert_eq!(h.engine.node(a).unwrap().pending_rewards, 25);
    assert_eq!(h.engine.node(b).unwrap().pending_rewards, 25);
    assert_eq!(h.engine.epoch_status().rewards_pool, 0);
}

#[test]
fn scenario_sybil_report_confirmed_by_quorum() {
    let mut h = Harness::new(EconomicsConfig::default());
    let node = h.register(1, 1_000);
    let reporter = addr(2);

    let report = h
        .engine
        .submit_report(&reporter, node, Offense::Sybil, "bafy-dup-identity", 200, 100)
        .unwrap();
    assert_eq!(h.engine.report(report).unwrap().slash_amount, 1_000);

    let mut status = ReportStatus::Pending;
    for reviewer in REVIEWERS {
        status = h
            .engine
            .vote_on_report(&addr(reviewer), report, true, 200)
            .unwrap();
    }
    assert_eq!(status, ReportStatus::Executed);

    let accused = h.engine.node(node).unwrap();
    assert_eq!(accused.stake, 0);
    assert_eq!(accused.status, NodeStatus::Slashed);
    assert_eq!(accused.slash_count, 1);
    assert_eq!(h.engine.registry().active_node_count(), 0);

    let resolution = h.engine.report(report).unwrap().resolution.unwrap();
    assert_eq!(resolution.reporter_reward, 100);
    assert_eq!(h.engine.arbiter().payout_of(&reporter), 200 + 100);
    assert_eq!(h.engine.epoch_status().forfeited, 900);
    assert_eq!(h.engine.claim_reporter_payout(&reporter).unwrap(), 300);
    h.engine.check_invariants().unwrap();
}

#[test]
fn scenario_report_expires_after_single_confirm() {
    let mut h = Harness::new(EconomicsConfig::default());
    let node = h.register(1, 1_000);
    let reporter = addr(2);
    let report = h
        .engine
        .submit_report(&reporter, node, Offense::SlowResponse, "bafy-latency", 400, 0)
        .unwrap();
    h.engine
        .vote_on_report(&addr(REVIEWERS[0]), report, true, 60)
        .unwrap();

    assert_eq!(h.engine.expired_reports(3 * DAY - 1), Vec::new());
    assert_eq!(h.engine.expired_reports(3 * DAY), vec![report]);

    let resolution = h.engine.check_expired_report(report, 3 * DAY).unwrap();
    assert!(resolution.expired);
    assert_eq!(resolution.reporter_refund, 200);
    assert_eq!(h.engine.report(report).unwrap().status, ReportStatus::Rejected);
    assert_eq!(h.engine.arbiter().payout_of(&reporter), 200);
    assert_eq!(h.engine.node(node).unwrap().stake, 1_000);
    h.engine.check_invariants().unwrap();
}

#[test]
fn scenario_exit_respects_unbonding_period() {
    let mut h = Harness::new(quality_only_config(600));
    let node = h.register(1, 1_500);
    h.metrics(node, 9_000, 0, 0, 0, 10);
    h.engine.fund_rewards_pool(600).unwrap();
    h.engine.distribute_rewards(DAY).unwrap();

    let unlocks_at = h.engine.initiate_exit(&addr(1), DAY + 1).unwrap();
    assert_eq!(unlocks_at, DAY + 1 + 7 * DAY);
    assert_eq!(h.engine.registry().active_node_count(), 0);

    let early = h.engine.complete_exit(&addr(1), unlocks_at - 1);
    assert!(matches!(early, Err(HyphaError::Timing(_))));

    let (stake, rewards) = h.engine.complete_exit(&addr(1), unlocks_at).unwrap();
    assert_eq!((stake, rewards), (1_500, 600));
    let exited = h.engine.node(node).unwrap();
    assert_eq!(exited.status, NodeStatus::Inactive);
    assert_eq!((exited.stake, exited.pending_rewards), (0, 0));
    assert_eq!(h.engine.registry().total_staked(), 0);
    h.engine.check_invariants().unwrap();
}

// ---------------------------------------------------------------------------
// Properties
// ---------------------------------------------------------------------------

#[test]
fn expiry_check_is_not_repeatable() {
    let mut h = Harness::new(EconomicsConfig::default());
    let node = h.register(1, 1_000);
    let report = h
        .engine
        .submit_report(&addr(2), node, Offense::Adversarial, "cid", 100, 0)
        .unwrap();
    h.engine.check_expired_report(report, 3 * DAY).unwrap();
    let forfeited = h.engine.epoch_status().forfeited;
    h.engine.take_events();

    let again = h.engine.check_expired_report(report, 4 * DAY);
    assert!(matches!(again, Err(HyphaError::InvalidState(_))));
    assert_eq!(h.engine.epoch_status().forfeited, forfeited);
    assert!(h.engine.take_events().is_empty());
}

#[test]
fn partially_slashed_node_recovers_residual_stake() {
    let mut h = Harness::new(EconomicsConfig {
        vote_quorum: 1,
        ..EconomicsConfig::default()
    });
    let node = h.register(1, 1_200);
    let report = h
        .engine
        .submit_report(&addr(2), node, Offense::FalsifiedMetrics, "cid", 100, 0)
        .unwrap();
    h.engine
        .vote_on_report(&addr(REVIEWERS[0]), report, true, 50)
        .unwrap();

    let slashed = h.engine.node(node).unwrap();
    assert_eq!(slashed.stake, 840);
    assert_eq!(slashed.status, NodeStatus::Slashed);

    // Slashed nodes earn nothing and cannot claim.
    assert!(h.engine.claim_rewards(&addr(1)).is_err());
    assert!(h.engine.complete_exit(&addr(1), 50 + 7 * DAY - 1).is_err());
    let (stake, _) = h.engine.complete_exit(&addr(1), 50 + 7 * DAY).unwrap();
    assert_eq!(stake, 840);
    assert_eq!(h.engine.node(node).unwrap().status, NodeStatus::Inactive);
    h.engine.check_invariants().unwrap();
}

#[test]
fn slash_count_and_bytes_never_decrease() {
    let mut h = Harness::new(EconomicsConfig {
        vote_quorum: 1,
        ..EconomicsConfig::default()
    });
    let node = h.register(1, 10_000);
    let mut last_bytes = 0;
    let mut last_slashes = 0;

    for round in 1..=4u64 {
        h.metrics(node, 8_000, 250 * round, 5, 1, round * 10);
        let report = h
            .engine
            .submit_report(&addr(2), node, Offense::SlowResponse, "cid", 100, round * 10)
            .unwrap();
        h.engine
            .vote_on_report(&addr(REVIEWERS[0]), report, true, round * 10 + 1)
            .unwrap();

        let current = h.engine.node(node).unwrap();
        assert!(current.bytes_served >= last_bytes);
        assert!(current.slash_count > last_slashes);
        last_bytes = current.bytes_served;
        last_slashes = current.slash_count;
        h.engine.check_invariants().unwrap();
    }
    assert_eq!(last_bytes, 250 + 500 + 750 + 1_000);
}

#[test]
fn weight_update_must_sum_to_100() {
    let mut h = Harness::new(EconomicsConfig::default());
    let bad = AdminAction::SetRewardWeights {
        weights: RewardWeights {
            quality: 33,
            bytes: 33,
            uptime: 33,
        },
    };
    assert!(matches!(
        h.engine.apply_admin(&addr(ADMIN), &bad),
        Err(HyphaError::Validation(_))
    ));
    let weights = h.engine.config().reward_weights;
    assert_eq!(weights.quality + weights.bytes + weights.uptime, 100);
}

#[test]
fn bytes_share_uses_epoch_delta() {
    let config = EconomicsConfig {
        rewards_per_epoch: 1_000,
        min_quality_score: 0,
        reward_weights: RewardWeights::new(0, 100, 0).unwrap(),
        ..EconomicsConfig::default()
    };
    let mut h = Harness::new(config);
    let a = h.register(1, 1_000);
    let b = h.register(2, 1_000);
    h.engine.fund_rewards_pool(10_000).unwrap();

    h.metrics(a, 5_000, 900, 0, 0, 10);
    h.metrics(b, 5_000, 100, 0, 0, 10);
    h.engine.distribute_rewards(DAY).unwrap();
    assert_eq!(h.engine.node(a).unwrap().pending_rewards, 900);

    // Second epoch: only b served anything.
    h.metrics(b, 5_000, 500, 0, 0, DAY + 10);
    let summary = h.engine.distribute_rewards(2 * DAY).unwrap();
    assert_eq!(summary.payouts, vec![(a, 0), (b, 1_000)]);
}

#[test]
fn events_follow_state_changes_in_order() {
    let mut h = Harness::new(quality_only_config(100));
    let node = h.register(1, 1_000);
    h.metrics(node, 9_000, 10, 1, 0, 10);
    h.engine.fund_rewards_pool(100).unwrap();
    h.engine.distribute_rewards(DAY).unwrap();
    h.engine.claim_rewards(&addr(1)).unwrap();

    let names: Vec<&str> = h.engine.take_events().iter().map(EngineEvent::name).collect();
    assert_eq!(
        names,
        vec![
            "node_registered",
            "node_metrics_updated",
            "rewards_pool_funded",
            "epoch_completed",
            "rewards_claimed",
        ]
    );
}

// ---------------------------------------------------------------------------
// Accused node changes state during review
// ---------------------------------------------------------------------------

#[test]
fn exiting_node_cannot_leave_while_reported() {
    let mut h = Harness::new(EconomicsConfig::default());
    let node = h.register(1, 10_000);
    let unlocks_at = h.engine.initiate_exit(&addr(1), 0).unwrap();
    assert_eq!(unlocks_at, 7 * DAY);

    let reporter = addr(2);
    let report = h
        .engine
        .submit_report(&reporter, node, Offense::Sybil, "bafy-dup-identity", 200, 6 * DAY)
        .unwrap();

    let blocked = h.engine.complete_exit(&addr(1), unlocks_at);
    assert!(matches!(blocked, Err(HyphaError::InvalidState(_))));
    let waiting = h.engine.node(node).unwrap();
    assert_eq!(waiting.status, NodeStatus::Exiting);
    assert_eq!(waiting.stake, 10_000);

    for reviewer in REVIEWERS {
        h.engine
            .vote_on_report(&addr(reviewer), report, true, unlocks_at + 1)
            .unwrap();
    }
    let resolution = h.engine.report(report).unwrap().resolution.unwrap();
    assert_eq!(resolution.slashed, 10_000);
    assert_eq!(resolution.reporter_reward, 1_000);

    let slashed = h.engine.node(node).unwrap();
    assert_eq!(slashed.stake, 0);
    assert_eq!(slashed.status, NodeStatus::Slashed);
    assert_eq!(h.engine.epoch_status().forfeited, 9_000);
    assert_eq!(h.engine.arbiter().payout_of(&reporter), 200 + 1_000);
    h.engine.check_invariants().unwrap();
}

#[test]
fn exit_resumes_once_report_expires() {
    let mut h = Harness::new(EconomicsConfig::default());
    let node = h.register(1, 2_000);
    let unlocks_at = h.engine.initiate_exit(&addr(1), 0).unwrap();
    let report = h
        .engine
        .submit_report(&addr(2), node, Offense::SlowResponse, "bafy-latency", 200, 6 * DAY)
        .unwrap();

    assert!(h.engine.complete_exit(&addr(1), unlocks_at).is_err());
    h.engine.check_expired_report(report, 9 * DAY).unwrap();

    let (stake, rewards) = h.engine.complete_exit(&addr(1), 9 * DAY).unwrap();
    assert_eq!((stake, rewards), (2_000, 0));
    assert_eq!(h.engine.node(node).unwrap().status, NodeStatus::Inactive);
    h.engine.check_invariants().unwrap();
}

#[test]
fn second_slash_on_slashed_node_keeps_unbonding_clock() {
    let mut h = Harness::new(EconomicsConfig {
        vote_quorum: 1,
        ..EconomicsConfig::default()
    });
    let node = h.register(1, 1_200);
    let first = h
        .engine
        .submit_report(&addr(2), node, Offense::FalsifiedMetrics, "cid-a", 100, 0)
        .unwrap();
    h.engine
        .vote_on_report(&addr(REVIEWERS[0]), first, true, 50)
        .unwrap();
    assert_eq!(h.engine.node(node).unwrap().status, NodeStatus::Slashed);

    let second = h
        .engine
        .submit_report(&addr(3), node, Offense::SlowResponse, "cid-b", 100, 60)
        .unwrap();
    assert_eq!(h.engine.report(second).unwrap().slash_amount, 42);
    h.engine
        .vote_on_report(&addr(REVIEWERS[1]), second, true, 70)
        .unwrap();

    let twice = h.engine.node(node).unwrap();
    assert_eq!(twice.stake, 798);
    assert_eq!(twice.slash_count, 2);
    assert_eq!(twice.status, NodeStatus::Slashed);
    assert_eq!(twice.slashed_at, Some(50));

    let (stake, _) = h.engine.complete_exit(&addr(1), 50 + 7 * DAY).unwrap();
    assert_eq!(stake, 798);
    h.engine.check_invariants().unwrap();
}
