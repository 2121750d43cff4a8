// crates/hypha-economics/src/slashing.rs
//
// Slashing Arbiter: misbehavior reports, reviewer votes, and stake forfeiture.
//
// Six offense categories carry a slash rate in bps of the accused node's
// current stake (defaults below). A reporter posts stake with each report;
// designated reviewers vote until one side reaches quorum, or the review
// period lapses and the report is rejected.
//
//   | Offense             | Default rate |
//   |---------------------|--------------|
//   | ContentCorruption   | 50%          |
//   | FalsifiedMetrics    | 30%          |
//   | Unavailability      | 10%          |
//   | SlowResponse        | 5%           |
//   | Sybil               | 100%         |
//   | Adversarial         | 50%          |
//
// Report lifecycle (each report leaves the open states exactly once):
//   Pending -> UnderReview -> Confirmed -> Executed
//   Pending | UnderReview -> Rejected
//
// On execution the registry forfeits the stake; the reporter gets its stake
// back plus `reporter_reward_bps` of the forfeited amount, and the rest goes
// to the treasury. On rejection `reporter_penalty_bps` of the reporter's
// stake is forfeited to the treasury and the remainder refunded.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use hypha_core::{apply_bps, Address, Amount, HyphaError, NodeId, ReportId, Timestamp, BPS_DENOMINATOR};

use crate::config::EconomicsConfig;
use crate::registry::{NodeRegistry, NodeStatus};
use crate::treasury::Treasury;

/// Longest accepted evidence reference, in bytes.
pub const MAX_EVIDENCE_LEN: usize = 512;

/// Misbehavior categories a node can be reported for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Offense {
    /// Served content that does not match its hash.
    ContentCorruption,
    /// Fed the oracle fabricated telemetry.
    FalsifiedMetrics,
    /// Unreachable for an extended period.
    Unavailability,
    /// Persistently slow responses.
    SlowResponse,
    /// One operator behind multiple node identities.
    Sybil,
    /// Any other adversarial behavior.
    Adversarial,
}

impl fmt::Display for Offense {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Offense::ContentCorruption => "content_corruption",
            Offense::FalsifiedMetrics => "falsified_metrics",
            Offense::Unavailability => "unavailability",
            Offense::SlowResponse => "slow_response",
            Offense::Sybil => "sybil",
            Offense::Adversarial => "adversarial",
        };
        f.write_str(name)
    }
}

/// Slash rate per offense, in bps of the accused's current stake.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SlashSchedule {
    pub content_corruption: u64,
    pub falsified_metrics: u64,
    pub unavailability: u64,
    pub slow_response: u64,
    pub sybil: u64,
    pub adversarial: u64,
}

impl Default for SlashSchedule {
    fn default() -> Self {
        Self {
            content_corruption: 5_000,
            falsified_metrics: 3_000,
            unavailability: 1_000,
            slow_response: 500,
            sybil: 10_000,
            adversarial: 5_000,
        }
    }
}

impl SlashSchedule {
    /// Rate for an offense, clamped to 100%.
    pub fn bps_for(&self, offense: Offense) -> u64 {
        let raw = match offense {
            Offense::ContentCorruption => self.content_corruption,
            Offense::FalsifiedMetrics => self.falsified_metrics,
            Offense::Unavailability => self.unavailability,
            Offense::SlowResponse => self.slow_response,
            Offense::Sybil => self.sybil,
            Offense::Adversarial => self.adversarial,
        };
        raw.min(BPS_DENOMINATOR)
    }

    /// Set the rate for an offense, clamping to 0..=10_000 bps.
    pub fn set(&mut self, offense: Offense, bps: u64) {
        if bps > BPS_DENOMINATOR {
            tracing::warn!(%offense, bps, "Slash rate clamped to 100%");
        }
        let bps = bps.min(BPS_DENOMINATOR);
        match offense {
            Offense::ContentCorruption => self.content_corruption = bps,
            Offense::FalsifiedMetrics => self.falsified_metrics = bps,
            Offense::Unavailability => self.unavailability = bps,
            Offense::SlowResponse => self.slow_response = bps,
            Offense::Sybil => self.sybil = bps,
            Offense::Adversarial => self.adversarial = bps,
        }
    }

    /// Slash amount for an offense against the given stake.
    pub fn penalty(&self, offense: Offense, current_stake: Amount) -> Amount {
        apply_bps(current_stake, self.bps_for(offense))
    }
}

/// Status of a slash report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReportStatus {
    /// Filed, no votes yet.
    Pending,
    /// At least one vote cast, no quorum yet.
    UnderReview,
    /// Confirm quorum reached; slash about to execute.
    Confirmed,
    /// Slash executed.
    Executed,
    /// Rejected by vote or by expiry.
    Rejected,
}

impl ReportStatus {
    /// Whether the report still accepts votes and expiry checks.
    pub fn is_open(self) -> bool {
        matches!(self, ReportStatus::Pending | ReportStatus::UnderReview)
    }

    /// The single source of truth for legal report transitions.
    pub fn can_transition_to(self, next: ReportStatus) -> bool {
        matches!(
            (self, next),
            (ReportStatus::Pending, ReportStatus::UnderReview)
                | (ReportStatus::Pending, ReportStatus::Rejected)
                | (ReportStatus::UnderReview, ReportStatus::Confirmed)
                | (ReportStatus::UnderReview, ReportStatus::Rejected)
                | (ReportStatus::Confirmed, ReportStatus::Executed)
        )
    }

    fn transition(self, next: ReportStatus) -> Result<ReportStatus, HyphaError> {
        if self.can_transition_to(next) {
            Ok(next)
        } else {
            Err(HyphaError::InvalidState(format!(
                "Invalid report transition: {} -> {}",
                self, next
            )))
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReportStatus::Pending => write!(f, "Pending"),
            ReportStatus::UnderReview => write!(f, "UnderReview"),
            ReportStatus::Confirmed => write!(f, "Confirmed"),
            ReportStatus::Executed => write!(f, "Executed"),
            ReportStatus::Rejected => write!(f, "Rejected"),
        }
    }
}

/// A single reviewer vote.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub reviewer: Address,
    pub confirm: bool,
    pub cast_at: Timestamp,
}

/// How a closed report settled.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Resolution {
    /// Stake actually forfeited by the accused node.
    pub slashed: Amount,
    /// Whether the slash moved the node to `Slashed`.
    pub node_slashed: bool,
    /// Reporter stake returned.
    pub reporter_refund: Amount,
    /// Bonus paid to the reporter out of the forfeited stake.
    pub reporter_reward: Amount,
    /// Reporter stake forfeited to the treasury.
    pub reporter_penalty: Amount,
    /// Closed by expiry rather than by vote.
    pub expired: bool,
    pub resolved_at: Timestamp,
}

/// A misbehavior accusation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlashReport {
    pub id: ReportId,
    pub reporter: Address,
    pub accused: NodeId,
    pub offense: Offense,
    /// Opaque pointer to the evidence (e.g. a content hash). Not validated.
    pub evidence: String,
    pub created_at: Timestamp,
    /// Candidate slash, fixed at submission from the accused's stake.
    pub slash_amount: Amount,
    /// Stake posted by the reporter, held until resolution.
    pub reporter_stake: Amount,
    pub confirms: u32,
    pub rejects: u32,
    pub votes: Vec<Vote>,
    pub status: ReportStatus,
    pub resolution: Option<Resolution>,
}

impl SlashReport {
    /// Time after which the report can only be expired.
    pub fn deadline(&self, review_period_secs: u64) -> Timestamp {
        self.created_at.saturating_add(review_period_secs)
    }

    /// Whether `who` has already voted.
    pub fn has_voted(&self, who: &Address) -> bool {
        self.votes.iter().any(|v| &v.reviewer == who)
    }
}

/// Owns every slash report, the reviewer set, and reporter balances.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SlashingArbiter {
    reports: Vec<SlashReport>,
    reviewers: BTreeSet<Address>,
    payouts: BTreeMap<Address, Amount>,
    escrowed: Amount,
}

impl SlashingArbiter {
    /// Create an arbiter with the given reviewer set.
    pub fn new(reviewers: impl IntoIterator<Item = Address>) -> Self {
        Self {
            reviewers: reviewers.into_iter().collect(),
            ..Self::default()
        }
    }

    /// File a report against a node, escrowing the reporter's stake.
    ///
    /// # Errors
    /// - `Validation` for empty/oversized evidence, insufficient stake, or a self-report.
    /// - `NotFound` if the accused node is not registered.
    /// - `InvalidState` if the accused holds no stake at risk.
    #[allow(clippy::too_many_arguments)]
    pub fn submit_report(
        &mut self,
        reporter: Address,
        accused: NodeId,
        offense: Offense,
        evidence: &str,
        stake: Amount,
        registry: &NodeRegistry,
        config: &EconomicsConfig,
        now: Timestamp,
    ) -> Result<ReportId, HyphaError> {
        let evidence = evidence.trim();
        if evidence.is_empty() {
            return Err(HyphaError::Validation(
                "Report must include an evidence reference".to_string(),
            ));
        }
        if evidence.len() > MAX_EVIDENCE_LEN {
            return Err(HyphaError::Validation(format!(
                "Evidence reference exceeds {} bytes",
                MAX_EVIDENCE_LEN
            )));
        }
        if stake < config.min_reporter_stake {
            return Err(HyphaError::Validation(format!(
                "Reporter stake {} is below the minimum of {}",
                stake, config.min_reporter_stake
            )));
        }

        let node = registry.get(accused)?;
        if node.operator == reporter {
            return Err(HyphaError::Validation(format!(
                "{} cannot report its own node",
                reporter
            )));
        }
        if node.status == NodeStatus::Inactive || node.stake == 0 {
            return Err(HyphaError::InvalidState(format!(
                "{} has no stake at risk (status {})",
                accused, node.status
            )));
        }

        let escrowed = self.escrowed.checked_add(stake).ok_or_else(|| {
            HyphaError::Validation("Reporter stake overflows escrow".to_string())
        })?;
        let slash_amount = config.slash_schedule.penalty(offense, node.stake);

        let id = ReportId(self.reports.len() as u64);
        self.reports.push(SlashReport {
            id,
            reporter,
            accused,
            offense,
            evidence: evidence.to_string(),
            created_at: now,
            slash_amount,
            reporter_stake: stake,
            confirms: 0,
            rejects: 0,
            votes: Vec::new(),
            status: ReportStatus::Pending,
            resolution: None,
        });
        self.escrowed = escrowed;

        tracing::info!(report = %id, node = %accused, %offense, slash_amount, "Slash report submitted");
        Ok(id)
    }

    /// Record a reviewer vote and resolve the report if a quorum is reached.
    ///
    /// Returns the report status after the vote.
    #[allow(clippy::too_many_arguments)]
    pub fn vote(
        &mut self,
        reviewer: &Address,
        id: ReportId,
        confirm: bool,
        registry: &mut NodeRegistry,
        treasury: &mut Treasury,
        config: &EconomicsConfig,
        now: Timestamp,
    ) -> Result<ReportStatus, HyphaError> {
        if !self.reviewers.contains(reviewer) {
            return Err(HyphaError::Unauthorized(format!(
                "{} is not a designated reviewer",
                reviewer
            )));
        }

        let report = self.get(id)?;
        if !report.is_open() {
            return Err(HyphaError::InvalidState(format!(
                "{} is already resolved ({})",
                id, report.status
            )));
        }
        if now >= report.deadline(config.review_period_secs) {
            return Err(HyphaError::Timing(format!(
                "Review period of {} ended at {}",
                id,
                report.deadline(config.review_period_secs)
            )));
        }
        if &report.reporter == reviewer {
            return Err(HyphaError::Unauthorized(format!(
                "{} cannot review its own report",
                reviewer
            )));
        }
        if &registry.get(report.accused)?.operator == reviewer {
            return Err(HyphaError::Unauthorized(format!(
                "{} cannot review a report against its own node",
                reviewer
            )));
        }
        if report.has_voted(reviewer) {
            return Err(HyphaError::InvalidState(format!(
                "{} has already voted on {}",
                reviewer, id
            )));
        }

        let mut status = if report.status == ReportStatus::Pending {
            report.status.transition(ReportStatus::UnderReview)?
        } else {
            report.status
        };
        let confirms = report.confirms + u32::from(confirm);
        let rejects = report.rejects + u32::from(!confirm);
        let quorum = config.vote_quorum;

        let mut resolution = None;
        if confirms >= quorum {
            status = status.transition(ReportStatus::Confirmed)?;
            // Only fallible step of execution; runs before any other mutation.
            let outcome = registry.slash(
                report.accused,
                report.slash_amount,
                report.offense,
                config,
                now,
            )?;
            status = status.transition(ReportStatus::Executed)?;
            let reporter_reward = apply_bps(outcome.slashed, config.reporter_reward_bps);
            resolution = Some(Resolution {
                slashed: outcome.slashed,
                node_slashed: outcome.moved_to_slashed,
                reporter_refund: report.reporter_stake,
                reporter_reward,
                reporter_penalty: 0,
                expired: false,
                resolved_at: now,
            });
        } else if rejects >= quorum {
            status = status.transition(ReportStatus::Rejected)?;
            resolution = Some(rejection(report.reporter_stake, config, false, now));
        }

        let report = self.get_mut(id)?;
        report.votes.push(Vote {
            reviewer: reviewer.clone(),
            confirm,
            cast_at: now,
        });
        report.confirms = confirms;
        report.rejects = rejects;
        report.status = status;
        tracing::info!(report = %id, confirm, confirms, rejects, status = %status, "Report vote recorded");

        if let Some(resolution) = resolution {
            self.settle(id, resolution, treasury)?;
        }
        Ok(status)
    }

    /// Reject an open report whose review period has elapsed.
    ///
    /// Calling this on a resolved report fails, so stale triggers are visible.
    pub fn check_expired_report(
        &mut self,
        id: ReportId,
        treasury: &mut Treasury,
        config: &EconomicsConfig,
        now: Timestamp,
    ) -> Result<Resolution, HyphaError> {
        let report = self.get(id)?;
        if !report.is_open() {
            return Err(HyphaError::InvalidState(format!(
                "{} is already resolved ({})",
                id, report.status
            )));
        }
        let deadline = report.deadline(config.review_period_secs);
        if now < deadline {
            return Err(HyphaError::Timing(format!(
                "{} is under review until {} ({}s remaining)",
                id,
                deadline,
                deadline - now
            )));
        }
        let status = report.status.transition(ReportStatus::Rejected)?;
        let resolution = rejection(report.reporter_stake, config, true, now);

        self.get_mut(id)?.status = status;
        self.settle(id, resolution, treasury)?;
        tracing::info!(report = %id, "Report expired without quorum");
        Ok(resolution)
    }

    /// Withdraw the refunds and bonuses owed to a reporter.
    pub fn claim_payout(&mut self, who: &Address) -> Result<Amount, HyphaError> {
        match self.payouts.remove(who) {
            Some(amount) if amount > 0 => {
                tracing::info!(reporter = %who, amount, "Reporter payout claimed");
                Ok(amount)
            }
            _ => Err(HyphaError::InvalidState(format!(
                "{} has no reporter payout",
                who
            ))),
        }
    }

    /// Designate a reviewer.
    pub fn add_reviewer(&mut self, reviewer: Address) -> Result<(), HyphaError> {
        if !self.reviewers.insert(reviewer.clone()) {
            return Err(HyphaError::InvalidState(format!(
                "{} is already a reviewer",
                reviewer
            )));
        }
        Ok(())
    }

    /// Revoke a reviewer. Votes already cast stand.
    pub fn remove_reviewer(&mut self, reviewer: &Address) -> Result<(), HyphaError> {
        if !self.reviewers.remove(reviewer) {
            return Err(HyphaError::NotFound(format!("{} is not a reviewer", reviewer)));
        }
        Ok(())
    }

    /// Look up a report.
    pub fn get(&self, id: ReportId) -> Result<&SlashReport, HyphaError> {
        usize::try_from(id.0)
            .ok()
            .and_then(|i| self.reports.get(i))
            .ok_or_else(|| HyphaError::NotFound(format!("{} does not exist", id)))
    }

    /// All reports in submission order.
    pub fn reports(&self) -> &[SlashReport] {
        &self.reports
    }

    /// Open reports whose review period has elapsed at `now`.
    pub fn expired_open_reports(&self, config: &EconomicsConfig, now: Timestamp) -> Vec<ReportId> {
        self.reports
            .iter()
            .filter(|r| r.is_open() && now >= r.deadline(config.review_period_secs))
            .map(|r| r.id)
            .collect()
    }

    /// Designated reviewers.
    pub fn reviewers(&self) -> &BTreeSet<Address> {
        &self.reviewers
    }

    /// Unclaimed balance owed to a reporter.
    pub fn payout_of(&self, who: &Address) -> Amount {
        self.payouts.get(who).copied().unwrap_or(0)
    }

    /// Reporter stake currently held for open reports.
    pub fn escrowed(&self) -> Amount {
        self.escrowed
    }

    /// Release escrow and move funds for a resolved report.
    fn settle(
        &mut self,
        id: ReportId,
        resolution: Resolution,
        treasury: &mut Treasury,
    ) -> Result<(), HyphaError> {
        let report = self.get_mut(id)?;
        report.resolution = Some(resolution);
        let reporter = report.reporter.clone();
        let stake = report.reporter_stake;

        self.escrowed = self.escrowed.saturating_sub(stake);
        let owed = resolution
            .reporter_refund
            .saturating_add(resolution.reporter_reward);
        if owed > 0 {
            let balance = self.payouts.entry(reporter).or_insert(0);
            *balance = balance.saturating_add(owed);
        }
        let forfeited = resolution
            .slashed
            .saturating_sub(resolution.reporter_reward)
            .saturating_add(resolution.reporter_penalty);
        treasury.deposit_forfeit(forfeited);
        Ok(())
    }

    fn get_mut(&mut self, id: ReportId) -> Result<&mut SlashReport, HyphaError> {
        usize::try_from(id.0)
            .ok()
            .and_then(|i| self.reports.get_mut(i))
            .ok_or_else(|| HyphaError::NotFound(format!("{} does not exist", id)))
    }
}

impl SlashReport {
    /// Whether the report is still Pending or UnderReview.
    pub fn is_open(&self) -> bool {
        self.status.is_open()
    }
}

fn rejection(
    reporter_stake: Amount,
    config: &EconomicsConfig,
    expired: bool,
    now: Timestamp,
) -> Resolution {
    let penalty = apply_bps(reporter_stake, config.reporter_penalty_bps);
    Resolution {
        slashed: 0,
        node_slashed: false,
        reporter_refund: reporter_stake - penalty,
        reporter_reward: 0,
        reporter_penalty: penalty,
        expired,
        resolved_at: now,
    }
}
