// crates/hypha-economics/src/config.rs
//
// Administrative parameters of the incentive engine.
//
// Loaded as the `[economics]` table of the daemon's TOML file, or populated
// with defaults. Changes after startup go through `AdminAction`, which
// re-validates the affected invariant before anything is applied.

use serde::{Deserialize, Serialize};

use hypha_core::{Address, Amount, HyphaError, BPS_DENOMINATOR, MAX_QUALITY_SCORE};

use crate::slashing::{Offense, SlashSchedule};

const DAY_SECS: u64 = 86_400;

/// Relative weights of the three reward factors. Always sums to 100.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardWeights {
    /// Weight of the oracle quality score.
    pub quality: u64,
    /// Weight of the node's share of bytes served this epoch.
    pub bytes: u64,
    /// Weight of the request success rate.
    pub uptime: u64,
}

impl RewardWeights {
    /// Required sum of all three weights.
    pub const TOTAL: u64 = 100;

    /// Build a validated weight set.
    ///
    /// # Errors
    /// Returns `HyphaError::Validation` if the weights do not sum to 100.
    pub fn new(quality: u64, bytes: u64, uptime: u64) -> Result<Self, HyphaError> {
        let weights = Self {
            quality,
            bytes,
            uptime,
        };
        weights.validate()?;
        Ok(weights)
    }

    /// Check that the weights sum to exactly 100.
    pub fn validate(&self) -> Result<(), HyphaError> {
        let sum = self
            .quality
            .checked_add(self.bytes)
            .and_then(|s| s.checked_add(self.uptime));
        match sum {
            Some(Self::TOTAL) => Ok(()),
            _ => Err(HyphaError::Validation(format!(
                "Reward weights must sum to {} (quality={}, bytes={}, uptime={})",
                Self::TOTAL,
                self.quality,
                self.bytes,
                self.uptime
            ))),
        }
    }
}

impl Default for RewardWeights {
    fn default() -> Self {
        Self {
            quality: 50,
            bytes: 30,
            uptime: 20,
        }
    }
}

/// Economic parameters of the engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EconomicsConfig {
    /// Minimum stake to register, and the floor below which a slashed node
    /// is moved to `Slashed`.
    #[serde(default = "default_min_stake")]
    pub min_stake: Amount,

    /// Hold between `initiate_exit` and `complete_exit`.
    #[serde(default = "default_unbonding_period_secs")]
    pub unbonding_period_secs: u64,

    /// Minimum time between two reward distributions.
    #[serde(default = "default_epoch_duration_secs")]
    pub epoch_duration_secs: u64,

    /// Upper bound on the amount distributed per epoch.
    #[serde(default = "default_rewards_per_epoch")]
    pub rewards_per_epoch: Amount,

    /// Quality score (bps) a node needs to be eligible for rewards.
    #[serde(default = "default_min_quality_score")]
    pub min_quality_score: u64,

    /// Weights of the reward formula.
    #[serde(default)]
    pub reward_weights: RewardWeights,

    /// Per-offense slash rates, in bps of the accused's current stake.
    #[serde(default)]
    pub slash_schedule: SlashSchedule,

    /// Confirm (or reject) votes needed to resolve a report.
    #[serde(default = "default_vote_quorum")]
    pub vote_quorum: u32,

    /// Time a report stays open before it can be expired.
    #[serde(default = "default_review_period_secs")]
    pub review_period_secs: u64,

    /// Share of the forfeited stake paid to a successful reporter (bps).
    #[serde(default = "default_reporter_reward_bps")]
    pub reporter_reward_bps: u64,

    /// Share of a rejected reporter's posted stake that is forfeited (bps).
    #[serde(default = "default_reporter_penalty_bps")]
    pub reporter_penalty_bps: u64,

    /// Minimum stake a reporter must post with a report.
    #[serde(default = "default_min_reporter_stake")]
    pub min_reporter_stake: Amount,

    /// Oldest oracle observation the ingestion gate accepts.
    #[serde(default = "default_oracle_max_staleness_secs")]
    pub oracle_max_staleness_secs: u64,
}

fn default_min_stake() -> Amount {
    1_000
}

fn default_unbonding_period_secs() -> u64 {
    7 * DAY_SECS
}

fn default_epoch_duration_secs() -> u64 {
    DAY_SECS
}

fn default_rewards_per_epoch() -> Amount {
    10_000
}

fn default_min_quality_score() -> u64 {
    5_000
}

fn default_vote_quorum() -> u32 {
    3
}

fn default_review_period_secs() -> u64 {
    3 * DAY_SECS
}

fn default_reporter_reward_bps() -> u64 {
    1_000
}

fn default_reporter_penalty_bps() -> u64 {
    5_000
}

fn default_min_reporter_stake() -> Amount {
    100
}

fn default_oracle_max_staleness_secs() -> u64 {
    3_600
}

impl Default for EconomicsConfig {
    fn default() -> Self {
        Self {
            min_stake: default_min_stake(),
            unbonding_period_secs: default_unbonding_period_secs(),
            epoch_duration_secs: default_epoch_duration_secs(),
            rewards_per_epoch: default_rewards_per_epoch(),
            min_quality_score: default_min_quality_score(),
            reward_weights: RewardWeights::default(),
            slash_schedule: SlashSchedule::default(),
            vote_quorum: default_vote_quorum(),
            review_period_secs: default_review_period_secs(),
            reporter_reward_bps: default_reporter_reward_bps(),
            reporter_penalty_bps: default_reporter_penalty_bps(),
            min_reporter_stake: default_min_reporter_stake(),
            oracle_max_staleness_secs: default_oracle_max_staleness_secs(),
        }
    }
}

impl EconomicsConfig {
    /// Check every cross-field invariant.
    ///
    /// Slash rates are not checked here: the schedule clamps them on write.
    pub fn validate(&self) -> Result<(), HyphaError> {
        self.reward_weights.validate()?;

        if self.vote_quorum == 0 {
            return Err(HyphaError::Validation(
                "vote_quorum must be at least 1".to_string(),
            ));
        }

        for (name, value) in [
            ("unbonding_period_secs", self.unbonding_period_secs),
            ("epoch_duration_secs", self.epoch_duration_secs),
            ("review_period_secs", self.review_period_secs),
        ] {
            if value == 0 {
                return Err(HyphaError::Validation(format!("{} must be non-zero", name)));
            }
        }

        for (name, value) in [
            ("reporter_reward_bps", self.reporter_reward_bps),
            ("reporter_penalty_bps", self.reporter_penalty_bps),
        ] {
            if value > BPS_DENOMINATOR {
                return Err(HyphaError::Validation(format!(
                    "{} must be at most {} (got {})",
                    name, BPS_DENOMINATOR, value
                )));
            }
        }

        if self.min_quality_score > MAX_QUALITY_SCORE {
            return Err(HyphaError::Validation(format!(
                "min_quality_score must be at most {} (got {})",
                MAX_QUALITY_SCORE, self.min_quality_score
            )));
        }

        if self.min_stake == 0 {
            return Err(HyphaError::Validation("min_stake must be non-zero".to_string()));
        }

        Ok(())
    }

    /// Apply a parameter change, returning the name of the changed setting.
    ///
    /// The change is staged on a copy and validated before being committed,
    /// so a rejected action leaves the config untouched. Reviewer and
    /// oracle-key actions are not config fields; they are handled by the
    /// engine and rejected here.
    pub fn apply(&mut self, action: &AdminAction) -> Result<&'static str, HyphaError> {
        let mut staged = self.clone();
        let setting = match action {
            AdminAction::SetMinStake { amount } => {
                staged.min_stake = *amount;
                "min_stake"
            }
            AdminAction::SetUnbondingPeriod { secs } => {
                staged.unbonding_period_secs = *secs;
                "unbonding_period_secs"
            }
            AdminAction::SetEpochDuration { secs } => {
                staged.epoch_duration_secs = *secs;
                "epoch_duration_secs"
            }
            AdminAction::SetRewardsPerEpoch { amount } => {
                staged.rewards_per_epoch = *amount;
                "rewards_per_epoch"
            }
            AdminAction::SetMinQualityScore { score } => {
                staged.min_quality_score = *score;
                "min_quality_score"
            }
            AdminAction::SetRewardWeights { weights } => {
                staged.reward_weights = *weights;
                "reward_weights"
            }
            AdminAction::SetSlashRate { offense, bps } => {
                staged.slash_schedule.set(*offense, *bps);
                "slash_schedule"
            }
            AdminAction::SetVoteQuorum { quorum } => {
                staged.vote_quorum = *quorum;
                "vote_quorum"
            }
            AdminAction::SetReviewPeriod { secs } => {
                staged.review_period_secs = *secs;
                "review_period_secs"
            }
            AdminAction::SetReporterRewardBps { bps } => {
                staged.reporter_reward_bps = *bps;
                "reporter_reward_bps"
            }
            AdminAction::SetReporterPenaltyBps { bps } => {
                staged.reporter_penalty_bps = *bps;
                "reporter_penalty_bps"
            }
            AdminAction::SetMinReporterStake { amount } => {
                staged.min_reporter_stake = *amount;
                "min_reporter_stake"
            }
            AdminAction::SetOracleStaleness { secs } => {
                staged.oracle_max_staleness_secs = *secs;
                "oracle_max_staleness_secs"
            }
            AdminAction::AddReviewer { .. }
            | AdminAction::RemoveReviewer { .. }
            | AdminAction::RotateOracleKey { .. } => {
                return Err(HyphaError::InvalidState(format!(
                    "{:?} is not a config parameter",
                    action
                )));
            }
        };

        staged.validate()?;
        *self = staged;
        Ok(setting)
    }
}

/// An administrative change. Only the configured admin may submit these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum AdminAction {
    SetMinStake { amount: Amount },
    SetUnbondingPeriod { secs: u64 },
    SetEpochDuration { secs: u64 },
    SetRewardsPerEpoch { amount: Amount },
    SetMinQualityScore { score: u64 },
    SetRewardWeights { weights: RewardWeights },
    /// Rates above 10_000 bps are clamped to 100%.
    SetSlashRate { offense: Offense, bps: u64 },
    SetVoteQuorum { quorum: u32 },
    SetReviewPeriod { secs: u64 },
    SetReporterRewardBps { bps: u64 },
    SetReporterPenaltyBps { bps: u64 },
    SetMinReporterStake { amount: Amount },
    SetOracleStaleness { secs: u64 },
    AddReviewer { reviewer: Address },
    RemoveReviewer { reviewer: Address },
    /// Hex-encoded ed25519 public key of the metrics oracle.
    RotateOracleKey { public_key: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        let config = EconomicsConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.reward_weights, RewardWeights::new(50, 30, 20).unwrap());
        assert_eq!(config.vote_quorum, 3);
        assert_eq!(config.review_period_secs, 3 * DAY_SECS);
    }

    #[test]
    fn test_weights_must_sum_to_100() {
        assert!(RewardWeights::new(60, 30, 20).is_err());
        assert!(RewardWeights::new(40, 30, 20).is_err());
        assert!(RewardWeights::new(100, 0, 0).is_ok());
        assert!(RewardWeights::new(u64::MAX, 1, 0).is_err());
    }

    #[test]
    fn test_apply_rejected_weights_leave_config_unchanged() {
        let mut config = EconomicsConfig::default();
        let bad = RewardWeights {
            quality: 70,
            bytes: 30,
            uptime: 20,
        };
        let result = config.apply(&AdminAction::SetRewardWeights { weights: bad });
        assert!(result.is_err());
        assert_eq!(config.reward_weights, RewardWeights::default());
    }

    #[test]
    fn test_apply_valid_weights() {
        let mut config = EconomicsConfig::default();
        let weights = RewardWeights::new(40, 40, 20).unwrap();
        let setting = config
            .apply(&AdminAction::SetRewardWeights { weights })
            .unwrap();
        assert_eq!(setting, "reward_weights");
        assert_eq!(config.reward_weights, weights);
    }

    #[test]
    fn test_apply_slash_rate_is_clamped() {
        let mut config = EconomicsConfig::default();
        config
            .apply(&AdminAction::SetSlashRate {
                offense: Offense::SlowResponse,
                bps: 50_000,
            })
            .unwrap();
        assert_eq!(config.slash_schedule.bps_for(Offense::SlowResponse), 10_000);
    }

    #[test]
    fn test_apply_zero_quorum_rejected() {
        let mut config = EconomicsConfig::default();
        assert!(config
            .apply(&AdminAction::SetVoteQuorum { quorum: 0 })
            .is_err());
        assert_eq!(config.vote_quorum, 3);
    }

    #[test]
    fn test_apply_reviewer_action_is_not_config() {
        let mut config = EconomicsConfig::default();
        let reviewer = Address::parse("0x1111111111111111111111111111111111111111").unwrap();
        assert!(config.apply(&AdminAction::AddReviewer { reviewer }).is_err());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EconomicsConfig =
            serde_json::from_str(r#"{"min_stake": 5000, "vote_quorum": 5}"#).unwrap();
        assert_eq!(config.min_stake, 5_000);
        assert_eq!(config.vote_quorum, 5);
        assert_eq!(config.epoch_duration_secs, DAY_SECS);
        assert_eq!(config.slash_schedule, SlashSchedule::default());
    }
}
