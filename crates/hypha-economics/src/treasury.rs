// crates/hypha-economics/src/treasury.rs
//
// Protocol treasury for the Hypha incentive engine.
//
// Two balances are tracked separately:
//   - the rewards pool, funded by anyone and drawn down by epoch distribution
//   - forfeitures, receiving slashed node stake and reporter penalties
//
// Forfeitures are never recycled into the rewards pool automatically.

use serde::{Deserialize, Serialize};

use hypha_core::{Amount, HyphaError};

/// Rewards pool and forfeiture balances.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Treasury {
    rewards_pool: Amount,
    forfeited: Amount,
    total_distributed: Amount,
}

impl Treasury {
    /// Create a treasury with empty balances.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a treasury with a pre-funded rewards pool.
    pub fn with_rewards_pool(balance: Amount) -> Self {
        Self {
            rewards_pool: balance,
            ..Self::default()
        }
    }

    /// Add funds to the rewards pool. Returns the new pool balance.
    ///
    /// # Errors
    /// `Validation` for a zero amount or if the pool would overflow.
    pub fn fund_rewards(&mut self, amount: Amount) -> Result<Amount, HyphaError> {
        if amount == 0 {
            return Err(HyphaError::Validation(
                "Funding amount must be positive".to_string(),
            ));
        }
        self.rewards_pool = self.rewards_pool.checked_add(amount).ok_or_else(|| {
            HyphaError::Validation("Rewards pool balance would overflow".to_string())
        })?;
        Ok(self.rewards_pool)
    }

    /// Draw credited rewards out of the pool.
    ///
    /// # Errors
    /// `InvalidState` if the pool holds less than `amount`.
    pub fn draw_rewards(&mut self, amount: Amount) -> Result<(), HyphaError> {
        if amount > self.rewards_pool {
            return Err(HyphaError::InvalidState(format!(
                "Insufficient rewards pool: requested {} but only {} available",
                amount, self.rewards_pool
            )));
        }
        self.rewards_pool -= amount;
        self.total_distributed = self.total_distributed.saturating_add(amount);
        Ok(())
    }

    /// Receive forfeited stake.
    pub fn deposit_forfeit(&mut self, amount: Amount) {
        self.forfeited = self.forfeited.saturating_add(amount);
    }

    /// Undistributed rewards.
    pub fn rewards_pool(&self) -> Amount {
        self.rewards_pool
    }

    /// Slashed stake and reporter penalties received so far.
    pub fn forfeited(&self) -> Amount {
        self.forfeited
    }

    /// Rewards paid out across all epochs.
    pub fn total_distributed(&self) -> Amount {
        self.total_distributed
    }
}
