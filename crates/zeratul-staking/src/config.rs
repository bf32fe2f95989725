//! Registry configuration
//!
//! Set once at initialization and immutable afterwards.

use crate::error::{Result, StakingError};
use crate::types::{Address, Balance, MAX_RATE};
use serde::{Deserialize, Serialize};

/// Default cap on registered candidates
pub const DEFAULT_MAX_CANDIDATES: u32 = 256;

/// Registry configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    /// Size of the active validator set handed to block production
    pub max_validators: u32,

    /// Epoch length in blocks (not interpreted by the registry)
    pub block_epoch: u64,

    /// Minimum stake attached to a public registration
    pub min_self_stake: Balance,

    /// Community beneficiary
    pub community_address: Address,

    /// Reward split parameter (0-100)
    pub share_out_bonus_percent: u8,

    /// Cap on registered candidates
    #[serde(default = "default_max_candidates")]
    pub max_candidates: u32,
}

fn default_max_candidates() -> u32 {
    DEFAULT_MAX_CANDIDATES
}

impl Config {
    pub fn new(
        max_validators: u32,
        block_epoch: u64,
        min_self_stake: Balance,
        community_address: Address,
        share_out_bonus_percent: u8,
    ) -> Self {
        Self {
            max_validators,
            block_epoch,
            min_self_stake,
            community_address,
            share_out_bonus_percent,
            max_candidates: DEFAULT_MAX_CANDIDATES,
        }
    }

    pub fn with_max_candidates(mut self, max_candidates: u32) -> Self {
        self.max_candidates = max_candidates;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_validators == 0 {
            return Err(StakingError::InvalidConfig("max_validators must be positive".into()));
        }

        if self.share_out_bonus_percent > MAX_RATE {
            return Err(StakingError::InvalidConfig(format!(
                "share_out_bonus_percent {} > 100",
                self.share_out_bonus_percent
            )));
        }

        if self.community_address.is_zero() {
            return Err(StakingError::InvalidConfig("community address is null".into()));
        }

        if self.max_candidates == 0 {
            return Err(StakingError::InvalidConfig("max_candidates must be positive".into()));
        }

        Ok(())
    }
}
