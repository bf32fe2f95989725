//! Validator Registry
//!
//! Owns the configuration and every validator's staking ledger, and keeps the
//! system-wide stake aggregate and the stake ranking in step with the ledgers.
//!
//! Ledgers live in an arena indexed by registration order. All stake changes
//! go through the registry so that the aggregate and the ranking never drift.

use crate::config::Config;
use crate::error::{Result, StakingError, StoreError};
use crate::ledger::StakingLedger;
use crate::ranking::StakeRanking;
use crate::types::{Address, Balance, ValidatorIndex, MAX_RATE};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::{debug, info};

/// Persistable registry state
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistrySnapshot {
    pub config: Option<Config>,
    /// Ledgers in registration order
    pub ledgers: Vec<StakingLedger>,
    pub total_stake: Balance,
}

/// Validator registry
#[derive(Debug, Clone, Default)]
pub struct ValidatorRegistry {
    /// Set exactly once by `initialize`
    config: Option<Config>,
    /// Ledgers by registration order
    ledgers: Vec<StakingLedger>,
    /// Validator address to arena index
    index: HashMap<Address, ValidatorIndex>,
    /// Stake ranking over the arena
    ranking: StakeRanking,
    /// Sum of every ledger's total stake
    total_stake: Balance,
}

impl ValidatorRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store the configuration, once
    pub fn initialize(
        &mut self,
        max_validators: u32,
        block_epoch: u64,
        min_self_stake: Balance,
        community_address: Address,
        share_out_bonus_percent: u8,
    ) -> Result<()> {
        self.initialize_with(Config::new(
            max_validators,
            block_epoch,
            min_self_stake,
            community_address,
            share_out_bonus_percent,
        ))
    }

    pub fn initialize_with(&mut self, config: Config) -> Result<()> {
        if self.config.is_some() {
            return Err(StakingError::AlreadyInitialized);
        }
        config.validate()?;

        info!(
            max_validators = config.max_validators,
            min_self_stake = %config.min_self_stake,
            max_candidates = config.max_candidates,
            "registry initialized"
        );
        self.config = Some(config);
        Ok(())
    }

    pub fn config(&self) -> Result<&Config> {
        self.config.as_ref().ok_or(StakingError::NotInitialized)
    }

    pub fn is_initialized(&self) -> bool {
        self.config.is_some()
    }

    /// Bootstrap a validator without the self-stake minimum or candidate cap
    pub fn create_ledger(
        &mut self,
        validator: Address,
        manager: Address,
        commission_rate: u8,
        initial_stake: Balance,
    ) -> Result<ValidatorIndex> {
        self.config()?;
        self.check_new_validator(validator, commission_rate)?;
        self.insert_ledger(validator, manager, commission_rate, initial_stake)
    }

    /// Public registration with attached self-stake
    pub fn register_validator(
        &mut self,
        validator: Address,
        manager: Address,
        commission_rate: u8,
        attached_stake: Balance,
    ) -> Result<ValidatorIndex> {
        let config = self.config()?;
        let min_self_stake = config.min_self_stake;
        let max_candidates = config.max_candidates;

        self.check_new_validator(validator, commission_rate)?;

        if validator == manager {
            return Err(StakingError::SelfManagerForbidden);
        }

        if attached_stake < min_self_stake {
            return Err(StakingError::InsufficientSelfStake {
                required: min_self_stake,
                provided: attached_stake,
            });
        }

        if self.ledgers.len() >= max_candidates as usize {
            return Err(StakingError::RegistryFull(max_candidates));
        }

        self.insert_ledger(validator, manager, commission_rate, attached_stake)
    }

    fn check_new_validator(&self, validator: Address, commission_rate: u8) -> Result<()> {
        if self.index.contains_key(&validator) {
            return Err(StakingError::DuplicateValidator(validator));
        }
        if commission_rate > MAX_RATE {
            return Err(StakingError::InvalidRate(commission_rate));
        }
        Ok(())
    }

    fn insert_ledger(
        &mut self,
        validator: Address,
        manager: Address,
        commission_rate: u8,
        stake: Balance,
    ) -> Result<ValidatorIndex> {
        let idx = ValidatorIndex::try_from(self.ledgers.len()).map_err(|_| StakingError::Overflow)?;
        let total_stake = self.total_stake.checked_add(stake).ok_or(StakingError::Overflow)?;

        // registration seeds the conversion factor from the rate
        let ledger = StakingLedger::new(
            validator,
            manager,
            commission_rate,
            Balance::from(commission_rate),
            stake,
        )?;

        info!(
            %validator,
            %manager,
            rate = commission_rate,
            %stake,
            index = idx,
            "validator registered"
        );

        self.ledgers.push(ledger);
        self.index.insert(validator, idx);
        self.ranking.insert(idx, stake);
        self.total_stake = total_stake;

        Ok(idx)
    }

    fn index_of(&self, validator: &Address) -> Result<ValidatorIndex> {
        self.index
            .get(validator)
            .copied()
            .ok_or(StakingError::UnknownValidator(*validator))
    }

    pub fn ledger(&self, validator: &Address) -> Result<&StakingLedger> {
        let idx = self.index_of(validator)?;
        Ok(&self.ledgers[idx as usize])
    }

    /// Apply a stake-changing ledger mutation and sync aggregate and ranking
    fn with_ledger<T>(
        &mut self,
        validator: &Address,
        op: impl FnOnce(&mut StakingLedger) -> Result<T>,
    ) -> Result<T> {
        let idx = self.index_of(validator)?;
        let ledger = &mut self.ledgers[idx as usize];
        let before = ledger.total_stake();

        let out = op(ledger)?;

        let after = ledger.total_stake();
        if after != before {
            self.total_stake = if after > before {
                self.total_stake.checked_add(after - before)
            } else {
                self.total_stake.checked_sub(before - after)
            }
            .ok_or(StakingError::Overflow)?;
            self.ranking.update(idx, before, after);
        }

        Ok(out)
    }

    /// Delegate `amount` stake from `holder`, returning the minted stock
    pub fn buy(&mut self, holder: Address, validator: &Address, amount: Balance) -> Result<Balance> {
        // aggregate must absorb the amount before the ledger is touched
        self.total_stake.checked_add(amount).ok_or(StakingError::Overflow)?;

        let minted = self.with_ledger(validator, |ledger| ledger.buy(holder, amount))?;
        debug!(%holder, %validator, %amount, %minted, "stock bought");
        Ok(minted)
    }

    /// Burn `shares` of `holder`'s stock, returning the stake queued for refund
    pub fn sell(&mut self, holder: Address, validator: &Address, shares: Balance) -> Result<Balance> {
        let released = self.with_ledger(validator, |ledger| ledger.sell(holder, shares))?;
        debug!(%holder, %validator, %shares, %released, "stock sold");
        Ok(released)
    }

    /// Take `holder`'s pending refund from `validator`
    pub fn claim(&mut self, holder: Address, validator: &Address) -> Result<Balance> {
        let amount = self.with_ledger(validator, |ledger| ledger.claim(holder))?;
        debug!(%holder, %validator, %amount, "refund claimed");
        Ok(amount)
    }

    pub(crate) fn restore_refund(
        &mut self,
        holder: Address,
        validator: &Address,
        amount: Balance,
    ) -> Result<()> {
        self.with_ledger(validator, |ledger| ledger.restore_pending(holder, amount))
    }

    /// Change the commission rate; only the validator's manager may do this
    pub fn update_commission(&mut self, caller: Address, validator: &Address, rate: u8) -> Result<()> {
        let idx = self.index_of(validator)?;
        let ledger = &mut self.ledgers[idx as usize];
        if ledger.manager() != caller {
            return Err(StakingError::NotManager);
        }
        ledger.set_commission_rate(rate)?;
        info!(%validator, rate, "commission updated");
        Ok(())
    }

    /// Up to `n` validators by total stake, ties by registration order
    pub fn top_validators(&self, n: usize) -> Result<Vec<Address>> {
        if n == 0 {
            return Err(StakingError::InvalidCount);
        }
        Ok(self
            .ranking
            .top(n)
            .map(|key| self.ledgers[key.index() as usize].validator())
            .collect())
    }

    /// The `max_validators` best-staked validators
    pub fn active_validators(&self) -> Result<Vec<Address>> {
        let n = self.config()?.max_validators as usize;
        self.top_validators(n)
    }

    pub fn total_stake(&self) -> Balance {
        self.total_stake
    }

    pub fn len(&self) -> usize {
        self.ledgers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ledgers.is_empty()
    }

    /// Ledgers in registration order
    pub fn validators(&self) -> impl Iterator<Item = &StakingLedger> {
        self.ledgers.iter()
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        RegistrySnapshot {
            config: self.config.clone(),
            ledgers: self.ledgers.clone(),
            total_stake: self.total_stake,
        }
    }

    /// Rebuild the index, ranking and aggregate from persisted ledgers
    pub fn from_snapshot(snapshot: RegistrySnapshot) -> std::result::Result<Self, StoreError> {
        let mut registry = Self::new();

        if let Some(config) = snapshot.config {
            config
                .validate()
                .map_err(|e| StoreError::Inconsistent(e.to_string()))?;
            registry.config = Some(config);
        } else if !snapshot.ledgers.is_empty() {
            return Err(StoreError::Inconsistent("ledgers without config".into()));
        }

        for ledger in snapshot.ledgers {
            let idx = ValidatorIndex::try_from(registry.ledgers.len())
                .map_err(|_| StoreError::Inconsistent("too many ledgers".into()))?;
            if !ledger.is_consistent() {
                return Err(StoreError::Inconsistent(format!(
                    "stock of {} does not sum to total",
                    ledger.validator()
                )));
            }
            if registry.index.insert(ledger.validator(), idx).is_some() {
                return Err(StoreError::Inconsistent(format!(
                    "duplicate validator {}",
                    ledger.validator()
                )));
            }
            registry.total_stake = registry
                .total_stake
                .checked_add(ledger.total_stake())
                .ok_or_else(|| StoreError::Inconsistent("total stake overflow".into()))?;
            registry.ranking.insert(idx, ledger.total_stake());
            registry.ledgers.push(ledger);
        }

        if registry.total_stake != snapshot.total_stake {
            return Err(StoreError::Inconsistent(format!(
                "total stake {} != sum of ledgers {}",
                snapshot.total_stake, registry.total_stake
            )));
        }

        Ok(registry)
    }
}
