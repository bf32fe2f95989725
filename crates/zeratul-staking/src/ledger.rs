//! Staking ledger: one validator's stake pool
//!
//! ## How it works:
//!
//! 1. **Buy stock**:
//!    - Deposit X stake
//!    - Mint Y stock where Y = X * φ
//!
//! 2. **Sell stock**:
//!    - Burn Y stock
//!    - Move X = Y / φ stake into the holder's pending refund
//!    - Any remainder of the division stays in the pool
//!
//! 3. **Claim**:
//!    - Pay out the whole pending refund and zero it
//!
//! φ is the conversion factor fixed when the ledger is created. It is kept
//! apart from the commission rate even though registration seeds it from
//! the same number.
//!
//! ## Example:
//!
//! ```text
//! Create:  stake 10, φ = 50      → stock 500 (held by the manager)
//! Alice:   buy 10                → +500 stock, stake 20, stock 1000
//! Alice:   sell 500              → stake 10, stock 500, pending(Alice) = 10
//! Alice:   claim                 → paid 10, pending(Alice) = 0
//! ```

use crate::error::{Result, StakingError};
use crate::types::{Address, Balance, MAX_RATE};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Share accounting for a single validator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StakingLedger {
    /// Owning validator
    validator: Address,

    /// Identity allowed to administer the commission rate
    manager: Address,

    /// Commission rate (0-100)
    commission_rate: u8,

    /// Stock minted per unit of stake
    conversion_factor: Balance,

    /// Stake backing this validator (self-stake + delegations)
    total_stake: Balance,

    /// Outstanding stock
    total_stock: Balance,

    /// Stock per holder, zero entries removed
    stock_of: BTreeMap<Address, Balance>,

    /// Stake owed per holder after a sell, zero entries removed
    pending_refund: BTreeMap<Address, Balance>,
}

impl StakingLedger {
    /// Create a ledger with the manager holding the initial stock
    pub fn new(
        validator: Address,
        manager: Address,
        commission_rate: u8,
        conversion_factor: Balance,
        initial_stake: Balance,
    ) -> Result<Self> {
        if commission_rate > MAX_RATE {
            return Err(StakingError::InvalidRate(commission_rate));
        }

        let initial_stock = initial_stake
            .checked_mul(conversion_factor)
            .ok_or(StakingError::Overflow)?;

        let mut stock_of = BTreeMap::new();
        if initial_stock > 0 {
            stock_of.insert(manager, initial_stock);
        }

        Ok(Self {
            validator,
            manager,
            commission_rate,
            conversion_factor,
            total_stake: initial_stake,
            total_stock: initial_stock,
            stock_of,
            pending_refund: BTreeMap::new(),
        })
    }

    /// Deposit stake → mint stock
    ///
    /// Returns the minted stock.
    pub fn buy(&mut self, holder: Address, amount: Balance) -> Result<Balance> {
        if amount == 0 {
            return Err(StakingError::ZeroAmount);
        }

        let minted = amount
            .checked_mul(self.conversion_factor)
            .ok_or(StakingError::Overflow)?;
        if minted == 0 {
            return Err(StakingError::ZeroAmount);
        }

        let total_stake = self.total_stake.checked_add(amount).ok_or(StakingError::Overflow)?;
        let total_stock = self.total_stock.checked_add(minted).ok_or(StakingError::Overflow)?;

        // holder stock is bounded by total_stock, so this cannot overflow
        *self.stock_of.entry(holder).or_insert(0) += minted;
        self.total_stake = total_stake;
        self.total_stock = total_stock;

        Ok(minted)
    }

    /// Burn stock → queue stake for refund
    ///
    /// Returns the stake moved into the holder's pending refund.
    pub fn sell(&mut self, holder: Address, shares: Balance) -> Result<Balance> {
        if shares == 0 {
            return Err(StakingError::ZeroAmount);
        }

        let held = self.shares_of(&holder);
        if held < shares {
            return Err(StakingError::InsufficientShares {
                held,
                requested: shares,
            });
        }

        let released = self.stake_for_shares(shares);
        let total_stake = self.total_stake.checked_sub(released).ok_or(StakingError::Overflow)?;
        let total_stock = self.total_stock.checked_sub(shares).ok_or(StakingError::Overflow)?;
        let pending = self
            .pending_of(&holder)
            .checked_add(released)
            .ok_or(StakingError::Overflow)?;

        if held == shares {
            self.stock_of.remove(&holder);
        } else {
            self.stock_of.insert(holder, held - shares);
        }
        if pending > 0 {
            self.pending_refund.insert(holder, pending);
        }
        self.total_stake = total_stake;
        self.total_stock = total_stock;

        Ok(released)
    }

    /// Take the holder's whole pending refund
    pub fn claim(&mut self, holder: Address) -> Result<Balance> {
        self.pending_refund
            .remove(&holder)
            .filter(|amount| *amount > 0)
            .ok_or(StakingError::NothingToClaim)
    }

    /// Put back a refund taken by [`claim`](Self::claim) whose payout failed
    pub(crate) fn restore_pending(&mut self, holder: Address, amount: Balance) -> Result<()> {
        if amount == 0 {
            return Ok(());
        }
        let pending = self
            .pending_of(&holder)
            .checked_add(amount)
            .ok_or(StakingError::Overflow)?;
        self.pending_refund.insert(holder, pending);
        Ok(())
    }

    pub(crate) fn set_commission_rate(&mut self, rate: u8) -> Result<()> {
        if rate > MAX_RATE {
            return Err(StakingError::InvalidRate(rate));
        }
        self.commission_rate = rate;
        Ok(())
    }

    /// Stake released by burning `shares` (truncating)
    pub fn stake_for_shares(&self, shares: Balance) -> Balance {
        shares.checked_div(self.conversion_factor).unwrap_or(0)
    }

    pub fn rate(&self) -> u8 {
        self.commission_rate
    }

    pub fn manager(&self) -> Address {
        self.manager
    }

    pub fn validator(&self) -> Address {
        self.validator
    }

    pub fn conversion_factor(&self) -> Balance {
        self.conversion_factor
    }

    pub fn total_stake(&self) -> Balance {
        self.total_stake
    }

    pub fn total_stock(&self) -> Balance {
        self.total_stock
    }

    pub fn shares_of(&self, holder: &Address) -> Balance {
        self.stock_of.get(holder).copied().unwrap_or(0)
    }

    pub fn pending_of(&self, holder: &Address) -> Balance {
        self.pending_refund.get(holder).copied().unwrap_or(0)
    }

    /// Holders with non-zero stock, ordered by address
    pub fn holders(&self) -> impl Iterator<Item = (&Address, &Balance)> {
        self.stock_of.iter()
    }

    /// Sum of all pending refunds
    pub fn total_pending(&self) -> Balance {
        self.pending_refund.values().fold(0, |acc, v| acc.saturating_add(*v))
    }

    /// Check that the recorded total matches the per-holder stock
    pub fn is_consistent(&self) -> bool {
        let sum = self
            .stock_of
            .values()
            .try_fold(0u128, |acc, v| acc.checked_add(*v));
        sum == Some(self.total_stock)
    }
}
