//! Payout sink for claimed refunds
//!
//! A claim settles the accounting first and only then hands the amount to a
//! [`Payout`] implementation, which performs the external value transfer.

use crate::types::{Address, Balance};
use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PayoutError {
    #[error("recipient {0} rejected the transfer")]
    Rejected(Address),

    #[error("transfer failed: {0}")]
    Transfer(String),
}

/// External value transfer
pub trait Payout: Send + Sync {
    fn pay(&self, to: &Address, amount: Balance) -> Result<(), PayoutError>;
}

/// In-memory balance book
#[derive(Debug, Default)]
pub struct BalanceBook {
    balances: Mutex<BTreeMap<Address, Balance>>,
    rejected: Mutex<BTreeSet<Address>>,
}

impl BalanceBook {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn balance_of(&self, who: &Address) -> Balance {
        self.balances.lock().get(who).copied().unwrap_or(0)
    }

    /// Refuse transfers to `who` until [`accept`](Self::accept) is called
    pub fn reject(&self, who: Address) {
        self.rejected.lock().insert(who);
    }

    pub fn accept(&self, who: &Address) {
        self.rejected.lock().remove(who);
    }
}

impl Payout for BalanceBook {
    fn pay(&self, to: &Address, amount: Balance) -> Result<(), PayoutError> {
        if self.rejected.lock().contains(to) {
            return Err(PayoutError::Rejected(*to));
        }
        let mut balances = self.balances.lock();
        let balance = balances.entry(*to).or_insert(0);
        *balance = balance
            .checked_add(amount)
            .ok_or_else(|| PayoutError::Transfer("balance overflow".into()))?;
        Ok(())
    }
}
