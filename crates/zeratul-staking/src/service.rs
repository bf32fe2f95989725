//! Staking service facade
//!
//! The single entry point for callers. Shape-checks arguments, then applies
//! each operation to the registry under one lock acquisition:
//!
//! - mutations hold the write lock for their whole duration, so they are
//!   atomic and totally ordered
//! - queries hold the read lock, so each one sees a single consistent state
//!
//! Refunds are two-phase. [`StakingService::take_refund`] zeroes the pending
//! amount under the write lock and [`StakingService::settle`] calls the payout
//! sink, re-crediting the amount if the sink fails. Callers that persist state
//! save between the two steps, so a crash after payout cannot replay the
//! refund. [`StakingService::refund`] runs both steps back to back.

use crate::config::Config;
use crate::error::{Result, StakingError, StoreError};
use crate::payout::{BalanceBook, Payout};
use crate::registry::{RegistrySnapshot, ValidatorRegistry};
use crate::types::{Address, Balance};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

/// Point-in-time view of one ledger's fields
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerInfo {
    pub validator: Address,
    pub manager: Address,
    pub rate: u8,
    pub conversion_factor: Balance,
    pub total_stake: Balance,
    pub total_stock: Balance,
    pub holders: usize,
    pub pending_refunds: Balance,
}

pub struct StakingService<P: Payout = BalanceBook> {
    registry: RwLock<ValidatorRegistry>,
    payout: P,
}

fn require(addr: &Address) -> Result<()> {
    if addr.is_zero() {
        return Err(StakingError::NullAddress);
    }
    Ok(())
}

impl<P: Payout> StakingService<P> {
    pub fn new(payout: P) -> Self {
        Self::with_registry(ValidatorRegistry::new(), payout)
    }

    pub fn with_registry(registry: ValidatorRegistry, payout: P) -> Self {
        Self {
            registry: RwLock::new(registry),
            payout,
        }
    }

    pub fn from_snapshot(
        snapshot: RegistrySnapshot,
        payout: P,
    ) -> std::result::Result<Self, StoreError> {
        Ok(Self::with_registry(ValidatorRegistry::from_snapshot(snapshot)?, payout))
    }

    pub fn payout(&self) -> &P {
        &self.payout
    }

    pub fn initialize(
        &self,
        max_validators: u32,
        block_epoch: u64,
        min_self_stake: Balance,
        community_address: Address,
        share_out_bonus_percent: u8,
    ) -> Result<()> {
        self.registry.write().initialize(
            max_validators,
            block_epoch,
            min_self_stake,
            community_address,
            share_out_bonus_percent,
        )
    }

    pub fn initialize_with(&self, config: Config) -> Result<()> {
        self.registry.write().initialize_with(config)
    }

    pub fn create_ledger(
        &self,
        validator: Address,
        manager: Address,
        rate: u8,
        stake: Balance,
    ) -> Result<()> {
        require(&validator)?;
        require(&manager)?;
        self.registry
            .write()
            .create_ledger(validator, manager, rate, stake)
            .map(|_| ())
    }

    pub fn register_validator(
        &self,
        validator: Address,
        manager: Address,
        rate: u8,
        attached_stake: Balance,
    ) -> Result<()> {
        require(&validator)?;
        require(&manager)?;
        self.registry
            .write()
            .register_validator(validator, manager, rate, attached_stake)
            .map(|_| ())
    }

    /// Delegate stake; returns minted stock
    pub fn buy_stocks(&self, holder: Address, validator: Address, amount: Balance) -> Result<Balance> {
        require(&holder)?;
        require(&validator)?;
        self.registry.write().buy(holder, &validator, amount)
    }

    /// Burn stock; returns stake queued for refund
    pub fn sell_stocks(&self, holder: Address, validator: Address, shares: Balance) -> Result<Balance> {
        require(&holder)?;
        require(&validator)?;
        self.registry.write().sell(holder, &validator, shares)
    }

    /// Pay out the holder's pending refund; returns the paid amount
    pub fn refund(&self, holder: Address, validator: Address) -> Result<Balance> {
        let amount = self.take_refund(holder, validator)?;
        self.settle(holder, validator, amount)?;
        Ok(amount)
    }

    /// Zero the holder's pending refund without paying it; returns the amount
    ///
    /// The amount is owed to the holder until [`settle`](Self::settle) runs.
    pub fn take_refund(&self, holder: Address, validator: Address) -> Result<Balance> {
        require(&holder)?;
        require(&validator)?;
        self.registry.write().claim(holder, &validator)
    }

    /// Pay an amount taken by [`take_refund`](Self::take_refund)
    ///
    /// On payout failure the amount is re-credited to the holder's pending
    /// refund and `PayoutFailed` is returned.
    pub fn settle(&self, holder: Address, validator: Address, amount: Balance) -> Result<()> {
        if let Err(e) = self.payout.pay(&holder, amount) {
            warn!(%holder, %validator, %amount, error = %e, "payout failed, restoring refund");
            self.registry.write().restore_refund(holder, &validator, amount)?;
            return Err(StakingError::PayoutFailed(e.to_string()));
        }
        Ok(())
    }

    pub fn update_commission(&self, caller: Address, validator: Address, rate: u8) -> Result<()> {
        require(&caller)?;
        require(&validator)?;
        self.registry.write().update_commission(caller, &validator, rate)
    }

    pub fn top_validators(&self, n: usize) -> Result<Vec<Address>> {
        self.registry.read().top_validators(n)
    }

    pub fn active_validators(&self) -> Result<Vec<Address>> {
        self.registry.read().active_validators()
    }

    pub fn total_stake(&self) -> Balance {
        self.registry.read().total_stake()
    }

    pub fn config(&self) -> Result<Config> {
        self.registry.read().config().cloned()
    }

    pub fn validator_count(&self) -> usize {
        self.registry.read().len()
    }

    pub fn ledger_info(&self, validator: Address) -> Result<LedgerInfo> {
        let registry = self.registry.read();
        let ledger = registry.ledger(&validator)?;
        Ok(LedgerInfo {
            validator: ledger.validator(),
            manager: ledger.manager(),
            rate: ledger.rate(),
            conversion_factor: ledger.conversion_factor(),
            total_stake: ledger.total_stake(),
            total_stock: ledger.total_stock(),
            holders: ledger.holders().count(),
            pending_refunds: ledger.total_pending(),
        })
    }

    pub fn shares_of(&self, validator: Address, holder: Address) -> Result<Balance> {
        Ok(self.registry.read().ledger(&validator)?.shares_of(&holder))
    }

    pub fn pending_of(&self, validator: Address, holder: Address) -> Result<Balance> {
        Ok(self.registry.read().ledger(&validator)?.pending_of(&holder))
    }

    /// Run several reads against one consistent state
    pub fn read<T>(&self, f: impl FnOnce(&ValidatorRegistry) -> T) -> T {
        let registry = self.registry.read();
        f(&*registry)
    }

    /// Copy of the registry state
    ///
    /// A refund between `take_refund` and `settle` shows as already claimed.
    pub fn snapshot(&self) -> RegistrySnapshot {
        self.registry.read().snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_index(n)
    }

    fn service() -> StakingService {
        let service = StakingService::new(BalanceBook::new());
        service.initialize(21, 200, 10, addr(999), 80).unwrap();
        service.register_validator(addr(1), addr(101), 50, 10).unwrap();
        service
    }

    #[test]
    fn test_rejects_null_identities() {
        let service = service();
        assert_eq!(
            service.register_validator(Address::ZERO, addr(101), 50, 10),
            Err(StakingError::NullAddress)
        );
        assert_eq!(
            service.create_ledger(addr(2), Address::ZERO, 50, 10),
            Err(StakingError::NullAddress)
        );
        assert_eq!(
            service.buy_stocks(Address::ZERO, addr(1), 10),
            Err(StakingError::NullAddress)
        );
        assert_eq!(service.refund(addr(50), Address::ZERO), Err(StakingError::NullAddress));
        assert_eq!(service.validator_count(), 1);
    }

    #[test]
    fn test_null_community_is_invalid_config() {
        let service: StakingService = StakingService::new(BalanceBook::new());
        assert!(matches!(
            service.initialize(21, 200, 10, Address::ZERO, 80),
            Err(StakingError::InvalidConfig(_))
        ));
    }

    #[test]
    fn test_refund_pays_out() {
        let service = service();
        let alice = addr(50);

        service.buy_stocks(alice, addr(1), 10).unwrap();
        service.sell_stocks(alice, addr(1), 500).unwrap();
        assert_eq!(service.pending_of(addr(1), alice).unwrap(), 10);

        assert_eq!(service.refund(alice, addr(1)).unwrap(), 10);
        assert_eq!(service.payout().balance_of(&alice), 10);
        assert_eq!(service.pending_of(addr(1), alice).unwrap(), 0);
        assert_eq!(service.refund(alice, addr(1)), Err(StakingError::NothingToClaim));
    }

    #[test]
    fn test_failed_payout_restores_pending() {
        let service = service();
        let alice = addr(50);

        service.buy_stocks(alice, addr(1), 10).unwrap();
        service.sell_stocks(alice, addr(1), 500).unwrap();

        service.payout().reject(alice);
        assert!(matches!(
            service.refund(alice, addr(1)),
            Err(StakingError::PayoutFailed(_))
        ));
        assert_eq!(service.pending_of(addr(1), alice).unwrap(), 10);
        assert_eq!(service.payout().balance_of(&alice), 0);

        service.payout().accept(&alice);
        assert_eq!(service.refund(alice, addr(1)).unwrap(), 10);
        assert_eq!(service.payout().balance_of(&alice), 10);
    }

    #[test]
    fn test_taken_refund_is_not_pending() {
        let service = service();
        let alice = addr(50);

        service.buy_stocks(alice, addr(1), 10).unwrap();
        service.sell_stocks(alice, addr(1), 500).unwrap();
        assert_eq!(service.ledger_info(addr(1)).unwrap().pending_refunds, 10);

        assert_eq!(service.take_refund(alice, addr(1)).unwrap(), 10);
        let snapshot = service.snapshot();
        let pending: Balance = snapshot.ledgers.iter().map(|l| l.pending_of(&alice)).sum();
        assert_eq!(pending, 0);
        assert_eq!(service.take_refund(alice, addr(1)), Err(StakingError::NothingToClaim));
        assert_eq!(service.payout().balance_of(&alice), 0);

        service.settle(alice, addr(1), 10).unwrap();
        assert_eq!(service.payout().balance_of(&alice), 10);
        assert_eq!(service.ledger_info(addr(1)).unwrap().pending_refunds, 0);
    }

    #[test]
    fn test_failed_settle_recredits() {
        let service = service();
        let alice = addr(50);

        service.buy_stocks(alice, addr(1), 10).unwrap();
        service.sell_stocks(alice, addr(1), 500).unwrap();
        let amount = service.take_refund(alice, addr(1)).unwrap();

        service.payout().reject(alice);
        assert!(matches!(
            service.settle(alice, addr(1), amount),
            Err(StakingError::PayoutFailed(_))
        ));
        assert_eq!(service.pending_of(addr(1), alice).unwrap(), 10);
    }

    #[test]
    fn test_ledger_info() {
        let service = service();
        let info = service.ledger_info(addr(1)).unwrap();
        assert_eq!(info.manager, addr(101));
        assert_eq!(info.rate, 50);
        assert_eq!(info.conversion_factor, 50);
        assert_eq!(info.total_stake, 10);
        assert_eq!(info.total_stock, 500);
        assert_eq!(info.holders, 1);
        assert_eq!(info.pending_refunds, 0);
        assert_eq!(
            service.ledger_info(addr(2)),
            Err(StakingError::UnknownValidator(addr(2)))
        );
    }

    #[test]
    fn test_read_sees_consistent_state() {
        let service = service();
        service.register_validator(addr(2), addr(102), 50, 40).unwrap();

        let (top, total, sum) = service.read(|registry| {
            let sum: Balance = registry.validators().map(|l| l.total_stake()).sum();
            (registry.top_validators(2).unwrap(), registry.total_stake(), sum)
        });
        assert_eq!(top, vec![addr(2), addr(1)]);
        assert_eq!(total, sum);
    }
}
