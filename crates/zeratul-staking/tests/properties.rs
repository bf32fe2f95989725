//! Property tests for the accounting invariants.

use proptest::prelude::*;
use zeratul_staking::{Address, Balance, StakingError, ValidatorRegistry};

const VALIDATORS: u64 = 6;
const HOLDERS: u64 = 4;

#[derive(Debug, Clone)]
enum Op {
    Buy { holder: u64, validator: u64, amount: Balance },
    Sell { holder: u64, validator: u64, shares: Balance },
    Claim { holder: u64, validator: u64 },
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        (0..HOLDERS, 0..VALIDATORS, 0u128..1_000).prop_map(|(holder, validator, amount)| Op::Buy {
            holder,
            validator,
            amount
        }),
        (0..HOLDERS, 0..VALIDATORS, 0u128..60_000).prop_map(|(holder, validator, shares)| Op::Sell {
            holder,
            validator,
            shares
        }),
        (0..HOLDERS, 0..VALIDATORS).prop_map(|(holder, validator)| Op::Claim { holder, validator }),
    ]
}

fn validator(i: u64) -> Address {
    Address::from_index(1 + i)
}

fn holder(i: u64) -> Address {
    Address::from_index(100 + i)
}

fn registry(stakes: &[Balance], rates: &[u8]) -> ValidatorRegistry {
    let mut registry = ValidatorRegistry::new();
    registry
        .initialize(3, 200, 10, Address::from_index(999), 80)
        .unwrap();
    for (i, (stake, rate)) in stakes.iter().zip(rates).enumerate() {
        let i = i as u64;
        registry
            .register_validator(validator(i), Address::from_index(50 + i), *rate, 10 + *stake)
            .unwrap();
    }
    registry
}

fn check_invariants(registry: &ValidatorRegistry) {
    let sum: Balance = registry.validators().map(|l| l.total_stake()).sum();
    assert_eq!(registry.total_stake(), sum);
    for ledger in registry.validators() {
        assert!(ledger.is_consistent());
    }

    let top = registry.top_validators(registry.len().max(1)).unwrap();
    let mut expected: Vec<(usize, &_)> = registry.validators().enumerate().collect();
    expected.sort_by(|(ia, a), (ib, b)| b.total_stake().cmp(&a.total_stake()).then(ia.cmp(ib)));
    let expected: Vec<Address> = expected.into_iter().map(|(_, l)| l.validator()).collect();
    assert_eq!(top, expected);
}

proptest! {
    #[test]
    fn aggregate_and_ranking_hold_after_every_op(
        stakes in prop::collection::vec(0u128..100, VALIDATORS as usize),
        rates in prop::collection::vec(1u8..=100, VALIDATORS as usize),
        ops in prop::collection::vec(op(), 1..60),
    ) {
        let mut registry = registry(&stakes, &rates);
        check_invariants(&registry);

        for op in ops {
            let before = registry.snapshot();
            let result = match op {
                Op::Buy { holder: h, validator: v, amount } => {
                    registry.buy(holder(h), &validator(v), amount).map(|_| ())
                }
                Op::Sell { holder: h, validator: v, shares } => {
                    registry.sell(holder(h), &validator(v), shares).map(|_| ())
                }
                Op::Claim { holder: h, validator: v } => {
                    registry.claim(holder(h), &validator(v)).map(|_| ())
                }
            };
            if result.is_err() {
                prop_assert_eq!(registry.snapshot(), before);
            }
            check_invariants(&registry);
        }
    }

    #[test]
    fn buy_sell_pairs_preserve_conversion(
        rate in 1u8..=100,
        amounts in prop::collection::vec(1u128..10_000, 1..20),
    ) {
        let mut registry = registry(&[0], &[rate]);
        let v = validator(0);
        let factor = Balance::from(rate);

        let mut paid = 0;
        for (i, amount) in amounts.iter().enumerate() {
            let h = holder(i as u64 % HOLDERS);
            let minted = registry.buy(h, &v, *amount).unwrap();
            prop_assert_eq!(minted, amount * factor);
            paid += registry.sell(h, &v, minted).unwrap();

            let ledger = registry.ledger(&v).unwrap();
            prop_assert_eq!(ledger.total_stock(), ledger.total_stake() * factor);
        }

        // every sell is refunded in full
        let mut claimed = 0;
        for h in 0..HOLDERS {
            match registry.claim(holder(h), &v) {
                Ok(amount) => claimed += amount,
                Err(e) => prop_assert_eq!(e, StakingError::NothingToClaim),
            }
        }
        prop_assert_eq!(claimed, paid);
        prop_assert_eq!(paid, amounts.iter().sum::<Balance>());
        prop_assert_eq!(registry.total_stake(), 10);
    }
}
