//! Top-K validator ranking
//!
//! Validators are ordered by total stake, highest first. Equal stakes rank by
//! registration order, earlier first. The index holds only
//! `(stake, ValidatorIndex)` keys; the ledgers themselves stay in the
//! registry arena.

use crate::types::{Balance, ValidatorIndex};
use std::cmp::Reverse;
use std::collections::BTreeSet;

/// Ordering key: stake descending, then registration order ascending
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct RankKey {
    stake: Reverse<Balance>,
    index: ValidatorIndex,
}

impl RankKey {
    pub fn new(stake: Balance, index: ValidatorIndex) -> Self {
        Self {
            stake: Reverse(stake),
            index,
        }
    }

    pub fn index(&self) -> ValidatorIndex {
        self.index
    }
}

/// Incrementally maintained stake ranking
#[derive(Debug, Clone, Default)]
pub struct StakeRanking {
    keys: BTreeSet<RankKey>,
}

impl StakeRanking {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, index: ValidatorIndex, stake: Balance) {
        self.keys.insert(RankKey::new(stake, index));
    }

    /// Move a validator from `old` to `new` stake
    pub fn update(&mut self, index: ValidatorIndex, old: Balance, new: Balance) {
        if old == new {
            return;
        }
        let removed = self.keys.remove(&RankKey::new(old, index));
        debug_assert!(removed, "ranking out of sync for validator {}", index);
        self.keys.insert(RankKey::new(new, index));
    }

    /// Up to `n` validators, best first
    pub fn top(&self, n: usize) -> impl Iterator<Item = RankKey> + '_ {
        self.keys.iter().copied().take(n)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}
