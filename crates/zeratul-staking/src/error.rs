use crate::types::{Address, Balance};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StakingError {
    #[error("registry already initialized")]
    AlreadyInitialized,

    #[error("registry not initialized")]
    NotInitialized,

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("validator already registered: {0}")]
    DuplicateValidator(Address),

    #[error("unknown validator: {0}")]
    UnknownValidator(Address),

    #[error("validator cannot be its own manager")]
    SelfManagerForbidden,

    #[error("insufficient self-stake: {provided} < {required} required")]
    InsufficientSelfStake { required: Balance, provided: Balance },

    #[error("invalid commission rate: {0} > 100")]
    InvalidRate(u8),

    #[error("registry full ({0} candidates)")]
    RegistryFull(u32),

    #[error("amount must be non-zero")]
    ZeroAmount,

    #[error("insufficient shares: held {held}, requested {requested}")]
    InsufficientShares { held: Balance, requested: Balance },

    #[error("nothing to claim")]
    NothingToClaim,

    #[error("count must be positive")]
    InvalidCount,

    #[error("null address")]
    NullAddress,

    #[error("caller is not the validator manager")]
    NotManager,

    #[error("arithmetic overflow")]
    Overflow,

    #[error("payout failed: {0}")]
    PayoutFailed(String),
}

pub type Result<T> = std::result::Result<T, StakingError>;

/// Snapshot storage errors
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("storage error: {0}")]
    Storage(#[from] sled::Error),

    #[error("serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("snapshot checksum mismatch")]
    Corrupted,

    #[error("inconsistent snapshot: {0}")]
    Inconsistent(String),
}
