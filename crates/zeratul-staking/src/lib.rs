//! Validator staking registry
//!
//! Validators register with a self-stake and a commission rate. Delegators
//! buy stock in a validator's stake pool and sell it back through a
//! two-phase withdrawal. The best-staked validators feed block production.
//!
//! ## Architecture
//!
//! ```text
//!            StakingService (facade, RwLock)
//!                      │
//!                      ▼
//!   ValidatorRegistry ──────────► StakeRanking
//!   (config, aggregate stake)     (stake desc, registration asc)
//!                      │
//!                      ▼
//!        StakingLedger (one per validator)
//!        stake ↔ stock, pending refunds
//! ```
//!
//! ## Withdrawal
//!
//! - `sell_stocks` burns stock and moves the released stake into a pending
//!   refund; nothing leaves the system yet
//! - `refund` zeroes the pending refund, then pays it through [`Payout`]

pub mod types;
pub mod error;
pub mod config;
pub mod ledger;
pub mod ranking;
pub mod registry;
pub mod payout;
pub mod service;
pub mod store;

pub use types::{Address, AddressError, Balance, ValidatorIndex, MAX_RATE};
pub use error::{Result, StakingError, StoreError};
pub use config::{Config, DEFAULT_MAX_CANDIDATES};
pub use ledger::StakingLedger;
pub use ranking::{RankKey, StakeRanking};
pub use registry::{RegistrySnapshot, ValidatorRegistry};
pub use payout::{BalanceBook, Payout, PayoutError};
pub use service::{LedgerInfo, StakingService};
pub use store::SnapshotStore;
