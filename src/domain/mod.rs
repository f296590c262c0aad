//! Domain types and determinism layer for the staking-pool indexer.
//!
//! This module provides:
//! - Lossless numeric handling via Decimal wrapper
//! - Domain primitives: Address, TxHash, Timestamp, BlockRef
//! - Materialized records: tokens, pools, fundings, positions, platform
//! - Typed chain events and their canonical ordering

pub mod activity;
pub mod decimal;
pub mod event;
pub mod ordering;
pub mod platform;
pub mod pool;
pub mod position;
pub mod primitives;
pub mod token;

pub use activity::{PoolDayData, Transaction, TransactionKind, User};
pub use decimal::Decimal;
pub use event::{ChainEvent, EventKind};
pub use ordering::{sort_events_canonical, EventCursor};
pub use platform::Platform;
pub use pool::{
    pool_token_id, Funding, Pool, PoolRewardToken, PoolStakingToken, PoolState,
    RewardModuleKind, StakingModuleKind,
};
pub use position::{Position, Stake};
pub use primitives::{Address, BlockRef, Timestamp, TxHash};
pub use token::{Token, TokenKind};
