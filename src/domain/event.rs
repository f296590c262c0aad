//! Typed chain events, as delivered by an event source.

use super::primitives::raw_amount;
use super::{Address, BlockRef, RewardModuleKind, StakingModuleKind, TxHash};
use super::ordering::EventCursor;
use serde::{Deserialize, Serialize};

/// One decoded log, positioned in canonical chain order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainEvent {
    pub block: BlockRef,
    pub tx_hash: TxHash,
    pub log_index: u32,
    /// Contract that emitted the log.
    pub address: Address,
    #[serde(flatten)]
    pub kind: EventKind,
}

impl ChainEvent {
    pub fn cursor(&self) -> EventCursor {
        EventCursor::new(self.block.number, self.log_index)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// Emitted by the pool factory.
    PoolCreated {
        pool: Address,
        owner: Address,
        staking_module: Address,
        reward_module: Address,
        staking_module_kind: StakingModuleKind,
        reward_module_kind: RewardModuleKind,
        staking_tokens: Vec<Address>,
        reward_tokens: Vec<Address>,
    },
    /// Staking module events.
    Staked {
        user: Address,
        token: Address,
        #[serde(with = "raw_amount")]
        amount: u128,
        #[serde(with = "raw_amount")]
        shares: u128,
    },
    Unstaked {
        user: Address,
        token: Address,
        #[serde(with = "raw_amount")]
        amount: u128,
        #[serde(with = "raw_amount")]
        shares: u128,
    },
    Claimed {
        user: Address,
        token: Address,
        #[serde(with = "raw_amount")]
        amount: u128,
        #[serde(with = "raw_amount")]
        shares: u128,
    },
    /// Reward module events.
    RewardsFunded {
        token: Address,
        #[serde(with = "raw_amount")]
        amount: u128,
        #[serde(with = "raw_amount")]
        shares: u128,
        /// Schedule start.
        timestamp: i64,
    },
    RewardsExpired {
        token: Address,
        #[serde(with = "raw_amount")]
        amount: u128,
        #[serde(with = "raw_amount")]
        shares: u128,
        /// Start of the expired schedule.
        timestamp: i64,
    },
    RewardsWithdrawn {
        token: Address,
        #[serde(with = "raw_amount")]
        amount: u128,
        #[serde(with = "raw_amount")]
        shares: u128,
    },
    RewardsDistributed {
        user: Address,
        token: Address,
        #[serde(with = "raw_amount")]
        amount: u128,
        #[serde(with = "raw_amount")]
        shares: u128,
    },
    GysrSpent {
        user: Address,
        #[serde(with = "raw_amount")]
        amount: u128,
    },
    GysrVested {
        user: Address,
        #[serde(with = "raw_amount")]
        amount: u128,
    },
    /// Block-level tick that only drives the platform sweep.
    Heartbeat,
}

impl EventKind {
    pub fn name(&self) -> &'static str {
        match self {
            EventKind::PoolCreated { .. } => "pool_created",
            EventKind::Staked { .. } => "staked",
            EventKind::Unstaked { .. } => "unstaked",
            EventKind::Claimed { .. } => "claimed",
            EventKind::RewardsFunded { .. } => "rewards_funded",
            EventKind::RewardsExpired { .. } => "rewards_expired",
            EventKind::RewardsWithdrawn { .. } => "rewards_withdrawn",
            EventKind::RewardsDistributed { .. } => "rewards_distributed",
            EventKind::GysrSpent { .. } => "gysr_spent",
            EventKind::GysrVested { .. } => "gysr_vested",
            EventKind::Heartbeat => "heartbeat",
        }
    }
}
