//! Pool records: the pool itself, its per-token join records and funding schedules.

use super::{Address, Decimal, Timestamp};
use serde::{Deserialize, Serialize};

/// Lifecycle classification of a pool's reward emission.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PoolState {
    /// Never funded.
    #[default]
    Unfunded,
    /// A funding schedule starts soon.
    Boiling,
    /// Emitting rewards now.
    Active,
    /// Funded in the past, nothing emitting or upcoming.
    Stale,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StakingModuleKind {
    #[default]
    Erc20,
    Erc721,
}

/// Reward-module shape. Each has its own accounting, see `engine::modules`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RewardModuleKind {
    /// Time-bonus vesting over competing funding schedules.
    #[default]
    Competitive,
    /// Vesting where stakers do not dilute each other's earned rewards.
    Vesting,
    /// Flat per-share emission rate drawn from a single budget.
    Linear,
    /// Several reward tokens, each with its own schedules.
    Multi,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Pool {
    pub id: Address,
    pub owner: Address,
    pub staking_module: Address,
    pub reward_module: Address,
    pub staking_module_kind: StakingModuleKind,
    pub reward_module_kind: RewardModuleKind,
    /// PoolStakingToken ids, in on-chain order.
    pub staking_tokens: Vec<String>,
    /// PoolRewardToken ids, in on-chain order.
    pub reward_tokens: Vec<String>,
    pub fundings: Vec<String>,

    pub staked: Decimal,
    pub rewards: Decimal,
    pub funded: Decimal,
    pub distributed: Decimal,
    pub gysr_spent: Decimal,
    pub gysr_vested: Decimal,
    pub volume: Decimal,

    pub staked_usd: Decimal,
    pub rewards_usd: Decimal,
    pub tvl: Decimal,
    pub apr: Decimal,
    pub usage: Decimal,
    pub state: PoolState,
    pub start: Timestamp,
    pub end: Timestamp,
    pub shares_per_second: Decimal,
    pub staking_shares_per_token: Decimal,
    pub reward_shares_per_token: Decimal,

    pub users: u64,
    pub operations: u64,
    pub created_block: u64,
    pub created: Timestamp,
    pub updated: Timestamp,
}

impl Pool {
    pub fn new(id: Address, owner: Address, created_block: u64, created: Timestamp) -> Self {
        Self {
            id,
            owner,
            staking_module: Address::default(),
            reward_module: Address::default(),
            staking_module_kind: StakingModuleKind::default(),
            reward_module_kind: RewardModuleKind::default(),
            staking_tokens: Vec::new(),
            reward_tokens: Vec::new(),
            fundings: Vec::new(),
            staked: Decimal::zero(),
            rewards: Decimal::zero(),
            funded: Decimal::zero(),
            distributed: Decimal::zero(),
            gysr_spent: Decimal::zero(),
            gysr_vested: Decimal::zero(),
            volume: Decimal::zero(),
            staked_usd: Decimal::zero(),
            rewards_usd: Decimal::zero(),
            tvl: Decimal::zero(),
            apr: Decimal::zero(),
            usage: Decimal::zero(),
            state: PoolState::Unfunded,
            start: Timestamp::default(),
            end: Timestamp::default(),
            shares_per_second: Decimal::zero(),
            staking_shares_per_token: Decimal::zero(),
            reward_shares_per_token: Decimal::zero(),
            users: 0,
            operations: 0,
            created_block,
            created,
            updated: created,
        }
    }

    /// Extend the pool's emission window to cover a new funding.
    pub fn widen_window(&mut self, start: Timestamp, end: Timestamp) {
        if self.start.as_secs() == 0 || start < self.start {
            self.start = start;
        }
        if end > self.end {
            self.end = end;
        }
    }
}

/// Join id shared by staking and reward token records.
pub fn pool_token_id(pool: &Address, token: &Address) -> String {
    format!("{}_{}", pool, token)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolStakingToken {
    pub id: String,
    pub pool: Address,
    pub token: Address,
    pub amount: Decimal,
    pub shares_per_token: Decimal,
}

impl PoolStakingToken {
    pub fn new(pool: &Address, token: &Address) -> Self {
        Self {
            id: pool_token_id(pool, token),
            pool: pool.clone(),
            token: token.clone(),
            amount: Decimal::zero(),
            shares_per_token: Decimal::zero(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolRewardToken {
    pub id: String,
    pub pool: Address,
    pub token: Address,
    pub amount: Decimal,
    pub shares_per_token: Decimal,
    pub funded: Decimal,
    pub distributed: Decimal,
    pub withdrawn: Decimal,
    pub shares_per_second: Decimal,
    pub state: PoolState,
}

impl PoolRewardToken {
    pub fn new(pool: &Address, token: &Address) -> Self {
        Self {
            id: pool_token_id(pool, token),
            pool: pool.clone(),
            token: token.clone(),
            amount: Decimal::zero(),
            shares_per_token: Decimal::zero(),
            funded: Decimal::zero(),
            distributed: Decimal::zero(),
            withdrawn: Decimal::zero(),
            shares_per_second: Decimal::zero(),
            state: PoolState::Unfunded,
        }
    }
}

/// One discrete reward-emission schedule.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Funding {
    pub id: String,
    pub pool: Address,
    pub token: Address,
    pub created: Timestamp,
    pub start: Timestamp,
    pub end: Timestamp,
    pub original_amount: Decimal,
    pub shares: Decimal,
    pub shares_per_second: Decimal,
    pub cleaned: bool,
}

impl Funding {
    /// Funding ids are unique per log, even for two fundings in one block.
    pub fn id_for(pool: &Address, created: Timestamp, log_index: u32) -> String {
        format!("{}_{}_{}", pool, created, log_index)
    }

    /// Half-open `[start, end)` containment.
    pub fn is_active_at(&self, now: Timestamp) -> bool {
        self.start <= now && now < self.end
    }
}
