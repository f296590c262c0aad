//! Read-only call interface into on-chain contracts at the current block.
//!
//! Every read returns `Result<T, ChainError>`. Callers pick the style:
//! - `.probe(..)` for reads expected to plausibly fail (optional token
//!   metadata, venue-type probing); failure becomes `None` and a documented
//!   default is used
//! - `?` for reads whose success is guaranteed by the triggering event; the
//!   error aborts the whole event step

use crate::domain::Address;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use crate::domain::primitives::{raw_amount, raw_word};
use ethnum::U256;

pub mod fixture;
pub mod timeline;

pub use fixture::StaticChain;
pub use timeline::ChainTimeline;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("call {call} reverted on {contract}")]
    Reverted { contract: Address, call: &'static str },
    #[error("chain state unavailable: {0}")]
    Unavailable(String),
}

impl ChainError {
    pub fn reverted(contract: &Address, call: &'static str) -> Self {
        ChainError::Reverted {
            contract: contract.clone(),
            call,
        }
    }
}

/// Explicit-failure call style.
pub trait CallResultExt<T> {
    /// Convert a failed read into `None`, logging it at debug level.
    fn probe(self, call: &str) -> Option<T>;
}

impl<T> CallResultExt<T> for Result<T, ChainError> {
    fn probe(self, call: &str) -> Option<T> {
        match self {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(call, error = %err, "optional call failed");
                None
            }
        }
    }
}

/// Constant-product pair state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V2PairState {
    pub factory: Address,
    pub token0: Address,
    pub token1: Address,
    #[serde(with = "raw_amount")]
    pub reserve0: u128,
    #[serde(with = "raw_amount")]
    pub reserve1: u128,
}

/// Concentrated-liquidity pool state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct V3PoolState {
    pub factory: Address,
    pub token0: Address,
    pub token1: Address,
    pub fee: u32,
    /// Q64.96 square root of token1/token0, a uint160 on chain.
    #[serde(with = "raw_word")]
    pub sqrt_price_x96: U256,
}

/// Weighted pool state. Weights are 1e18-scaled fractions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeightedPoolState {
    pub tokens: Vec<Address>,
    #[serde(with = "raw_amount::vec")]
    pub balances: Vec<u128>,
    #[serde(with = "raw_amount::vec")]
    pub weights: Vec<u128>,
}

/// Managed two-asset vault holdings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedVaultState {
    pub token0: Address,
    pub token1: Address,
    #[serde(with = "raw_amount")]
    pub amount0: u128,
    #[serde(with = "raw_amount")]
    pub amount1: u128,
}

/// One funding entry as tracked by a reward module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainFunding {
    #[serde(with = "raw_amount")]
    pub amount: u128,
    #[serde(with = "raw_amount")]
    pub shares: u128,
    pub start: i64,
    pub duration: i64,
}

/// One stake lot as tracked by a reward module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainLot {
    #[serde(with = "raw_amount")]
    pub shares: u128,
    pub timestamp: i64,
}

/// Accounting of a flat linear emission module.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinearModuleState {
    #[serde(with = "raw_amount")]
    pub staking_shares: u128,
    #[serde(with = "raw_amount")]
    pub reward_shares: u128,
    #[serde(with = "raw_amount")]
    pub earned: u128,
    /// Reward shares per second per staking share, 1e18-scaled.
    #[serde(with = "raw_amount")]
    pub rate: u128,
}

pub trait ChainReader {
    // ERC20
    fn erc20_decimals(&self, token: &Address) -> Result<u32, ChainError>;
    fn erc20_symbol(&self, token: &Address) -> Result<String, ChainError>;
    fn erc20_name(&self, token: &Address) -> Result<String, ChainError>;
    fn erc20_total_supply(&self, token: &Address) -> Result<u128, ChainError>;
    fn erc20_balance_of(&self, token: &Address, holder: &Address) -> Result<u128, ChainError>;

    // Exchange venues
    fn v2_get_pair(
        &self,
        factory: &Address,
        a: &Address,
        b: &Address,
    ) -> Result<Option<Address>, ChainError>;
    fn v2_pair(&self, pair: &Address) -> Result<V2PairState, ChainError>;
    fn v3_get_pool(
        &self,
        factory: &Address,
        a: &Address,
        b: &Address,
        fee: u32,
    ) -> Result<Option<Address>, ChainError>;
    fn v3_pool(&self, pool: &Address) -> Result<V3PoolState, ChainError>;
    fn weighted_pool(&self, pool: &Address) -> Result<WeightedPoolState, ChainError>;
    fn managed_vault(&self, vault: &Address) -> Result<ManagedVaultState, ChainError>;

    // Pools and modules
    fn module_owner(&self, module: &Address) -> Result<Address, ChainError>;
    fn pool_staking_balances(&self, pool: &Address) -> Result<Vec<u128>, ChainError>;
    fn pool_reward_balances(&self, pool: &Address) -> Result<Vec<u128>, ChainError>;
    /// 1e18-scaled usage ratio.
    fn pool_usage(&self, pool: &Address) -> Result<u128, ChainError>;
    fn staking_total_shares(&self, module: &Address, token: &Address)
        -> Result<u128, ChainError>;
    fn reward_locked_shares(&self, module: &Address, token: &Address)
        -> Result<u128, ChainError>;
    fn reward_funding_count(&self, module: &Address, token: &Address)
        -> Result<usize, ChainError>;
    fn reward_funding(
        &self,
        module: &Address,
        token: &Address,
        index: usize,
    ) -> Result<OnChainFunding, ChainError>;
    fn linear_state(&self, module: &Address) -> Result<LinearModuleState, ChainError>;
    fn stake_count(&self, module: &Address, user: &Address) -> Result<usize, ChainError>;
    fn stake_at(
        &self,
        module: &Address,
        user: &Address,
        index: usize,
    ) -> Result<OnChainLot, ChainError>;
    /// Aggregate position shares, for modules that track them directly.
    fn position_shares(&self, module: &Address, user: &Address) -> Result<u128, ChainError>;
}

/// A reader that can be positioned at a block before reads are made.
pub trait ChainView: ChainReader {
    fn seek(&mut self, block: u64);
}
