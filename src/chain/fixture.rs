//! Recorded chain state, for replay and tests.

use super::{
    ChainError, ChainReader, ChainView, LinearModuleState, ManagedVaultState, OnChainFunding,
    OnChainLot, V2PairState, V3PoolState, WeightedPoolState,
};
use crate::domain::primitives::raw_amount;
use crate::domain::Address;
use ethnum::U256;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawAmount(#[serde(with = "raw_amount")] pub u128);

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Erc20State {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub symbol: Option<String>,
    #[serde(default)]
    pub decimals: Option<u32>,
    #[serde(default)]
    pub total_supply: RawAmount,
    #[serde(default)]
    pub balances: BTreeMap<Address, RawAmount>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolContractState {
    #[serde(with = "raw_amount::vec")]
    pub staking_balances: Vec<u128>,
    #[serde(with = "raw_amount::vec")]
    pub reward_balances: Vec<u128>,
    #[serde(default)]
    pub usage: RawAmount,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RewardModuleState {
    #[serde(default)]
    pub locked_shares: BTreeMap<Address, RawAmount>,
    #[serde(default)]
    pub fundings: BTreeMap<Address, Vec<OnChainFunding>>,
    #[serde(default)]
    pub linear: Option<LinearModuleState>,
    #[serde(default)]
    pub lots: BTreeMap<Address, Vec<OnChainLot>>,
    #[serde(default)]
    pub position_shares: BTreeMap<Address, RawAmount>,
}

/// In-memory contract state answering [`ChainReader`] calls.
///
/// Reads against contracts that are not recorded revert, which is how
/// probes for venue types and optional metadata fail.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticChain {
    pub tokens: BTreeMap<Address, Erc20State>,
    pub v2_pairs: BTreeMap<Address, V2PairState>,
    pub v3_pools: BTreeMap<Address, V3PoolState>,
    pub weighted_pools: BTreeMap<Address, WeightedPoolState>,
    pub managed_vaults: BTreeMap<Address, ManagedVaultState>,
    pub owners: BTreeMap<Address, Address>,
    pub pools: BTreeMap<Address, PoolContractState>,
    pub staking_modules: BTreeMap<Address, BTreeMap<Address, RawAmount>>,
    pub reward_modules: BTreeMap<Address, RewardModuleState>,
}

impl StaticChain {
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Builders
    // =========================================================================

    pub fn with_token(mut self, token: &str, symbol: &str, decimals: u32) -> Self {
        self.set_token(token, symbol, decimals);
        self
    }

    pub fn with_v2_pair(
        mut self,
        factory: &str,
        pair: &str,
        token0: &str,
        token1: &str,
        reserve0: u128,
        reserve1: u128,
    ) -> Self {
        self.set_v2_pair(factory, pair, token0, token1, reserve0, reserve1);
        self
    }

    pub fn with_v3_pool(
        mut self,
        factory: &str,
        pool: &str,
        token0: &str,
        token1: &str,
        fee: u32,
        sqrt_price_x96: impl Into<U256>,
    ) -> Self {
        self.v3_pools.insert(
            Address::new(pool),
            V3PoolState {
                factory: Address::new(factory),
                token0: Address::new(token0),
                token1: Address::new(token1),
                fee,
                sqrt_price_x96: sqrt_price_x96.into(),
            },
        );
        self
    }

    pub fn with_weighted_pool(
        mut self,
        pool: &str,
        tokens: &[&str],
        balances: &[u128],
        weights: &[u128],
    ) -> Self {
        self.weighted_pools.insert(
            Address::new(pool),
            WeightedPoolState {
                tokens: tokens.iter().map(|t| Address::new(*t)).collect(),
                balances: balances.to_vec(),
                weights: weights.to_vec(),
            },
        );
        self
    }

    pub fn with_managed_vault(
        mut self,
        vault: &str,
        token0: &str,
        token1: &str,
        amount0: u128,
        amount1: u128,
    ) -> Self {
        self.managed_vaults.insert(
            Address::new(vault),
            ManagedVaultState {
                token0: Address::new(token0),
                token1: Address::new(token1),
                amount0,
                amount1,
            },
        );
        self
    }

    pub fn with_total_supply(mut self, token: &str, supply: u128) -> Self {
        self.token_mut(token).total_supply = RawAmount(supply);
        self
    }

    pub fn with_balance(mut self, token: &str, holder: &str, amount: u128) -> Self {
        self.set_balance(token, holder, amount);
        self
    }

    pub fn with_owner(mut self, module: &str, owner: &str) -> Self {
        self.owners.insert(Address::new(module), Address::new(owner));
        self
    }

    pub fn with_pool_balances(mut self, pool: &str, staking: &[u128], rewards: &[u128]) -> Self {
        self.set_pool_balances(pool, staking, rewards);
        self
    }

    // =========================================================================
    // Mutators
    // =========================================================================

    fn token_mut(&mut self, token: &str) -> &mut Erc20State {
        self.tokens.entry(Address::new(token)).or_default()
    }

    fn reward_module_mut(&mut self, module: &str) -> &mut RewardModuleState {
        self.reward_modules.entry(Address::new(module)).or_default()
    }

    pub fn set_token(&mut self, token: &str, symbol: &str, decimals: u32) {
        let state = self.token_mut(token);
        state.symbol = Some(symbol.to_string());
        state.name = Some(symbol.to_string());
        state.decimals = Some(decimals);
    }

    pub fn set_balance(&mut self, token: &str, holder: &str, amount: u128) {
        self.token_mut(token)
            .balances
            .insert(Address::new(holder), RawAmount(amount));
    }

    pub fn set_v2_pair(
        &mut self,
        factory: &str,
        pair: &str,
        token0: &str,
        token1: &str,
        reserve0: u128,
        reserve1: u128,
    ) {
        self.v2_pairs.insert(
            Address::new(pair),
            V2PairState {
                factory: Address::new(factory),
                token0: Address::new(token0),
                token1: Address::new(token1),
                reserve0,
                reserve1,
            },
        );
    }

    pub fn set_pool_balances(&mut self, pool: &str, staking: &[u128], rewards: &[u128]) {
        let state = self.pools.entry(Address::new(pool)).or_default();
        state.staking_balances = staking.to_vec();
        state.reward_balances = rewards.to_vec();
    }

    pub fn set_pool_usage(&mut self, pool: &str, usage: u128) {
        self.pools.entry(Address::new(pool)).or_default().usage = RawAmount(usage);
    }

    pub fn set_staking_shares(&mut self, module: &str, token: &str, shares: u128) {
        self.staking_modules
            .entry(Address::new(module))
            .or_default()
            .insert(Address::new(token), RawAmount(shares));
    }

    pub fn set_locked_shares(&mut self, module: &str, token: &str, shares: u128) {
        self.reward_module_mut(module)
            .locked_shares
            .insert(Address::new(token), RawAmount(shares));
    }

    pub fn push_funding(&mut self, module: &str, token: &str, funding: OnChainFunding) {
        self.reward_module_mut(module)
            .fundings
            .entry(Address::new(token))
            .or_default()
            .push(funding);
    }

    pub fn set_linear_state(&mut self, module: &str, state: LinearModuleState) {
        self.reward_module_mut(module).linear = Some(state);
    }

    pub fn set_lots(&mut self, module: &str, user: &str, lots: Vec<OnChainLot>) {
        self.reward_module_mut(module)
            .lots
            .insert(Address::new(user), lots);
    }

    pub fn lots(&self, module: &str, user: &str) -> Vec<OnChainLot> {
        self.reward_modules
            .get(&Address::new(module))
            .and_then(|m| m.lots.get(&Address::new(user)))
            .cloned()
            .unwrap_or_default()
    }

    pub fn set_position_shares(&mut self, module: &str, user: &str, shares: u128) {
        self.reward_module_mut(module)
            .position_shares
            .insert(Address::new(user), RawAmount(shares));
    }

    fn reward_module(&self, module: &Address, call: &'static str) -> Result<&RewardModuleState, ChainError> {
        self.reward_modules
            .get(module)
            .ok_or_else(|| ChainError::reverted(module, call))
    }

    fn token(&self, token: &Address, call: &'static str) -> Result<&Erc20State, ChainError> {
        self.tokens
            .get(token)
            .ok_or_else(|| ChainError::reverted(token, call))
    }
}

fn same_pair(x0: &Address, x1: &Address, a: &Address, b: &Address) -> bool {
    (x0 == a && x1 == b) || (x0 == b && x1 == a)
}

impl ChainReader for StaticChain {
    fn erc20_decimals(&self, token: &Address) -> Result<u32, ChainError> {
        self.token(token, "decimals")?
            .decimals
            .ok_or_else(|| ChainError::reverted(token, "decimals"))
    }

    fn erc20_symbol(&self, token: &Address) -> Result<String, ChainError> {
        self.token(token, "symbol")?
            .symbol
            .clone()
            .ok_or_else(|| ChainError::reverted(token, "symbol"))
    }

    fn erc20_name(&self, token: &Address) -> Result<String, ChainError> {
        self.token(token, "name")?
            .name
            .clone()
            .ok_or_else(|| ChainError::reverted(token, "name"))
    }

    fn erc20_total_supply(&self, token: &Address) -> Result<u128, ChainError> {
        Ok(self.token(token, "totalSupply")?.total_supply.0)
    }

    fn erc20_balance_of(&self, token: &Address, holder: &Address) -> Result<u128, ChainError> {
        Ok(self
            .token(token, "balanceOf")?
            .balances
            .get(holder)
            .map(|b| b.0)
            .unwrap_or(0))
    }

    fn v2_get_pair(
        &self,
        factory: &Address,
        a: &Address,
        b: &Address,
    ) -> Result<Option<Address>, ChainError> {
        Ok(self
            .v2_pairs
            .iter()
            .find(|(_, p)| &p.factory == factory && same_pair(&p.token0, &p.token1, a, b))
            .map(|(addr, _)| addr.clone()))
    }

    fn v2_pair(&self, pair: &Address) -> Result<V2PairState, ChainError> {
        self.v2_pairs
            .get(pair)
            .cloned()
            .ok_or_else(|| ChainError::reverted(pair, "getReserves"))
    }

    fn v3_get_pool(
        &self,
        factory: &Address,
        a: &Address,
        b: &Address,
        fee: u32,
    ) -> Result<Option<Address>, ChainError> {
        Ok(self
            .v3_pools
            .iter()
            .find(|(_, p)| {
                &p.factory == factory && p.fee == fee && same_pair(&p.token0, &p.token1, a, b)
            })
            .map(|(addr, _)| addr.clone()))
    }

    fn v3_pool(&self, pool: &Address) -> Result<V3PoolState, ChainError> {
        self.v3_pools
            .get(pool)
            .cloned()
            .ok_or_else(|| ChainError::reverted(pool, "slot0"))
    }

    fn weighted_pool(&self, pool: &Address) -> Result<WeightedPoolState, ChainError> {
        self.weighted_pools
            .get(pool)
            .cloned()
            .ok_or_else(|| ChainError::reverted(pool, "getNormalizedWeights"))
    }

    fn managed_vault(&self, vault: &Address) -> Result<ManagedVaultState, ChainError> {
        self.managed_vaults
            .get(vault)
            .cloned()
            .ok_or_else(|| ChainError::reverted(vault, "getUnderlyingBalances"))
    }

    fn module_owner(&self, module: &Address) -> Result<Address, ChainError> {
        self.owners
            .get(module)
            .cloned()
            .ok_or_else(|| ChainError::reverted(module, "owner"))
    }

    fn pool_staking_balances(&self, pool: &Address) -> Result<Vec<u128>, ChainError> {
        self.pools
            .get(pool)
            .map(|p| p.staking_balances.clone())
            .ok_or_else(|| ChainError::reverted(pool, "stakingBalances"))
    }

    fn pool_reward_balances(&self, pool: &Address) -> Result<Vec<u128>, ChainError> {
        self.pools
            .get(pool)
            .map(|p| p.reward_balances.clone())
            .ok_or_else(|| ChainError::reverted(pool, "rewardBalances"))
    }

    fn pool_usage(&self, pool: &Address) -> Result<u128, ChainError> {
        self.pools
            .get(pool)
            .map(|p| p.usage.0)
            .ok_or_else(|| ChainError::reverted(pool, "usage"))
    }

    fn staking_total_shares(
        &self,
        module: &Address,
        token: &Address,
    ) -> Result<u128, ChainError> {
        self.staking_modules
            .get(module)
            .map(|m| m.get(token).map(|s| s.0).unwrap_or(0))
            .ok_or_else(|| ChainError::reverted(module, "totalShares"))
    }

    fn reward_locked_shares(
        &self,
        module: &Address,
        token: &Address,
    ) -> Result<u128, ChainError> {
        Ok(self
            .reward_module(module, "lockedShares")?
            .locked_shares
            .get(token)
            .map(|s| s.0)
            .unwrap_or(0))
    }

    fn reward_funding_count(
        &self,
        module: &Address,
        token: &Address,
    ) -> Result<usize, ChainError> {
        Ok(self
            .reward_module(module, "fundingCount")?
            .fundings
            .get(token)
            .map(|f| f.len())
            .unwrap_or(0))
    }

    fn reward_funding(
        &self,
        module: &Address,
        token: &Address,
        index: usize,
    ) -> Result<OnChainFunding, ChainError> {
        self.reward_module(module, "fundings")?
            .fundings
            .get(token)
            .and_then(|f| f.get(index))
            .copied()
            .ok_or_else(|| ChainError::reverted(module, "fundings"))
    }

    fn linear_state(&self, module: &Address) -> Result<LinearModuleState, ChainError> {
        self.reward_module(module, "linearState")?
            .linear
            .ok_or_else(|| ChainError::reverted(module, "linearState"))
    }

    fn stake_count(&self, module: &Address, user: &Address) -> Result<usize, ChainError> {
        Ok(self
            .reward_module(module, "stakeCount")?
            .lots
            .get(user)
            .map(|l| l.len())
            .unwrap_or(0))
    }

    fn stake_at(
        &self,
        module: &Address,
        user: &Address,
        index: usize,
    ) -> Result<OnChainLot, ChainError> {
        self.reward_module(module, "stakes")?
            .lots
            .get(user)
            .and_then(|l| l.get(index))
            .copied()
            .ok_or_else(|| ChainError::reverted(module, "stakes"))
    }

    fn position_shares(&self, module: &Address, user: &Address) -> Result<u128, ChainError> {
        Ok(self
            .reward_module(module, "positions")?
            .position_shares
            .get(user)
            .map(|s| s.0)
            .unwrap_or(0))
    }
}

impl ChainView for StaticChain {
    fn seek(&mut self, _block: u64) {}
}
