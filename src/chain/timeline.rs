//! Block-keyed sequence of recorded chain states.

use super::{
    ChainError, ChainReader, ChainView, LinearModuleState, ManagedVaultState, OnChainFunding,
    OnChainLot, StaticChain, V2PairState, V3PoolState, WeightedPoolState,
};
use crate::domain::Address;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checkpoint {
    /// First block this state applies to.
    pub block: u64,
    pub state: StaticChain,
}

/// Answers reads from the latest checkpoint at or before the current block.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainTimeline {
    checkpoints: Vec<Checkpoint>,
    #[serde(skip)]
    current: Option<usize>,
}

impl ChainTimeline {
    pub fn new(mut checkpoints: Vec<Checkpoint>) -> Self {
        checkpoints.sort_by_key(|c| c.block);
        Self {
            checkpoints,
            current: None,
        }
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        let parsed: ChainTimeline = serde_json::from_str(json)?;
        Ok(Self::new(parsed.checkpoints))
    }

    pub fn len(&self) -> usize {
        self.checkpoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.checkpoints.is_empty()
    }

    fn state(&self) -> Result<&StaticChain, ChainError> {
        self.current
            .and_then(|i| self.checkpoints.get(i))
            .map(|c| &c.state)
            .ok_or_else(|| ChainError::Unavailable("no checkpoint at or before block".to_string()))
    }
}

impl ChainView for ChainTimeline {
    fn seek(&mut self, block: u64) {
        self.current = self.checkpoints.iter().rposition(|c| c.block <= block);
    }
}

impl ChainReader for ChainTimeline {
    fn erc20_decimals(&self, token: &Address) -> Result<u32, ChainError> {
        self.state()?.erc20_decimals(token)
    }

    fn erc20_symbol(&self, token: &Address) -> Result<String, ChainError> {
        self.state()?.erc20_symbol(token)
    }

    fn erc20_name(&self, token: &Address) -> Result<String, ChainError> {
        self.state()?.erc20_name(token)
    }

    fn erc20_total_supply(&self, token: &Address) -> Result<u128, ChainError> {
        self.state()?.erc20_total_supply(token)
    }

    fn erc20_balance_of(&self, token: &Address, holder: &Address) -> Result<u128, ChainError> {
        self.state()?.erc20_balance_of(token, holder)
    }

    fn v2_get_pair(
        &self,
        factory: &Address,
        a: &Address,
        b: &Address,
    ) -> Result<Option<Address>, ChainError> {
        self.state()?.v2_get_pair(factory, a, b)
    }

    fn v2_pair(&self, pair: &Address) -> Result<V2PairState, ChainError> {
        self.state()?.v2_pair(pair)
    }

    fn v3_get_pool(
        &self,
        factory: &Address,
        a: &Address,
        b: &Address,
        fee: u32,
    ) -> Result<Option<Address>, ChainError> {
        self.state()?.v3_get_pool(factory, a, b, fee)
    }

    fn v3_pool(&self, pool: &Address) -> Result<V3PoolState, ChainError> {
        self.state()?.v3_pool(pool)
    }

    fn weighted_pool(&self, pool: &Address) -> Result<WeightedPoolState, ChainError> {
        self.state()?.weighted_pool(pool)
    }

    fn managed_vault(&self, vault: &Address) -> Result<ManagedVaultState, ChainError> {
        self.state()?.managed_vault(vault)
    }

    fn module_owner(&self, module: &Address) -> Result<Address, ChainError> {
        self.state()?.module_owner(module)
    }

    fn pool_staking_balances(&self, pool: &Address) -> Result<Vec<u128>, ChainError> {
        self.state()?.pool_staking_balances(pool)
    }

    fn pool_reward_balances(&self, pool: &Address) -> Result<Vec<u128>, ChainError> {
        self.state()?.pool_reward_balances(pool)
    }

    fn pool_usage(&self, pool: &Address) -> Result<u128, ChainError> {
        self.state()?.pool_usage(pool)
    }

    fn staking_total_shares(
        &self,
        module: &Address,
        token: &Address,
    ) -> Result<u128, ChainError> {
        self.state()?.staking_total_shares(module, token)
    }

    fn reward_locked_shares(
        &self,
        module: &Address,
        token: &Address,
    ) -> Result<u128, ChainError> {
        self.state()?.reward_locked_shares(module, token)
    }

    fn reward_funding_count(
        &self,
        module: &Address,
        token: &Address,
    ) -> Result<usize, ChainError> {
        self.state()?.reward_funding_count(module, token)
    }

    fn reward_funding(
        &self,
        module: &Address,
        token: &Address,
        index: usize,
    ) -> Result<OnChainFunding, ChainError> {
        self.state()?.reward_funding(module, token, index)
    }

    fn linear_state(&self, module: &Address) -> Result<LinearModuleState, ChainError> {
        self.state()?.linear_state(module)
    }

    fn stake_count(&self, module: &Address, user: &Address) -> Result<usize, ChainError> {
        self.state()?.stake_count(module, user)
    }

    fn stake_at(
        &self,
        module: &Address,
        user: &Address,
        index: usize,
    ) -> Result<OnChainLot, ChainError> {
        self.state()?.stake_at(module, user, index)
    }

    fn position_shares(&self, module: &Address, user: &Address) -> Result<u128, ChainError> {
        self.state()?.position_shares(module, user)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn timeline() -> ChainTimeline {
        ChainTimeline::new(vec![
            Checkpoint {
                block: 20,
                state: StaticChain::new().with_token("0xaa", "AA", 8),
            },
            Checkpoint {
                block: 10,
                state: StaticChain::new().with_token("0xaa", "AA", 6),
            },
        ])
    }

    #[test]
    fn test_seek_selects_latest_checkpoint() {
        let mut chain = timeline();
        let token = Address::new("0xaa");

        chain.seek(5);
        assert!(matches!(
            chain.erc20_decimals(&token),
            Err(ChainError::Unavailable(_))
        ));

        chain.seek(10);
        assert_eq!(chain.erc20_decimals(&token), Ok(6));
        chain.seek(19);
        assert_eq!(chain.erc20_decimals(&token), Ok(6));
        chain.seek(25);
        assert_eq!(chain.erc20_decimals(&token), Ok(8));
    }

    #[test]
    fn test_from_json() {
        let json = serde_json::to_string(&timeline()).unwrap();
        let mut parsed = ChainTimeline::from_json(&json).unwrap();
        assert_eq!(parsed.len(), 2);
        parsed.seek(30);
        assert_eq!(parsed.erc20_decimals(&Address::new("0xaa")), Ok(8));
    }
}
