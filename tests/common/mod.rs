//! Shared fixtures: a priced token set, one pool and a scripted event log
//! that records the chain state each event sees.

#![allow(dead_code)]

use stakeledger::chain::timeline::Checkpoint;
use stakeledger::chain::{OnChainFunding, OnChainLot};
use stakeledger::config::{BaseAsset, Deployment, StableAsset};
use stakeledger::domain::{
    Address, BlockRef, ChainEvent, EventKind, RewardModuleKind, StakingModuleKind, TxHash,
};
use stakeledger::{dispatch, ChainTimeline, MemoryStore, StaticChain};
use std::collections::BTreeMap;

pub const USDC: &str = "0xusdc";
pub const WETH: &str = "0xweth";
pub const REF_PAIR: &str = "0xrefpair";
pub const FACTORY_A: &str = "0xfactorya";
pub const FACTORY_B: &str = "0xfactoryb";

pub const POOL_FACTORY: &str = "0xpoolfactory";
pub const POOL: &str = "0xpool";
pub const OWNER: &str = "0xowner";
pub const STAKING_MODULE: &str = "0xstakingmodule";
pub const REWARD_MODULE: &str = "0xrewardmodule";
/// 18 decimals, 30 USD through a USDC pair.
pub const REWARD_TOKEN: &str = "0xrwd";
pub const REWARD_PAIR: &str = "0xrwdusdc";

pub const POOL2: &str = "0xpool2";
pub const STAKING_MODULE2: &str = "0xstakingmodule2";
pub const REWARD_MODULE2: &str = "0xrewardmodule2";

pub const T0: i64 = 1_700_000_000;

pub fn e18(n: u128) -> u128 {
    n * 1_000_000_000_000_000_000
}

pub fn e6(n: u128) -> u128 {
    n * 1_000_000
}

pub fn deployment() -> Deployment {
    let mut deployment = Deployment::mainnet();
    deployment.stablecoins = vec![StableAsset {
        address: Address::new(USDC),
        decimals: 6,
    }];
    deployment.base_assets = vec![BaseAsset {
        address: Address::new(WETH),
        reference_pair: Address::new(REF_PAIR),
    }];
    deployment.high_volume_tokens = vec![];
    deployment.v2_factories = vec![Address::new(FACTORY_A), Address::new(FACTORY_B)];
    deployment.v3 = None;
    deployment
}

/// USDC, WETH at 2000 USD, and the reward token at 30 USD.
pub fn priced_chain() -> StaticChain {
    StaticChain::new()
        .with_token(USDC, "USDC", 6)
        .with_token(WETH, "WETH", 18)
        .with_token(REWARD_TOKEN, "RWD", 18)
        .with_v2_pair(FACTORY_A, REF_PAIR, USDC, WETH, e6(20_000_000), e18(10_000))
        .with_v2_pair(FACTORY_A, REWARD_PAIR, REWARD_TOKEN, USDC, e18(1_000), e6(30_000))
}

/// Addresses of one pool and its two modules.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolIds {
    pub pool: &'static str,
    pub staking_module: &'static str,
    pub reward_module: &'static str,
}

pub const MAIN: PoolIds = PoolIds {
    pool: POOL,
    staking_module: STAKING_MODULE,
    reward_module: REWARD_MODULE,
};

pub const SECOND: PoolIds = PoolIds {
    pool: POOL2,
    staking_module: STAKING_MODULE2,
    reward_module: REWARD_MODULE2,
};

/// Register an empty pool whose modules answer `owner()`.
pub fn with_pool(chain: StaticChain, ids: PoolIds) -> StaticChain {
    let mut chain = chain
        .with_owner(ids.staking_module, ids.pool)
        .with_owner(ids.reward_module, ids.pool)
        .with_pool_balances(ids.pool, &[0], &[0]);
    chain.set_staking_shares(ids.staking_module, USDC, 0);
    chain.set_locked_shares(ids.reward_module, REWARD_TOKEN, 0);
    chain
}

/// Priced tokens plus the main pool.
pub fn pool_chain() -> StaticChain {
    with_pool(priced_chain(), MAIN)
}

/// Priced tokens plus two pools sharing the reward token.
pub fn two_pool_chain() -> StaticChain {
    with_pool(pool_chain(), SECOND)
}

pub fn event(block: u64, tx: &str, address: &str, kind: EventKind) -> ChainEvent {
    ChainEvent {
        block: BlockRef::new(block, T0 + block as i64 * 12),
        tx_hash: TxHash::new(tx),
        log_index: 0,
        address: Address::new(address),
        kind,
    }
}

/// Bootstrap ratio applied to staked amounts.
pub fn stake_shares(amount: u128) -> u128 {
    amount * 1_000_000
}

/// Event log paired with the chain state at each event's block.
pub struct Script {
    pub chain: StaticChain,
    pub events: Vec<ChainEvent>,
    checkpoints: Vec<Checkpoint>,
    block: u64,
    /// Seconds added to every timestamp on top of the block clock.
    skew: i64,
    /// Whole USDC staked, per pool.
    staked: BTreeMap<&'static str, u128>,
}

impl Script {
    pub fn new(chain: StaticChain) -> Self {
        Self {
            chain,
            events: Vec::new(),
            checkpoints: Vec::new(),
            block: 0,
            skew: 0,
            staked: BTreeMap::new(),
        }
    }

    /// Record `kind` at the next block against the current chain state.
    pub fn push(&mut self, tx: &str, address: &str, kind: EventKind) -> ChainEvent {
        self.block += 1;
        let mut event = event(self.block, tx, address, kind);
        event.block.timestamp = event.block.timestamp.saturating_add(self.skew);
        self.checkpoints.push(Checkpoint {
            block: self.block,
            state: self.chain.clone(),
        });
        self.events.push(event.clone());
        event
    }

    pub fn now(&self) -> i64 {
        T0 + (self.block as i64 + 1) * 12 + self.skew
    }

    /// Move the clock forward without producing a block.
    pub fn advance(&mut self, secs: i64) {
        self.skew += secs;
    }

    pub fn create_pool(&mut self, kind: RewardModuleKind) -> ChainEvent {
        self.create_pool_on(MAIN, kind)
    }

    pub fn create_pool_on(&mut self, ids: PoolIds, kind: RewardModuleKind) -> ChainEvent {
        let tx = format!("0xcreate{}", ids.pool);
        self.push(
            &tx,
            POOL_FACTORY,
            EventKind::PoolCreated {
                pool: Address::new(ids.pool),
                owner: Address::new(OWNER),
                staking_module: Address::new(ids.staking_module),
                reward_module: Address::new(ids.reward_module),
                staking_module_kind: StakingModuleKind::Erc20,
                reward_module_kind: kind,
                staking_tokens: vec![Address::new(USDC)],
                reward_tokens: vec![Address::new(REWARD_TOKEN)],
            },
        )
    }

    /// Fund `amount` whole reward tokens over `duration` seconds from now.
    pub fn fund(&mut self, tx: &str, amount: u128, duration: i64) -> ChainEvent {
        self.fund_on(MAIN, tx, amount, duration)
    }

    pub fn fund_on(&mut self, ids: PoolIds, tx: &str, amount: u128, duration: i64) -> ChainEvent {
        let start = self.now();
        let raw = e18(amount);
        let shares = stake_shares(raw);
        let staked = self.staked(ids);
        self.chain.set_pool_balances(ids.pool, &[e6(staked)], &[raw]);
        self.chain.set_locked_shares(ids.reward_module, REWARD_TOKEN, shares);
        self.chain.push_funding(
            ids.reward_module,
            REWARD_TOKEN,
            OnChainFunding {
                amount: raw,
                shares,
                start,
                duration,
            },
        );
        self.push(
            tx,
            ids.reward_module,
            EventKind::RewardsFunded {
                token: Address::new(REWARD_TOKEN),
                amount: raw,
                shares,
                timestamp: start,
            },
        )
    }

    /// Owner pulls `amount` whole reward tokens back out of the pool.
    pub fn withdraw_on(&mut self, ids: PoolIds, tx: &str, amount: u128) -> ChainEvent {
        let raw = e18(amount);
        let left = self.reward_balance(ids).saturating_sub(raw);
        let staked = self.staked(ids);
        self.chain.set_pool_balances(ids.pool, &[e6(staked)], &[left]);
        self.chain
            .set_locked_shares(ids.reward_module, REWARD_TOKEN, stake_shares(left));
        self.push(
            tx,
            ids.reward_module,
            EventKind::RewardsWithdrawn {
                token: Address::new(REWARD_TOKEN),
                amount: raw,
                shares: stake_shares(raw),
            },
        )
    }

    /// Stake `amount` whole USDC as a single new lot for `user`.
    pub fn stake(&mut self, tx: &str, user: &str, amount: u128) -> ChainEvent {
        self.stake_on(MAIN, tx, user, amount)
    }

    pub fn stake_on(&mut self, ids: PoolIds, tx: &str, user: &str, amount: u128) -> ChainEvent {
        let raw = e6(amount);
        let mut lots = self.chain.lots(ids.reward_module, user);
        lots.push(OnChainLot {
            shares: stake_shares(raw),
            timestamp: self.now(),
        });
        self.chain.set_lots(ids.reward_module, user, lots);
        let staked = self.staked(ids) + amount;
        self.set_staked(ids, staked);
        self.push(
            tx,
            ids.staking_module,
            EventKind::Staked {
                user: Address::new(user),
                token: Address::new(USDC),
                amount: raw,
                shares: stake_shares(raw),
            },
        )
    }

    /// Unstake everything `user` holds.
    pub fn unstake_all(&mut self, tx: &str, user: &str) -> ChainEvent {
        self.unstake_all_on(MAIN, tx, user)
    }

    pub fn unstake_all_on(&mut self, ids: PoolIds, tx: &str, user: &str) -> ChainEvent {
        let lots = self.chain.lots(ids.reward_module, user);
        let shares: u128 = lots.iter().map(|l| l.shares).sum();
        let raw = shares / 1_000_000;
        self.chain.set_lots(ids.reward_module, user, vec![]);
        let staked = self.staked(ids) - raw / 1_000_000;
        self.set_staked(ids, staked);
        self.push(
            tx,
            ids.staking_module,
            EventKind::Unstaked {
                user: Address::new(user),
                token: Address::new(USDC),
                amount: raw,
                shares,
            },
        )
    }

    pub fn heartbeat(&mut self, tx: &str) -> ChainEvent {
        self.push(tx, "0x0", EventKind::Heartbeat)
    }

    fn staked(&self, ids: PoolIds) -> u128 {
        self.staked.get(ids.pool).copied().unwrap_or(0)
    }

    fn reward_balance(&self, ids: PoolIds) -> u128 {
        self.chain
            .pools
            .get(&Address::new(ids.pool))
            .and_then(|p| p.reward_balances.first().copied())
            .unwrap_or(0)
    }

    fn set_staked(&mut self, ids: PoolIds, whole: u128) {
        self.staked.insert(ids.pool, whole);
        let rewards = self.reward_balance(ids);
        self.chain.set_pool_balances(ids.pool, &[e6(whole)], &[rewards]);
        self.chain
            .set_staking_shares(ids.staking_module, USDC, stake_shares(e6(whole)));
    }

    pub fn timeline(&self) -> ChainTimeline {
        ChainTimeline::new(self.checkpoints.clone())
    }

    /// Apply every event to a fresh in-memory store.
    pub fn replay(&self, deployment: &Deployment) -> MemoryStore {
        self.replay_with(deployment, |_, _| {})
    }

    /// Replay, handing the store to `inspect` after each event.
    pub fn replay_with(
        &self,
        deployment: &Deployment,
        mut inspect: impl FnMut(&MemoryStore, &ChainEvent),
    ) -> MemoryStore {
        let mut store = MemoryStore::new();
        for (event, checkpoint) in self.events.iter().zip(&self.checkpoints) {
            dispatch(&mut store, &checkpoint.state, deployment, event)
                .unwrap_or_else(|e| panic!("event {} failed: {}", event.cursor(), e));
            inspect(&store, event);
        }
        store
    }
}

/// Pool created, U1 stakes, three more users stake, U1 leaves.
pub fn staking_script() -> Script {
    let mut script = Script::new(pool_chain());
    script.create_pool(RewardModuleKind::Competitive);
    script.fund("0xfund", 1_000, 1_000_000);
    script.stake("0xs1", "0xu1", 1_000);
    script.stake("0xs2", "0xu2", 2_000);
    script.stake("0xs3", "0xu3", 3_000);
    script.stake("0xs4", "0xu4", 4_000);
    script.unstake_all("0xx1", "0xu1");
    script
}
