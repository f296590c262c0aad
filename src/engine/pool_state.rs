//! Pool financial-state engine.
//!
//! [`refresh`] recomputes every derived field of one pool from chain state:
//! token prices and balances, share ratios, USD valuation (with the platform
//! delta), emission schedule state, APR, and usage. Running it twice at the
//! same instant against the same chain state changes nothing the second time.

use super::modules::shape_for;
use super::platform::{apply_pool_delta, PoolValue};
use crate::chain::ChainReader;
use crate::domain::{
    Address, Decimal, Funding, Platform, Pool, PoolDayData, PoolRewardToken, PoolStakingToken,
    StakingModuleKind, Timestamp, Token,
};
use crate::error::HandlerError;
use crate::pricing::{PricingPass, DEFAULT_DECIMALS};
use crate::store::EntityStore;
use std::collections::BTreeMap;

pub const SECONDS_PER_YEAR: u64 = 31_536_000;

/// Pool usage is a 1e18-scaled fraction.
const USAGE_DECIMALS: u32 = 18;

/// Each staked NFT counts as one whole share at this many decimals, so ERC721
/// pools carry a shares-per-token ratio of 1e18 whether or not anything is
/// staked.
pub const ERC721_SHARE_DECIMALS: u32 = 18;

/// A pool together with every record its refresh reads or writes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolBundle {
    pub pool: Pool,
    pub staking: Vec<PoolStakingToken>,
    pub rewards: Vec<PoolRewardToken>,
    pub tokens: BTreeMap<Address, Token>,
    pub fundings: Vec<Funding>,
}

impl PoolBundle {
    pub fn load<S: EntityStore>(store: &S, id: &Address) -> Result<Self, HandlerError> {
        let pool = store
            .load::<Pool>(id.as_str())
            .ok_or_else(|| HandlerError::UnknownPool(id.clone()))?;

        let staking = pool
            .staking_tokens
            .iter()
            .map(|sid| {
                store
                    .load::<PoolStakingToken>(sid)
                    .ok_or_else(|| HandlerError::missing("pool_staking_token", sid.as_str()))
            })
            .collect::<Result<Vec<_>, _>>()?;
        let rewards = pool
            .reward_tokens
            .iter()
            .map(|rid| {
                store
                    .load::<PoolRewardToken>(rid)
                    .ok_or_else(|| HandlerError::missing("pool_reward_token", rid.as_str()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut tokens = BTreeMap::new();
        for address in staking.iter().map(|s| &s.token).chain(rewards.iter().map(|r| &r.token)) {
            if tokens.contains_key(address) {
                continue;
            }
            let token = store
                .load::<Token>(address.as_str())
                .ok_or_else(|| HandlerError::missing("token", address.as_str()))?;
            tokens.insert(address.clone(), token);
        }

        let fundings = pool
            .fundings
            .iter()
            .map(|fid| {
                store
                    .load::<Funding>(fid)
                    .ok_or_else(|| HandlerError::missing("funding", fid.as_str()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self {
            pool,
            staking,
            rewards,
            tokens,
            fundings,
        })
    }

    pub fn save<S: EntityStore>(&self, store: &mut S) {
        store.save(&self.pool);
        for join in &self.staking {
            store.save(join);
        }
        for join in &self.rewards {
            store.save(join);
        }
        for token in self.tokens.values() {
            store.save(token);
        }
        for funding in &self.fundings {
            store.save(funding);
        }
    }

    pub fn decimals(&self, token: &Address) -> u32 {
        self.tokens
            .get(token)
            .map(|t| t.decimals)
            .unwrap_or(DEFAULT_DECIMALS)
    }

    pub fn price(&self, token: &Address) -> Decimal {
        self.tokens.get(token).map(|t| t.price).unwrap_or_default()
    }

    pub fn staking_token(&self) -> Option<&Token> {
        self.staking.first().and_then(|s| self.tokens.get(&s.token))
    }

    pub fn reward_join_mut(&mut self, token: &Address) -> Option<&mut PoolRewardToken> {
        self.rewards.iter_mut().find(|r| &r.token == token)
    }

    /// Insert a funding, or replace the one with the same id.
    pub fn upsert_funding(&mut self, funding: Funding) {
        match self.fundings.iter_mut().find(|f| f.id == funding.id) {
            Some(existing) => *existing = funding,
            None => {
                self.pool.fundings.push(funding.id.clone());
                self.fundings.push(funding);
            }
        }
    }

    /// Σ over reward tokens of emission rate / shares-per-token × price.
    pub fn usd_rate(&self) -> Decimal {
        self.rewards
            .iter()
            .map(|r| {
                r.shares_per_second
                    .safe_div(r.shares_per_token)
                    .safe_mul(self.price(&r.token))
            })
            .sum()
    }
}

/// Refresh one pool's derived snapshot, applying its valuation change to the
/// platform by delta.
pub fn refresh<C: ChainReader>(
    bundle: &mut PoolBundle,
    platform: &mut Platform,
    pass: &mut PricingPass<'_, C>,
) -> Result<(), HandlerError> {
    let chain = pass.chain();
    let deployment = pass.deployment();
    let now = pass.now();
    let bootstrap = deployment.bootstrap_shares_per_token;
    let shape = shape_for(bundle.pool.reward_module_kind);
    let before = PoolValue::of(&bundle.pool);

    // Prices
    for token in bundle.tokens.values_mut() {
        let quote = pass.quote(token);
        token.price = quote.price;
        token.hint = quote.hint.to_string();
        token.updated = now;
    }

    // Balances
    let staking_balances = chain.pool_staking_balances(&bundle.pool.id)?;
    let reward_balances = chain.pool_reward_balances(&bundle.pool.id)?;
    for i in 0..bundle.staking.len() {
        let decimals = bundle.decimals(&bundle.staking[i].token);
        let raw = staking_balances.get(i).copied().unwrap_or(0);
        bundle.staking[i].amount = Decimal::from_raw(raw, decimals);
    }
    for i in 0..bundle.rewards.len() {
        let decimals = bundle.decimals(&bundle.rewards[i].token);
        let raw = reward_balances.get(i).copied().unwrap_or(0);
        bundle.rewards[i].amount = Decimal::from_raw(raw, decimals);
    }
    bundle.pool.staked = bundle.staking.first().map(|s| s.amount).unwrap_or_default();
    bundle.pool.rewards = bundle.rewards.first().map(|r| r.amount).unwrap_or_default();

    // Share ratios
    for i in 0..bundle.staking.len() {
        let ratio = match bundle.pool.staking_module_kind {
            StakingModuleKind::Erc721 => Decimal::pow10(ERC721_SHARE_DECIMALS),
            StakingModuleKind::Erc20 if !bundle.staking[i].amount.is_positive() => bootstrap,
            StakingModuleKind::Erc20 => {
                let join = &bundle.staking[i];
                let shares = chain.staking_total_shares(&bundle.pool.staking_module, &join.token)?;
                Decimal::from_raw(shares, bundle.decimals(&join.token)).safe_div(join.amount)
            }
        };
        bundle.staking[i].shares_per_token = ratio;
    }
    bundle.pool.staking_shares_per_token = bundle
        .staking
        .first()
        .map(|s| s.shares_per_token)
        .unwrap_or(bootstrap);
    shape.refresh_ratios(chain, bundle, bootstrap, now)?;

    // USD valuation
    let staked_usd: Decimal = bundle
        .staking
        .iter()
        .map(|s| s.amount.safe_mul(bundle.price(&s.token)))
        .sum();
    let rewards_usd: Decimal = bundle
        .rewards
        .iter()
        .map(|r| r.amount.safe_mul(bundle.price(&r.token)))
        .sum();
    bundle.pool.staked_usd = staked_usd;
    bundle.pool.rewards_usd = rewards_usd;
    bundle.pool.tvl = staked_usd + rewards_usd;
    apply_pool_delta(platform, before, PoolValue::of(&bundle.pool));

    // Schedule and APR
    shape.classify(bundle, now, deployment.boiling_lookahead_secs);
    bundle.pool.apr = annual_rate(bundle.usd_rate(), staked_usd);

    bundle.pool.usage = Decimal::from_raw(chain.pool_usage(&bundle.pool.id)?, USAGE_DECIMALS);
    bundle.pool.updated = now;
    Ok(())
}

/// Percentage yield of a USD-per-second emission over a staked USD value.
pub fn annual_rate(usd_per_second: Decimal, staked_usd: Decimal) -> Decimal {
    if !usd_per_second.is_positive() || !staked_usd.is_positive() {
        return Decimal::zero();
    }
    usd_per_second
        .safe_mul(Decimal::from_u64(SECONDS_PER_YEAR))
        .safe_div(staked_usd)
        .safe_mul(Decimal::hundred())
}

/// Today's snapshot of the pool, carrying forward the day's accumulated volume.
pub fn day_snapshot<S: EntityStore>(store: &S, pool: &Pool, now: Timestamp) -> PoolDayData {
    let mut day = store
        .load::<PoolDayData>(&PoolDayData::id_for(&pool.id, now))
        .unwrap_or_else(|| PoolDayData::new(&pool.id, now));
    day.total_staked = pool.staked;
    day.total_gysr_spent = pool.gysr_spent;
    day.total_gysr_vested = pool.gysr_vested;
    day.users = pool.users;
    day.tvl = pool.tvl;
    day.apr = pool.apr;
    day.usage = pool.usage;
    day
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::domain::{PoolState, RewardModuleKind};
    use crate::store::MemoryStore;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    #[test]
    fn test_apr_guards_zero_operands() {
        assert!(annual_rate(Decimal::zero(), d("100")).is_zero());
        assert!(annual_rate(d("1"), Decimal::zero()).is_zero());
        // 1 USD/s over 31,536,000 USD staked is 100%.
        assert_eq!(annual_rate(d("1"), d("31536000")), d("100"));
    }

    #[test]
    fn test_refresh_values_pool_and_moves_platform() {
        let mut chain = pool_chain();
        // 500 USDC-priced staking tokens and 10 reward tokens at 30 USD.
        chain.set_pool_balances(POOL, &[e6(500)], &[e18(10)]);
        chain.set_staking_shares(STAKING_MODULE, STAKING_TOKEN, e6(500) * 1_000_000);
        chain.set_locked_shares(REWARD_MODULE, REWARD_TOKEN, e18(10) * 1_000_000);
        chain.set_pool_usage(POOL, e18(1) / 4);
        let deployment = deployment();
        let mut bundle = bundle(RewardModuleKind::Competitive);
        let mut platform = Platform::new();

        let mut pass = PricingPass::new(&chain, &deployment, Timestamp::new(5_000));
        refresh(&mut bundle, &mut platform, &mut pass).unwrap();

        assert_eq!(bundle.pool.staked, d("500"));
        assert_eq!(bundle.pool.rewards, d("10"));
        assert_eq!(bundle.pool.staked_usd, d("500"));
        assert_eq!(bundle.pool.rewards_usd, d("300"));
        assert_eq!(bundle.pool.tvl, d("800"));
        assert_eq!(bundle.pool.staking_shares_per_token, d("1000000"));
        assert_eq!(bundle.pool.reward_shares_per_token, d("1000000"));
        assert_eq!(bundle.pool.usage, d("0.25"));
        assert_eq!(bundle.pool.state, PoolState::Unfunded);
        assert_eq!(bundle.pool.updated, Timestamp::new(5_000));
        assert_eq!(platform.tvl, d("800"));

        // Same instant, same chain: the second delta is zero.
        let mut pass = PricingPass::new(&chain, &deployment, Timestamp::new(5_000));
        let first = bundle.clone();
        refresh(&mut bundle, &mut platform, &mut pass).unwrap();
        assert_eq!(bundle, first);
        assert_eq!(platform.tvl, d("800"));
    }

    #[test]
    fn test_tvl_equals_sum_of_terms() {
        let mut chain = pool_chain();
        chain.set_pool_balances(POOL, &[e6(1_234)], &[e18(7)]);
        let deployment = deployment();
        let mut bundle = bundle(RewardModuleKind::Competitive);
        let mut platform = Platform::new();
        let mut pass = PricingPass::new(&chain, &deployment, Timestamp::new(5_000));
        refresh(&mut bundle, &mut platform, &mut pass).unwrap();

        let terms: Decimal = bundle
            .staking
            .iter()
            .map(|s| s.amount * bundle.price(&s.token))
            .chain(bundle.rewards.iter().map(|r| r.amount * bundle.price(&r.token)))
            .sum();
        assert_eq!(bundle.pool.tvl, terms);
    }

    #[test]
    fn test_erc721_staking_is_one_whole_share_per_token() {
        let deployment = deployment();
        for held in [0, 3] {
            let mut chain = pool_chain();
            chain.set_pool_balances(POOL, &[held], &[0]);
            let mut bundle = bundle(RewardModuleKind::Competitive);
            bundle.pool.staking_module_kind = StakingModuleKind::Erc721;
            let mut platform = Platform::new();
            let mut pass = PricingPass::new(&chain, &deployment, Timestamp::new(5_000));
            refresh(&mut bundle, &mut platform, &mut pass).unwrap();
            assert_eq!(
                bundle.pool.staking_shares_per_token,
                d("1000000000000000000"),
                "{} staked",
                held
            );
        }
    }

    #[test]
    fn test_missing_pool_balances_is_fatal() {
        let chain = crate::chain::StaticChain::new();
        let deployment = deployment();
        let mut bundle = bundle(RewardModuleKind::Competitive);
        let mut platform = Platform::new();
        let mut pass = PricingPass::new(&chain, &deployment, Timestamp::new(5_000));
        let err = refresh(&mut bundle, &mut platform, &mut pass).unwrap_err();
        assert!(matches!(err, HandlerError::Chain(_)));
    }

    #[test]
    fn test_bundle_roundtrip_through_store() {
        let bundle = bundle(RewardModuleKind::Multi);
        let mut store = MemoryStore::new();
        bundle.save(&mut store);
        let loaded = PoolBundle::load(&store, &Address::new(POOL)).unwrap();
        assert_eq!(loaded, bundle);
        assert!(matches!(
            PoolBundle::load(&store, &Address::new("0xnothing")),
            Err(HandlerError::UnknownPool(_))
        ));
    }

    #[test]
    fn test_day_snapshot_keeps_volume() {
        let mut store = MemoryStore::new();
        let mut pool = bundle(RewardModuleKind::Competitive).pool;
        let now = Timestamp::new(3 * 86_400 + 10);
        let mut day = PoolDayData::new(&pool.id, now);
        day.volume = d("42");
        store.save(&day);

        pool.tvl = d("9");
        pool.users = 2;
        let snap = day_snapshot(&store, &pool, now.saturating_add(100));
        assert_eq!(snap.volume, d("42"));
        assert_eq!(snap.tvl, d("9"));
        assert_eq!(snap.users, 2);
        assert_eq!(snap.date, Timestamp::new(3 * 86_400));
    }
}
