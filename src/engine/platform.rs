//! Platform aggregate: delta bookkeeping, active-pool admission and the
//! rate-limited sweep.

use super::pool_state::{day_snapshot, refresh, PoolBundle};
use crate::chain::ChainReader;
use crate::config::Deployment;
use crate::domain::{Address, Decimal, Platform, Pool, Timestamp};
use crate::error::HandlerError;
use crate::pricing::PricingPass;
use crate::store::{EntityKind, EntityStore};
use tracing::{info, warn};

/// A pool's contribution to the platform totals.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PoolValue {
    pub tvl: Decimal,
    pub staked_usd: Decimal,
    pub rewards_usd: Decimal,
}

impl PoolValue {
    pub fn of(pool: &Pool) -> Self {
        Self {
            tvl: pool.tvl,
            staked_usd: pool.staked_usd,
            rewards_usd: pool.rewards_usd,
        }
    }
}

/// Subtract a pool's old contribution and add its new one.
pub fn apply_pool_delta(platform: &mut Platform, old: PoolValue, new: PoolValue) {
    platform.tvl = platform.tvl - old.tvl + new.tvl;
    platform.staked_usd = platform.staked_usd - old.staked_usd + new.staked_usd;
    platform.rewards_usd = platform.rewards_usd - old.rewards_usd + new.rewards_usd;
}

/// Add a pool to the sweep set once its TVL clears the pricing minimum.
/// Returns true if it was newly admitted.
pub fn admit(platform: &mut Platform, pool: &Pool, min_tvl: Decimal) -> bool {
    if pool.tvl <= min_tvl || platform.is_active(&pool.id) {
        return false;
    }
    platform.active_pools.push(pool.id.clone());
    info!(pool = %pool.id, tvl = %pool.tvl, "pool admitted to sweep");
    true
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SweepOutcome {
    /// False when the sweep was rate limited.
    pub ran: bool,
    pub refreshed: Vec<Address>,
    pub evicted: Vec<Address>,
    /// Delta-maintained TVL minus a fresh resummation.
    pub drift: Decimal,
}

/// Refresh every active pool except `trigger`, at most once per interval.
///
/// Pools that fall below the pricing minimum leave the set but are kept.
/// The run ends with a resummation check of the platform TVL.
pub fn sweep<S: EntityStore, C: ChainReader>(
    store: &mut S,
    platform: &mut Platform,
    chain: &C,
    deployment: &Deployment,
    now: Timestamp,
    trigger: Option<&Address>,
) -> Result<SweepOutcome, HandlerError> {
    if now.seconds_since(platform.updated) < deployment.sweep_interval_secs {
        return Ok(SweepOutcome::default());
    }

    let mut pass = PricingPass::new(chain, deployment, now);
    let mut outcome = SweepOutcome {
        ran: true,
        ..SweepOutcome::default()
    };
    for id in platform.active_pools.clone() {
        if Some(&id) == trigger {
            continue;
        }
        let mut bundle = PoolBundle::load(store, &id)?;
        refresh(&mut bundle, platform, &mut pass)?;
        bundle.save(store);
        let day = day_snapshot(store, &bundle.pool, now);
        store.save(&day);
        outcome.refreshed.push(id.clone());

        if bundle.pool.tvl < deployment.pricing_min_tvl {
            outcome.evicted.push(id);
        }
    }
    platform
        .active_pools
        .retain(|id| !outcome.evicted.contains(id));
    for id in &outcome.evicted {
        info!(pool = %id, "pool evicted from sweep");
    }
    platform.updated = now;

    outcome.drift = platform.tvl - resum_tvl(store);
    if outcome.drift.abs() > deployment.tvl_drift_tolerance {
        warn!(
            platform_tvl = %platform.tvl,
            drift = %outcome.drift,
            "platform tvl drifted from pool resummation"
        );
    }
    info!(
        refreshed = outcome.refreshed.len(),
        evicted = outcome.evicted.len(),
        active = platform.active_pools.len(),
        "platform sweep complete"
    );
    Ok(outcome)
}

/// TVL summed over every stored pool.
pub fn resum_tvl<S: EntityStore>(store: &S) -> Decimal {
    store
        .ids(EntityKind::Pool)
        .iter()
        .filter_map(|id| store.load::<Pool>(id))
        .map(|p| p.tvl)
        .sum()
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::domain::RewardModuleKind;
    use crate::store::MemoryStore;

    fn d(s: &str) -> Decimal {
        Decimal::from_str_canonical(s).unwrap()
    }

    fn value(tvl: &str) -> PoolValue {
        PoolValue {
            tvl: d(tvl),
            staked_usd: d(tvl),
            rewards_usd: Decimal::zero(),
        }
    }

    #[test]
    fn test_delta_preserves_other_pools() {
        let mut platform = Platform::new();
        apply_pool_delta(&mut platform, PoolValue::default(), value("100"));
        apply_pool_delta(&mut platform, PoolValue::default(), value("50"));
        apply_pool_delta(&mut platform, value("100"), value("80"));
        assert_eq!(platform.tvl, d("130"));
        assert_eq!(platform.staked_usd, d("130"));
    }

    #[test]
    fn test_admission_is_strict_and_once() {
        let mut platform = Platform::new();
        let mut pool = bundle(RewardModuleKind::Competitive).pool;
        pool.tvl = d("100");
        assert!(!admit(&mut platform, &pool, d("100")));
        pool.tvl = d("100.01");
        assert!(admit(&mut platform, &pool, d("100")));
        assert!(!admit(&mut platform, &pool, d("100")));
        assert_eq!(platform.active_pools.len(), 1);
    }

    #[test]
    fn test_sweep_is_rate_limited() {
        let chain = pool_chain();
        let mut deployment = deployment();
        deployment.sweep_interval_secs = 3_600;
        let mut store = MemoryStore::new();
        let mut platform = Platform::new();

        let first = sweep(&mut store, &mut platform, &chain, &deployment, Timestamp::new(10_000), None).unwrap();
        assert!(first.ran);
        assert_eq!(platform.updated, Timestamp::new(10_000));

        let second = sweep(&mut store, &mut platform, &chain, &deployment, Timestamp::new(12_000), None).unwrap();
        assert!(!second.ran);
        assert_eq!(platform.updated, Timestamp::new(10_000));
    }

    #[test]
    fn test_sweep_refreshes_and_evicts() {
        let mut chain = pool_chain();
        chain.set_pool_balances(POOL, &[e6(1_000)], &[0]);
        let deployment = deployment();
        let mut store = MemoryStore::new();
        let bundle = bundle(RewardModuleKind::Competitive);
        bundle.save(&mut store);
        let mut platform = Platform::new();
        platform.active_pools.push(Address::new(POOL));

        let outcome = sweep(&mut store, &mut platform, &chain, &deployment, Timestamp::new(100_000), None).unwrap();
        assert_eq!(outcome.refreshed, vec![Address::new(POOL)]);
        assert!(outcome.evicted.is_empty());
        assert!(outcome.drift.is_zero());
        assert_eq!(store.load::<Pool>(POOL).unwrap().tvl, d("1000"));

        // Balance drains below the minimum: the next sweep evicts.
        chain.set_pool_balances(POOL, &[e6(50)], &[0]);
        let later = Timestamp::new(100_000 + deployment.sweep_interval_secs);
        let outcome = sweep(&mut store, &mut platform, &chain, &deployment, later, None).unwrap();
        assert_eq!(outcome.evicted, vec![Address::new(POOL)]);
        assert!(platform.active_pools.is_empty());
        assert!(store.load::<Pool>(POOL).is_some());
        assert_eq!(platform.tvl, d("50"));
    }

    #[test]
    fn test_sweep_skips_trigger_pool() {
        let chain = pool_chain();
        let deployment = deployment();
        let mut store = MemoryStore::new();
        bundle(RewardModuleKind::Competitive).save(&mut store);
        let mut platform = Platform::new();
        platform.active_pools.push(Address::new(POOL));

        let trigger = Address::new(POOL);
        let outcome = sweep(&mut store, &mut platform, &chain, &deployment, Timestamp::new(100_000), Some(&trigger)).unwrap();
        assert!(outcome.ran);
        assert!(outcome.refreshed.is_empty());
    }
}
