//! Reward-module shapes.
//!
//! Each shape owns three pieces of accounting: how reward shares-per-token
//! is derived, how the emission schedule is classified, and what a
//! RewardsFunded event records. Lot handling differs too: only the vesting
//! shapes merge lots on claim, and only the linear shape tracks position
//! shares as a single aggregate.

use super::pool_state::PoolBundle;
use super::schedule::{self, Schedule};
use crate::chain::{ChainError, ChainReader};
use crate::domain::{
    Address, Decimal, Funding, Pool, PoolRewardToken, PoolState, RewardModuleKind, Timestamp,
};
use tracing::info;

/// Rates on linear modules are 1e18-scaled.
const RATE_DECIMALS: u32 = 18;

/// A RewardsFunded log, decoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Funded {
    pub token: Address,
    pub amount: u128,
    pub shares: u128,
    /// Schedule start.
    pub start: Timestamp,
    /// Block time of the funding log.
    pub created: Timestamp,
    pub log_index: u32,
}

pub trait RewardShape: Sync {
    fn kind(&self) -> RewardModuleKind;

    /// Recompute shares-per-token on every reward join record, and mirror the
    /// first one onto the pool.
    fn refresh_ratios(
        &self,
        chain: &dyn ChainReader,
        bundle: &mut PoolBundle,
        bootstrap: Decimal,
        now: Timestamp,
    ) -> Result<(), ChainError>;

    /// Classify the pool, leaving per-token state and emission rate on each
    /// reward join record.
    fn classify(&self, bundle: &mut PoolBundle, now: Timestamp, lookahead_secs: i64) -> Schedule;

    fn on_funded(
        &self,
        chain: &dyn ChainReader,
        bundle: &mut PoolBundle,
        funded: &Funded,
    ) -> Result<(), ChainError>;

    /// Whether the module keeps an on-chain lot list per user.
    fn tracks_lots(&self) -> bool {
        true
    }

    /// Whether claiming can merge or reorder lots.
    fn rebuilds_lots_on_claim(&self) -> bool {
        false
    }

    /// Whether position shares come from the module's aggregate instead of
    /// the sum of lots.
    fn aggregate_position_shares(&self) -> bool {
        false
    }
}

pub fn shape_for(kind: RewardModuleKind) -> &'static dyn RewardShape {
    match kind {
        RewardModuleKind::Competitive => &CompetitiveShape,
        RewardModuleKind::Vesting => &VestingShape,
        RewardModuleKind::Linear => &LinearShape,
        RewardModuleKind::Multi => &MultiShape,
    }
}

// =============================================================================
// Shared accounting
// =============================================================================

/// lockedShares(token) / balance, or the bootstrap ratio on an empty balance.
fn locked_share_ratio(
    chain: &dyn ChainReader,
    module: &Address,
    join: &PoolRewardToken,
    decimals: u32,
    bootstrap: Decimal,
) -> Result<Decimal, ChainError> {
    if !join.amount.is_positive() {
        return Ok(bootstrap);
    }
    let locked = chain.reward_locked_shares(module, &join.token)?;
    Ok(Decimal::from_raw(locked, decimals).safe_div(join.amount))
}

fn refresh_locked_ratios(
    chain: &dyn ChainReader,
    bundle: &mut PoolBundle,
    bootstrap: Decimal,
    limit: usize,
) -> Result<(), ChainError> {
    let module = bundle.pool.reward_module.clone();
    for i in 0..bundle.rewards.len().min(limit) {
        let decimals = bundle.decimals(&bundle.rewards[i].token);
        let ratio = locked_share_ratio(chain, &module, &bundle.rewards[i], decimals, bootstrap)?;
        bundle.rewards[i].shares_per_token = ratio;
    }
    if let Some(first) = bundle.rewards.first() {
        bundle.pool.reward_shares_per_token = first.shares_per_token;
    }
    Ok(())
}

/// Read the newest on-chain schedule for the token and record it as a Funding.
fn record_funding(
    chain: &dyn ChainReader,
    bundle: &mut PoolBundle,
    funded: &Funded,
) -> Result<(), ChainError> {
    let module = bundle.pool.reward_module.clone();
    let count = chain.reward_funding_count(&module, &funded.token)?;
    let onchain = chain.reward_funding(&module, &funded.token, count.saturating_sub(1))?;

    let decimals = bundle.decimals(&funded.token);
    let end = funded.start.saturating_add(onchain.duration);
    bundle.pool.widen_window(funded.start, end);

    let shares = Decimal::from_raw(funded.shares, decimals);
    let shares_per_second = if onchain.duration > 0 {
        shares.safe_div(Decimal::from_i64(onchain.duration))
    } else {
        Decimal::zero()
    };
    let funding = Funding {
        id: Funding::id_for(&bundle.pool.id, funded.created, funded.log_index),
        pool: bundle.pool.id.clone(),
        token: funded.token.clone(),
        created: funded.created,
        start: funded.start,
        end,
        original_amount: Decimal::from_raw(funded.amount, decimals),
        shares,
        shares_per_second,
        cleaned: false,
    };
    info!(
        pool = %bundle.pool.id,
        funding = %funding.id,
        start = %funding.start,
        end = %funding.end,
        shares_per_second = %funding.shares_per_second,
        "recorded funding"
    );
    bundle.upsert_funding(funding);
    Ok(())
}

fn apply_schedule(join: &mut PoolRewardToken, schedule: Schedule) {
    join.state = schedule.state;
    join.shares_per_second = schedule.shares_per_second;
}

fn set_pool_schedule(pool: &mut Pool, schedule: Schedule) {
    pool.state = schedule.state;
    pool.shares_per_second = schedule.shares_per_second;
}

/// One schedule over every funding of the pool, attributed to the first
/// reward token.
fn classify_single(bundle: &mut PoolBundle, now: Timestamp, lookahead_secs: i64) -> Schedule {
    let schedule = schedule::evaluate(&bundle.fundings, now, lookahead_secs);
    if let Some(first) = bundle.rewards.first_mut() {
        apply_schedule(first, schedule);
    }
    set_pool_schedule(&mut bundle.pool, schedule);
    schedule
}

// =============================================================================
// Shapes
// =============================================================================

/// Time-bonus module where stakers compete for one reward pool.
pub struct CompetitiveShape;

impl RewardShape for CompetitiveShape {
    fn kind(&self) -> RewardModuleKind {
        RewardModuleKind::Competitive
    }

    fn refresh_ratios(
        &self,
        chain: &dyn ChainReader,
        bundle: &mut PoolBundle,
        bootstrap: Decimal,
        _now: Timestamp,
    ) -> Result<(), ChainError> {
        refresh_locked_ratios(chain, bundle, bootstrap, 1)
    }

    fn classify(&self, bundle: &mut PoolBundle, now: Timestamp, lookahead_secs: i64) -> Schedule {
        classify_single(bundle, now, lookahead_secs)
    }

    fn on_funded(
        &self,
        chain: &dyn ChainReader,
        bundle: &mut PoolBundle,
        funded: &Funded,
    ) -> Result<(), ChainError> {
        record_funding(chain, bundle, funded)
    }

    fn rebuilds_lots_on_claim(&self) -> bool {
        true
    }
}

/// Vesting module where earned rewards are not diluted by later stakers.
pub struct VestingShape;

impl RewardShape for VestingShape {
    fn kind(&self) -> RewardModuleKind {
        RewardModuleKind::Vesting
    }

    fn refresh_ratios(
        &self,
        chain: &dyn ChainReader,
        bundle: &mut PoolBundle,
        bootstrap: Decimal,
        _now: Timestamp,
    ) -> Result<(), ChainError> {
        refresh_locked_ratios(chain, bundle, bootstrap, 1)
    }

    fn classify(&self, bundle: &mut PoolBundle, now: Timestamp, lookahead_secs: i64) -> Schedule {
        classify_single(bundle, now, lookahead_secs)
    }

    fn on_funded(
        &self,
        chain: &dyn ChainReader,
        bundle: &mut PoolBundle,
        funded: &Funded,
    ) -> Result<(), ChainError> {
        record_funding(chain, bundle, funded)
    }

    fn rebuilds_lots_on_claim(&self) -> bool {
        true
    }
}

/// Flat per-share emission drawn from one budget, with no schedules.
pub struct LinearShape;

impl RewardShape for LinearShape {
    fn kind(&self) -> RewardModuleKind {
        RewardModuleKind::Linear
    }

    /// Ratio is the remaining budget over the balance. The runway at the
    /// current flow rate gives the projected end time.
    fn refresh_ratios(
        &self,
        chain: &dyn ChainReader,
        bundle: &mut PoolBundle,
        bootstrap: Decimal,
        now: Timestamp,
    ) -> Result<(), ChainError> {
        let state = chain.linear_state(&bundle.pool.reward_module)?;
        let budget = state.reward_shares.saturating_sub(state.earned);
        let flow = Decimal::from_raw(state.staking_shares, 0)
            .safe_mul(Decimal::from_raw(state.rate, RATE_DECIMALS));

        bundle.pool.end = if state.staking_shares > 0 && flow.is_positive() {
            let runway = Decimal::from_raw(budget, 0)
                .safe_div(flow)
                .trunc_i64()
                .unwrap_or(i64::MAX);
            now.saturating_add(runway)
        } else {
            Timestamp::new(0)
        };

        let Some(first) = bundle.rewards.first() else {
            return Ok(());
        };
        let decimals = bundle.decimals(&first.token);
        let ratio = if first.amount.is_positive() {
            Decimal::from_raw(budget, decimals).safe_div(first.amount)
        } else {
            bootstrap
        };
        let shares_per_second = flow.safe_div(Decimal::pow10(decimals));
        if let Some(first) = bundle.rewards.first_mut() {
            first.shares_per_token = ratio;
            first.shares_per_second = shares_per_second;
        }
        bundle.pool.reward_shares_per_token = ratio;
        Ok(())
    }

    fn classify(&self, bundle: &mut PoolBundle, now: Timestamp, _lookahead_secs: i64) -> Schedule {
        let rate = bundle
            .rewards
            .first()
            .map(|r| r.shares_per_second)
            .unwrap_or_default();
        let schedule = if bundle.pool.end > now {
            Schedule {
                state: PoolState::Active,
                shares_per_second: rate,
            }
        } else if bundle.pool.funded.is_positive() {
            Schedule {
                state: PoolState::Stale,
                shares_per_second: Decimal::zero(),
            }
        } else {
            Schedule::default()
        };
        if let Some(first) = bundle.rewards.first_mut() {
            apply_schedule(first, schedule);
        }
        set_pool_schedule(&mut bundle.pool, schedule);
        schedule
    }

    fn on_funded(
        &self,
        _chain: &dyn ChainReader,
        bundle: &mut PoolBundle,
        funded: &Funded,
    ) -> Result<(), ChainError> {
        if bundle.pool.start.as_secs() == 0 {
            bundle.pool.start = funded.start;
        }
        Ok(())
    }

    fn tracks_lots(&self) -> bool {
        false
    }

    fn aggregate_position_shares(&self) -> bool {
        true
    }
}

/// Several reward tokens, each with its own schedules.
pub struct MultiShape;

impl RewardShape for MultiShape {
    fn kind(&self) -> RewardModuleKind {
        RewardModuleKind::Multi
    }

    fn refresh_ratios(
        &self,
        chain: &dyn ChainReader,
        bundle: &mut PoolBundle,
        bootstrap: Decimal,
        _now: Timestamp,
    ) -> Result<(), ChainError> {
        refresh_locked_ratios(chain, bundle, bootstrap, usize::MAX)
    }

    fn classify(&self, bundle: &mut PoolBundle, now: Timestamp, lookahead_secs: i64) -> Schedule {
        let mut pool_schedule = Schedule::default();
        for join in bundle.rewards.iter_mut() {
            let schedule = schedule::evaluate(
                bundle.fundings.iter().filter(|f| f.token == join.token),
                now,
                lookahead_secs,
            );
            apply_schedule(join, schedule);
            if schedule::precedence(schedule.state) > schedule::precedence(pool_schedule.state) {
                pool_schedule.state = schedule.state;
            }
        }
        pool_schedule.shares_per_second = bundle
            .rewards
            .first()
            .map(|r| r.shares_per_second)
            .unwrap_or_default();
        set_pool_schedule(&mut bundle.pool, pool_schedule);
        pool_schedule
    }

    fn on_funded(
        &self,
        chain: &dyn ChainReader,
        bundle: &mut PoolBundle,
        funded: &Funded,
    ) -> Result<(), ChainError> {
        record_funding(chain, bundle, funded)
    }
}

#[cfg(test)]
mod tests {
    use super::super::test_support::*;
    use super::*;
    use crate::chain::{LinearModuleState, OnChainFunding};

    fn funded(amount: u128, shares: u128, start: i64) -> Funded {
        Funded {
            token: Address::new(REWARD_TOKEN),
            amount,
            shares,
            start: Timestamp::new(start),
            created: Timestamp::new(start),
            log_index: 4,
        }
    }

    #[test]
    fn test_shape_capabilities() {
        assert!(shape_for(RewardModuleKind::Competitive).rebuilds_lots_on_claim());
        assert!(shape_for(RewardModuleKind::Vesting).rebuilds_lots_on_claim());
        assert!(!shape_for(RewardModuleKind::Multi).rebuilds_lots_on_claim());
        assert!(!shape_for(RewardModuleKind::Linear).tracks_lots());
        assert!(shape_for(RewardModuleKind::Linear).aggregate_position_shares());
        for kind in [
            RewardModuleKind::Competitive,
            RewardModuleKind::Vesting,
            RewardModuleKind::Linear,
            RewardModuleKind::Multi,
        ] {
            assert_eq!(shape_for(kind).kind(), kind);
        }
    }

    #[test]
    fn test_zero_balance_uses_bootstrap_without_reading_chain() {
        // No reward module recorded: a chain read would revert.
        let chain = crate::chain::StaticChain::new();
        let mut bundle = bundle(RewardModuleKind::Competitive);
        let bootstrap = Decimal::from_u64(1_000_000);
        CompetitiveShape
            .refresh_ratios(&chain, &mut bundle, bootstrap, Timestamp::new(0))
            .unwrap();
        assert_eq!(bundle.rewards[0].shares_per_token, bootstrap);
        assert_eq!(bundle.pool.reward_shares_per_token, bootstrap);
    }

    #[test]
    fn test_locked_share_ratio() {
        let mut chain = pool_chain();
        chain.set_locked_shares(REWARD_MODULE, REWARD_TOKEN, e18(4_000));
        let mut bundle = bundle(RewardModuleKind::Competitive);
        bundle.rewards[0].amount = Decimal::from_u64(2);
        CompetitiveShape
            .refresh_ratios(&chain, &mut bundle, Decimal::from_u64(1_000_000), Timestamp::new(0))
            .unwrap();
        assert_eq!(bundle.rewards[0].shares_per_token, Decimal::from_u64(2_000));
    }

    #[test]
    fn test_funding_rate_from_onchain_duration() {
        let mut chain = pool_chain();
        chain.push_funding(
            REWARD_MODULE,
            REWARD_TOKEN,
            OnChainFunding {
                amount: e18(1_000),
                shares: e18(1_000) * 1_000_000,
                start: 10_000,
                duration: 1_000_000,
            },
        );
        let mut bundle = bundle(RewardModuleKind::Competitive);
        let event = funded(e18(1_000), e18(1_000) * 1_000_000, 10_000);
        CompetitiveShape.on_funded(&chain, &mut bundle, &event).unwrap();
        // Retried event replaces rather than duplicates.
        CompetitiveShape.on_funded(&chain, &mut bundle, &event).unwrap();

        assert_eq!(bundle.fundings.len(), 1);
        assert_eq!(bundle.pool.fundings.len(), 1);
        let funding = &bundle.fundings[0];
        assert_eq!(funding.id, format!("{}_10000_4", POOL));
        assert_eq!(funding.end, Timestamp::new(1_010_000));
        assert_eq!(funding.shares_per_second, Decimal::from_u64(1_000));
        assert_eq!(bundle.pool.start, Timestamp::new(10_000));
        assert_eq!(bundle.pool.end, Timestamp::new(1_010_000));
    }

    #[test]
    fn test_linear_runway_sets_end() {
        let mut chain = pool_chain();
        // 100 staking shares at 0.5 reward shares per share-second: 50/s.
        // 10,000 budget left, so 200 s of runway.
        chain.set_linear_state(
            REWARD_MODULE,
            LinearModuleState {
                staking_shares: 100,
                reward_shares: 12_000,
                earned: 2_000,
                rate: e18(1) / 2,
            },
        );
        let mut bundle = bundle(RewardModuleKind::Linear);
        LinearShape
            .refresh_ratios(&chain, &mut bundle, Decimal::from_u64(1_000_000), Timestamp::new(1_000))
            .unwrap();
        assert_eq!(bundle.pool.end, Timestamp::new(1_200));

        let schedule = LinearShape.classify(&mut bundle, Timestamp::new(1_000), 0);
        assert_eq!(schedule.state, PoolState::Active);
        assert_eq!(bundle.rewards[0].state, PoolState::Active);
    }

    #[test]
    fn test_linear_without_stakers_has_no_end() {
        let mut chain = pool_chain();
        chain.set_linear_state(
            REWARD_MODULE,
            LinearModuleState {
                staking_shares: 0,
                reward_shares: 12_000,
                earned: 0,
                rate: e18(1),
            },
        );
        let mut bundle = bundle(RewardModuleKind::Linear);
        bundle.pool.funded = Decimal::from_u64(12);
        LinearShape
            .refresh_ratios(&chain, &mut bundle, Decimal::from_u64(1_000_000), Timestamp::new(1_000))
            .unwrap();
        assert_eq!(bundle.pool.end, Timestamp::new(0));
        let schedule = LinearShape.classify(&mut bundle, Timestamp::new(1_000), 0);
        assert_eq!(schedule.state, PoolState::Stale);
    }

    #[test]
    fn test_linear_funding_sets_start_only() {
        let chain = pool_chain();
        let mut bundle = bundle(RewardModuleKind::Linear);
        LinearShape
            .on_funded(&chain, &mut bundle, &funded(e18(5), e18(5), 777))
            .unwrap();
        LinearShape
            .on_funded(&chain, &mut bundle, &funded(e18(5), e18(5), 900))
            .unwrap();
        assert_eq!(bundle.pool.start, Timestamp::new(777));
        assert!(bundle.fundings.is_empty());
    }
}
