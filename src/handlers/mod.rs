//! Event handlers.
//!
//! [`dispatch`] routes one typed event to its handler. Handlers load the
//! records they touch from the store, call into the reconciler and the
//! engine, and write everything back. Module events find their pool through
//! the emitting module's on-chain owner; failing that read aborts the event.

use crate::chain::ChainReader;
use crate::config::Deployment;
use crate::domain::{
    Address, ChainEvent, Decimal, EventKind, Platform, Pool, Timestamp, Transaction,
    TransactionKind, User,
};
use crate::engine::{admit, day_snapshot, refresh, sweep, PoolBundle};
use crate::error::HandlerError;
use crate::pricing::PricingPass;
use crate::store::EntityStore;
use tracing::debug;

mod factory;
mod rewards;
mod staking;

/// What every handler needs besides the store.
pub struct EventContext<'a, C: ChainReader> {
    pub chain: &'a C,
    pub deployment: &'a Deployment,
    pub event: &'a ChainEvent,
}

impl<'a, C: ChainReader> EventContext<'a, C> {
    pub fn now(&self) -> Timestamp {
        self.event.block.timestamp
    }

    /// Resolve the pool owning the module that emitted this event.
    fn owning_pool(&self) -> Result<Address, HandlerError> {
        Ok(self.chain.module_owner(&self.event.address)?)
    }

    fn load_bundle<S: EntityStore>(&self, store: &S) -> Result<PoolBundle, HandlerError> {
        PoolBundle::load(store, &self.owning_pool()?)
    }

    fn load_pool<S: EntityStore>(&self, store: &S) -> Result<Pool, HandlerError> {
        let id = self.owning_pool()?;
        store
            .load::<Pool>(id.as_str())
            .ok_or(HandlerError::UnknownPool(id))
    }

    fn pass(&self) -> PricingPass<'a, C> {
        PricingPass::new(self.chain, self.deployment, self.now())
    }
}

/// Apply one event to the store.
pub fn dispatch<S: EntityStore, C: ChainReader>(
    store: &mut S,
    chain: &C,
    deployment: &Deployment,
    event: &ChainEvent,
) -> Result<(), HandlerError> {
    let ctx = EventContext {
        chain,
        deployment,
        event,
    };
    debug!(
        block = event.block.number,
        log_index = event.log_index,
        event = event.kind.name(),
        "dispatching event"
    );

    match &event.kind {
        EventKind::PoolCreated {
            pool,
            owner,
            staking_module,
            reward_module,
            staking_module_kind,
            reward_module_kind,
            staking_tokens,
            reward_tokens,
        } => factory::pool_created(
            store,
            &ctx,
            factory::NewPool {
                pool,
                owner,
                staking_module,
                reward_module,
                staking_module_kind: *staking_module_kind,
                reward_module_kind: *reward_module_kind,
                staking_tokens,
                reward_tokens,
            },
        ),
        EventKind::Staked {
            user,
            amount,
            shares,
            ..
        } => staking::staked(store, &ctx, user, *amount, *shares),
        EventKind::Unstaked { user, amount, .. } => {
            staking::unstaked(store, &ctx, user, *amount)
        }
        EventKind::Claimed { user, amount, .. } => staking::claimed(store, &ctx, user, *amount),
        EventKind::RewardsFunded {
            token,
            amount,
            shares,
            timestamp,
        } => rewards::funded(store, &ctx, token, *amount, *shares, Timestamp::new(*timestamp)),
        EventKind::RewardsExpired {
            token,
            amount,
            timestamp,
            ..
        } => rewards::expired(store, &ctx, token, *amount, Timestamp::new(*timestamp)),
        EventKind::RewardsWithdrawn { token, amount, .. } => {
            rewards::withdrawn(store, &ctx, token, *amount)
        }
        EventKind::RewardsDistributed {
            user,
            token,
            amount,
            ..
        } => rewards::distributed(store, &ctx, user, token, *amount),
        EventKind::GysrSpent { user, amount } => rewards::gysr_spent(store, &ctx, user, *amount),
        EventKind::GysrVested { amount, .. } => rewards::gysr_vested(store, &ctx, *amount),
        EventKind::Heartbeat => heartbeat(store, &ctx),
    }
}

fn heartbeat<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
) -> Result<(), HandlerError> {
    let mut platform = store.load_platform();
    let outcome = sweep(store, &mut platform, ctx.chain, ctx.deployment, ctx.now(), None)?;
    if outcome.ran {
        store.save(&platform);
    }
    Ok(())
}

/// Load a user, counting it on the platform the first time it is seen.
fn user_or_new<S: EntityStore>(store: &S, platform: &mut Platform, id: &Address) -> User {
    store.load::<User>(id.as_str()).unwrap_or_else(|| {
        platform.users += 1;
        User::new(id.clone())
    })
}

/// The transaction record for this event's hash. An existing record keeps
/// its amounts so later logs of the same transaction enrich it.
fn transaction_for<S: EntityStore, C: ChainReader>(
    store: &S,
    ctx: &EventContext<'_, C>,
    kind: TransactionKind,
    pool: &Address,
    user: &Address,
) -> Transaction {
    store
        .load::<Transaction>(ctx.event.tx_hash.as_str())
        .unwrap_or_else(|| {
            Transaction::new(
                ctx.event.tx_hash.clone(),
                kind,
                pool.clone(),
                user.clone(),
                ctx.event.block.number,
                ctx.now(),
            )
        })
}

/// Add USD volume to the pool, the platform and today's pool snapshot.
fn record_volume<S: EntityStore>(
    store: &mut S,
    pool: &mut Pool,
    platform: &mut Platform,
    usd: Decimal,
    now: Timestamp,
) {
    pool.volume += usd;
    platform.volume += usd;
    let mut day = day_snapshot(store, pool, now);
    day.volume += usd;
    store.save(&day);
}

/// Refresh the pool's derived state within its own pricing pass.
fn refresh_bundle<C: ChainReader>(
    ctx: &EventContext<'_, C>,
    bundle: &mut PoolBundle,
    platform: &mut Platform,
) -> Result<(), HandlerError> {
    let mut pass = ctx.pass();
    refresh(bundle, platform, &mut pass)
}

/// Write back a refreshed pool, then run admission and the sweep.
fn settle<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    bundle: &PoolBundle,
    platform: &mut Platform,
    admission: bool,
) -> Result<(), HandlerError> {
    bundle.save(store);
    let day = day_snapshot(store, &bundle.pool, ctx.now());
    store.save(&day);
    if admission {
        admit(platform, &bundle.pool, ctx.deployment.pricing_min_tvl);
    }
    sweep(
        store,
        platform,
        ctx.chain,
        ctx.deployment,
        ctx.now(),
        Some(&bundle.pool.id),
    )?;
    store.save(platform);
    Ok(())
}
