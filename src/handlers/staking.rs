use super::{record_volume, refresh_bundle, settle, transaction_for, user_or_new, EventContext};
use crate::chain::ChainReader;
use crate::domain::{Address, Decimal, Position, TransactionKind};
use crate::engine::{
    close_if_empty, reconcile_claim, reconcile_stake, reconcile_unstake, refresh_position_shares,
    shape_for, PoolBundle,
};
use crate::error::HandlerError;
use crate::pricing::DEFAULT_DECIMALS;
use crate::store::EntityStore;

/// Staking shares carry the staking token's decimals.
fn staking_decimals(bundle: &PoolBundle) -> u32 {
    bundle
        .staking_token()
        .map(|t| t.decimals)
        .unwrap_or(DEFAULT_DECIMALS)
}

fn staked_amount(bundle: &PoolBundle, raw: u128) -> Decimal {
    Decimal::from_raw(raw, staking_decimals(bundle))
}

pub(super) fn staked<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    user: &Address,
    amount: u128,
    shares: u128,
) -> Result<(), HandlerError> {
    let mut bundle = ctx.load_bundle(store)?;
    let mut platform = store.load_platform();
    let shape = shape_for(bundle.pool.reward_module_kind);
    let decimals = staking_decimals(&bundle);

    let mut account = user_or_new(store, &mut platform, user);
    let position_id = Position::id_for(&bundle.pool.id, user);
    let mut position = match store.load::<Position>(&position_id) {
        Some(position) => position,
        None => {
            bundle.pool.users += 1;
            Position::new(&bundle.pool.id, user)
        }
    };

    reconcile_stake(
        store,
        ctx.chain,
        shape,
        &bundle.pool,
        &mut position,
        &ctx.event.tx_hash,
        shares,
        ctx.now(),
        decimals,
    )?;
    refresh_position_shares(store, ctx.chain, shape, &bundle.pool, &mut position, decimals)?;
    store.save(&position);

    account.operations += 1;
    bundle.pool.operations += 1;
    platform.operations += 1;

    let mut tx = transaction_for(store, ctx, TransactionKind::Stake, &bundle.pool.id, user);
    tx.kind = TransactionKind::Stake;
    tx.amount = staked_amount(&bundle, amount);
    store.save(&tx);

    refresh_bundle(ctx, &mut bundle, &mut platform)?;
    let usd = bundle
        .staking_token()
        .map(|t| t.usd(tx.amount))
        .unwrap_or_default();
    record_volume(store, &mut bundle.pool, &mut platform, usd, ctx.now());

    store.save(&account);
    settle(store, ctx, &bundle, &mut platform, true)
}

pub(super) fn unstaked<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    user: &Address,
    amount: u128,
) -> Result<(), HandlerError> {
    let mut bundle = ctx.load_bundle(store)?;
    let mut platform = store.load_platform();
    let shape = shape_for(bundle.pool.reward_module_kind);
    let decimals = staking_decimals(&bundle);

    let mut account = user_or_new(store, &mut platform, user);
    let position_id = Position::id_for(&bundle.pool.id, user);
    let mut position = store
        .load::<Position>(&position_id)
        .ok_or_else(|| HandlerError::missing("position", position_id.as_str()))?;

    reconcile_unstake(store, ctx.chain, shape, &bundle.pool, &mut position, decimals)?;
    refresh_position_shares(store, ctx.chain, shape, &bundle.pool, &mut position, decimals)?;
    if !close_if_empty(store, &mut bundle.pool, &position) {
        store.save(&position);
    }

    account.operations += 1;
    bundle.pool.operations += 1;
    platform.operations += 1;

    let mut tx = transaction_for(store, ctx, TransactionKind::Unstake, &bundle.pool.id, user);
    tx.kind = TransactionKind::Unstake;
    tx.amount = staked_amount(&bundle, amount);
    store.save(&tx);

    refresh_bundle(ctx, &mut bundle, &mut platform)?;
    store.save(&account);
    settle(store, ctx, &bundle, &mut platform, true)
}

pub(super) fn claimed<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    user: &Address,
    amount: u128,
) -> Result<(), HandlerError> {
    let mut bundle = ctx.load_bundle(store)?;
    let mut platform = store.load_platform();
    let shape = shape_for(bundle.pool.reward_module_kind);
    let decimals = staking_decimals(&bundle);

    let mut account = user_or_new(store, &mut platform, user);
    let position_id = Position::id_for(&bundle.pool.id, user);
    if let Some(mut position) = store.load::<Position>(&position_id) {
        reconcile_claim(store, ctx.chain, shape, &bundle.pool, &mut position, decimals)?;
        refresh_position_shares(store, ctx.chain, shape, &bundle.pool, &mut position, decimals)?;
        store.save(&position);
    }

    account.operations += 1;
    bundle.pool.operations += 1;
    platform.operations += 1;

    let mut tx = transaction_for(store, ctx, TransactionKind::Claim, &bundle.pool.id, user);
    tx.kind = TransactionKind::Claim;
    tx.amount = staked_amount(&bundle, amount);
    store.save(&tx);

    refresh_bundle(ctx, &mut bundle, &mut platform)?;
    store.save(&account);
    settle(store, ctx, &bundle, &mut platform, false)
}
