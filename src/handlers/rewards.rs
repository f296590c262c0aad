use super::{record_volume, refresh_bundle, settle, transaction_for, user_or_new, EventContext};
use crate::chain::ChainReader;
use crate::domain::{pool_token_id, Address, Decimal, Timestamp, TransactionKind};
use crate::engine::{day_snapshot, shape_for, Funded, PoolBundle};
use crate::error::HandlerError;
use crate::pricing::load_or_create_token;
use crate::store::EntityStore;
use tracing::{debug, info};

/// GYSR amounts are always 18-decimal.
const GYSR_DECIMALS: u32 = 18;

fn reward_join_missing(bundle: &PoolBundle, token: &Address) -> HandlerError {
    HandlerError::missing("pool_reward_token", pool_token_id(&bundle.pool.id, token))
}

pub(super) fn funded<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    token: &Address,
    amount: u128,
    shares: u128,
    start: Timestamp,
) -> Result<(), HandlerError> {
    let mut bundle = ctx.load_bundle(store)?;
    let mut platform = store.load_platform();
    let shape = shape_for(bundle.pool.reward_module_kind);

    let value = Decimal::from_raw(amount, bundle.decimals(token));
    match bundle.reward_join_mut(token) {
        Some(join) => join.funded += value,
        None => return Err(reward_join_missing(&bundle, token)),
    }
    bundle.pool.funded += value;

    shape.on_funded(
        ctx.chain,
        &mut bundle,
        &Funded {
            token: token.clone(),
            amount,
            shares,
            start,
            created: ctx.now(),
            log_index: ctx.event.log_index,
        },
    )?;

    let mut tx = transaction_for(
        store,
        ctx,
        TransactionKind::Fund,
        &bundle.pool.id,
        &bundle.pool.owner,
    );
    tx.amount = value;
    store.save(&tx);

    refresh_bundle(ctx, &mut bundle, &mut platform)?;
    settle(store, ctx, &bundle, &mut platform, true)
}

/// Mark the expired schedule cleaned: same token, start and amount, already
/// ended, not yet cleaned. Only the first match is touched.
pub(super) fn expired<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    token: &Address,
    amount: u128,
    start: Timestamp,
) -> Result<(), HandlerError> {
    let mut bundle = ctx.load_bundle(store)?;
    let value = Decimal::from_raw(amount, bundle.decimals(token));
    let now = ctx.now();

    let matched = bundle.fundings.iter().find(|f| {
        &f.token == token
            && f.start == start
            && f.original_amount == value
            && f.end < now
            && !f.cleaned
    });
    match matched.cloned() {
        Some(mut funding) => {
            funding.cleaned = true;
            info!(pool = %bundle.pool.id, funding = %funding.id, "funding expired");
            bundle.upsert_funding(funding);
        }
        None => debug!(pool = %bundle.pool.id, start = %start, "no funding matched expiry"),
    }

    let mut platform = store.load_platform();
    refresh_bundle(ctx, &mut bundle, &mut platform)?;
    settle(store, ctx, &bundle, &mut platform, false)
}

pub(super) fn withdrawn<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    token: &Address,
    amount: u128,
) -> Result<(), HandlerError> {
    let mut bundle = ctx.load_bundle(store)?;
    let mut platform = store.load_platform();

    let value = Decimal::from_raw(amount, bundle.decimals(token));
    match bundle.reward_join_mut(token) {
        Some(join) => join.withdrawn += value,
        None => return Err(reward_join_missing(&bundle, token)),
    }

    let mut tx = transaction_for(
        store,
        ctx,
        TransactionKind::Withdraw,
        &bundle.pool.id,
        &bundle.pool.owner,
    );
    tx.amount = value;
    store.save(&tx);

    refresh_bundle(ctx, &mut bundle, &mut platform)?;
    settle(store, ctx, &bundle, &mut platform, false)
}

pub(super) fn distributed<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    user: &Address,
    token: &Address,
    amount: u128,
) -> Result<(), HandlerError> {
    let mut bundle = ctx.load_bundle(store)?;
    let mut platform = store.load_platform();
    let now = ctx.now();

    let value = Decimal::from_raw(amount, bundle.decimals(token));
    let price = match bundle.tokens.get_mut(token) {
        Some(record) => {
            let quote = ctx.pass().quote(record);
            record.price = quote.price;
            record.hint = quote.hint.to_string();
            record.updated = now;
            store.save(&*record);
            quote.price
        }
        None => return Err(HandlerError::missing("token", token.as_str())),
    };
    match bundle.reward_join_mut(token) {
        Some(join) => join.distributed += value,
        None => return Err(reward_join_missing(&bundle, token)),
    }
    bundle.pool.distributed += value;

    let usd = value.safe_mul(price);
    let mut pool = bundle.pool;
    record_volume(store, &mut pool, &mut platform, usd, now);
    platform.rewards_volume += usd;

    let mut account = user_or_new(store, &mut platform, user);
    account.earned += usd;

    let mut tx = transaction_for(store, ctx, TransactionKind::Claim, &pool.id, user);
    tx.earnings += value;

    for join in &bundle.rewards {
        store.save(join);
    }
    store.save(&pool);
    store.save(&tx);
    store.save(&account);
    store.save(&platform);
    Ok(())
}

pub(super) fn gysr_spent<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    user: &Address,
    amount: u128,
) -> Result<(), HandlerError> {
    let mut pool = ctx.load_pool(store)?;
    let mut platform = store.load_platform();
    let now = ctx.now();

    let value = Decimal::from_raw(amount, GYSR_DECIMALS);
    pool.gysr_spent += value;
    platform.gysr_spent += value;

    let mut gysr = load_or_create_token(
        store,
        ctx.chain,
        ctx.deployment,
        &ctx.deployment.gysr_token,
        now,
    );
    let quote = ctx.pass().quote(&gysr);
    gysr.price = quote.price;
    gysr.hint = quote.hint.to_string();
    gysr.updated = now;
    store.save(&gysr);

    record_volume(store, &mut pool, &mut platform, gysr.usd(value), now);

    let mut account = user_or_new(store, &mut platform, user);
    account.gysr_spent += value;

    let mut tx = transaction_for(store, ctx, TransactionKind::Unstake, &pool.id, user);
    tx.gysr_spent += value;

    let day = day_snapshot(store, &pool, now);
    store.save(&day);
    store.save(&pool);
    store.save(&tx);
    store.save(&account);
    store.save(&platform);
    Ok(())
}

pub(super) fn gysr_vested<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    amount: u128,
) -> Result<(), HandlerError> {
    let mut pool = ctx.load_pool(store)?;
    let mut platform = store.load_platform();

    let value = Decimal::from_raw(amount, GYSR_DECIMALS);
    pool.gysr_vested += value;
    platform.gysr_vested += value;
    // Fee rate is treated as constant over time.
    platform.gysr_fees += value.safe_mul(ctx.deployment.gysr_fee);

    let day = day_snapshot(store, &pool, ctx.now());
    store.save(&day);
    store.save(&pool);
    store.save(&platform);
    Ok(())
}
