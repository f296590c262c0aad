use super::{user_or_new, EventContext};
use crate::chain::ChainReader;
use crate::domain::{
    Address, Pool, PoolRewardToken, PoolStakingToken, RewardModuleKind, StakingModuleKind,
};
use crate::error::HandlerError;
use crate::pricing::load_or_create_token;
use crate::store::EntityStore;
use tracing::{debug, info};

/// Fields of a PoolCreated log.
pub(super) struct NewPool<'e> {
    pub pool: &'e Address,
    pub owner: &'e Address,
    pub staking_module: &'e Address,
    pub reward_module: &'e Address,
    pub staking_module_kind: StakingModuleKind,
    pub reward_module_kind: RewardModuleKind,
    pub staking_tokens: &'e [Address],
    pub reward_tokens: &'e [Address],
}

pub(super) fn pool_created<S: EntityStore, C: ChainReader>(
    store: &mut S,
    ctx: &EventContext<'_, C>,
    new: NewPool<'_>,
) -> Result<(), HandlerError> {
    if store.load::<Pool>(new.pool.as_str()).is_some() {
        debug!(pool = %new.pool, "pool already indexed");
        return Ok(());
    }
    let now = ctx.now();
    let mut platform = store.load_platform();

    let mut pool = Pool::new(
        new.pool.clone(),
        new.owner.clone(),
        ctx.event.block.number,
        now,
    );
    pool.staking_module = new.staking_module.clone();
    pool.reward_module = new.reward_module.clone();
    pool.staking_module_kind = new.staking_module_kind;
    pool.reward_module_kind = new.reward_module_kind;

    for address in new.staking_tokens.iter().chain(new.reward_tokens) {
        let token = load_or_create_token(store, ctx.chain, ctx.deployment, address, now);
        store.save(&token);
    }
    for address in new.staking_tokens {
        let join = PoolStakingToken::new(&pool.id, address);
        pool.staking_tokens.push(join.id.clone());
        store.save(&join);
    }
    for address in new.reward_tokens {
        let join = PoolRewardToken::new(&pool.id, address);
        pool.reward_tokens.push(join.id.clone());
        store.save(&join);
    }

    let owner = user_or_new(store, &mut platform, new.owner);
    platform.pools += 1;

    info!(
        pool = %pool.id,
        owner = %pool.owner,
        staking = ?pool.staking_module_kind,
        reward = ?pool.reward_module_kind,
        "pool created"
    );
    store.save(&pool);
    store.save(&owner);
    store.save(&platform);
    Ok(())
}
