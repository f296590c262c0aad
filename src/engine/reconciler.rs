//! Stake-lot reconciler.
//!
//! Keeps a position's locally stored lots in step with the reward module's
//! authoritative lot list. The module can truncate, shrink and (on claim)
//! merge lots, none of which the events describe, so each lifecycle event
//! re-reads the list and repairs the local copy:
//!
//! - stake: append the newest lot
//! - unstake: drop lots past the on-chain count, refresh the new tail; on
//!   modules without a lot list, shrink lots from the tail down to the
//!   module's aggregate
//! - claim: refresh the tail timestamp, or rebuild when counts disagree
//!
//! Afterwards the local lot count equals the on-chain count and the local
//! shares sum to the on-chain aggregate.

use super::modules::RewardShape;
use crate::chain::{ChainError, ChainReader, OnChainLot};
use crate::domain::{Decimal, Pool, Position, Stake, Timestamp, TxHash};
use crate::store::EntityStore;
use tracing::{debug, warn};

fn lot_stake(position: &Position, id: String, lot: &OnChainLot, decimals: u32) -> Stake {
    Stake {
        id,
        position: position.id.clone(),
        user: position.user.clone(),
        pool: position.pool.clone(),
        shares: Decimal::from_raw(lot.shares, decimals),
        timestamp: Timestamp::new(lot.timestamp),
    }
}

fn put_stake<S: EntityStore>(store: &mut S, position: &mut Position, stake: Stake) {
    if !position.stakes.contains(&stake.id) {
        position.stakes.push(stake.id.clone());
    }
    store.save(&stake);
}

/// Append the lot created by a Staked event.
///
/// Modules without a lot list get a single lot built from the event itself.
/// A retried event whose lot id already exists overwrites it.
#[allow(clippy::too_many_arguments)]
pub fn reconcile_stake<S: EntityStore, C: ChainReader + ?Sized>(
    store: &mut S,
    chain: &C,
    shape: &dyn RewardShape,
    pool: &Pool,
    position: &mut Position,
    tx_hash: &TxHash,
    event_shares: u128,
    now: Timestamp,
    decimals: u32,
) -> Result<(), ChainError> {
    let id = Stake::id_for_tx(&position.id, tx_hash);
    let stake = if shape.tracks_lots() {
        let count = chain.stake_count(&pool.reward_module, &position.user)?;
        let lot = chain.stake_at(&pool.reward_module, &position.user, count.saturating_sub(1))?;
        lot_stake(position, id, &lot, decimals)
    } else {
        let lot = OnChainLot {
            shares: event_shares,
            timestamp: now.as_secs(),
        };
        lot_stake(position, id, &lot, decimals)
    };
    put_stake(store, position, stake);
    Ok(())
}

/// Trim lots removed by an unstake and refresh the lot that became the tail.
pub fn reconcile_unstake<S: EntityStore, C: ChainReader + ?Sized>(
    store: &mut S,
    chain: &C,
    shape: &dyn RewardShape,
    pool: &Pool,
    position: &mut Position,
    decimals: u32,
) -> Result<(), ChainError> {
    if !shape.tracks_lots() {
        return trim_to_aggregate(store, chain, pool, position, decimals);
    }
    let count = chain.stake_count(&pool.reward_module, &position.user)?;

    while let Some(last) = position.stakes.last().cloned() {
        let index = position.stakes.len() - 1;
        if index >= count {
            store.remove::<Stake>(&last);
            position.stakes.pop();
            continue;
        }

        let lot = chain.stake_at(&pool.reward_module, &position.user, index)?;
        let mut stake = match store.load::<Stake>(&last) {
            Some(stake) => stake,
            None => {
                warn!(position = %position.id, index, stake = %last, "stake record missing, recreating");
                lot_stake(position, last.clone(), &lot, decimals)
            }
        };
        if stake.timestamp.as_secs() != lot.timestamp {
            warn!(
                pool = %pool.id,
                position = %position.id,
                index,
                stored = stake.timestamp.as_secs(),
                onchain = lot.timestamp,
                "stake timestamp disagrees with chain"
            );
            stake.timestamp = Timestamp::new(lot.timestamp);
        }
        stake.shares = Decimal::from_raw(lot.shares, decimals);
        store.save(&stake);
        break;
    }
    Ok(())
}

/// Consume lots newest first until they sum to the module's aggregate
/// shares, shrinking the last one partially consumed.
fn trim_to_aggregate<S: EntityStore, C: ChainReader + ?Sized>(
    store: &mut S,
    chain: &C,
    pool: &Pool,
    position: &mut Position,
    decimals: u32,
) -> Result<(), ChainError> {
    let target = Decimal::from_raw(
        chain.position_shares(&pool.reward_module, &position.user)?,
        decimals,
    );
    let mut held: Decimal = position
        .stakes
        .iter()
        .filter_map(|id| store.load::<Stake>(id))
        .map(|s| s.shares)
        .sum();

    while held > target {
        let Some(last) = position.stakes.last().cloned() else {
            break;
        };
        let Some(mut stake) = store.load::<Stake>(&last) else {
            position.stakes.pop();
            continue;
        };
        let excess = held - target;
        if stake.shares <= excess {
            held -= stake.shares;
            store.remove::<Stake>(&last);
            position.stakes.pop();
        } else {
            stake.shares -= excess;
            held = target;
            store.save(&stake);
        }
    }
    debug!(
        position = %position.id,
        lots = position.stakes.len(),
        shares = %held,
        "lots trimmed to aggregate"
    );
    Ok(())
}

/// Repair lots after a claim on shapes that merge lots; a no-op elsewhere.
pub fn reconcile_claim<S: EntityStore, C: ChainReader + ?Sized>(
    store: &mut S,
    chain: &C,
    shape: &dyn RewardShape,
    pool: &Pool,
    position: &mut Position,
    decimals: u32,
) -> Result<(), ChainError> {
    if !shape.rebuilds_lots_on_claim() {
        return Ok(());
    }
    let count = chain.stake_count(&pool.reward_module, &position.user)?;

    if count == position.stakes.len() && count > 0 {
        let lot = chain.stake_at(&pool.reward_module, &position.user, count - 1)?;
        let tail = &position.stakes[count - 1];
        let mut stake = store
            .load::<Stake>(tail)
            .unwrap_or_else(|| lot_stake(position, tail.clone(), &lot, decimals));
        stake.timestamp = Timestamp::new(lot.timestamp);
        store.save(&stake);
        return Ok(());
    }

    debug!(
        position = %position.id,
        local = position.stakes.len(),
        onchain = count,
        "rebuilding lots"
    );
    for id in position.stakes.drain(..) {
        store.remove::<Stake>(&id);
    }
    for index in 0..count {
        let lot = chain.stake_at(&pool.reward_module, &position.user, index)?;
        let stake = lot_stake(position, Stake::id_for_index(&position.id, index), &lot, decimals);
        put_stake(store, position, stake);
    }
    Ok(())
}

/// Recompute position shares from its lots, or from the module aggregate.
pub fn refresh_position_shares<S: EntityStore, C: ChainReader + ?Sized>(
    store: &S,
    chain: &C,
    shape: &dyn RewardShape,
    pool: &Pool,
    position: &mut Position,
    decimals: u32,
) -> Result<(), ChainError> {
    position.shares = if shape.aggregate_position_shares() {
        let raw = chain.position_shares(&pool.reward_module, &position.user)?;
        Decimal::from_raw(raw, decimals)
    } else {
        position
            .stakes
            .iter()
            .filter_map(|id| store.load::<Stake>(id))
            .map(|s| s.shares)
            .sum()
    };
    Ok(())
}

/// Delete an emptied position with any lots it still holds. Returns true if
/// it was removed, in which case the pool has lost a user.
pub fn close_if_empty<S: EntityStore>(store: &mut S, pool: &mut Pool, position: &Position) -> bool {
    if position.shares.is_positive() {
        return false;
    }
    for id in &position.stakes {
        store.remove::<Stake>(id);
    }
    store.remove::<Position>(&position.id);
    pool.users = pool.users.saturating_sub(1);
    debug!(pool = %pool.id, position = %position.id, "position closed");
    true
}

#[cfg(test)]
mod tests {
    use super::super::modules::shape_for;
    use super::super::test_support::*;
    use super::*;
    use crate::chain::StaticChain;
    use crate::domain::{Address, RewardModuleKind};
    use crate::store::MemoryStore;

    const USER: &str = "0xuser";

    fn lot(shares: u128, timestamp: i64) -> OnChainLot {
        OnChainLot { shares, timestamp }
    }

    fn setup() -> (StaticChain, Pool, Position, MemoryStore) {
        let chain = pool_chain();
        let pool = bundle(RewardModuleKind::Competitive).pool;
        let position = Position::new(&pool.id, &Address::new(USER));
        (chain, pool, position, MemoryStore::new())
    }

    fn stored_shares(store: &MemoryStore, position: &Position) -> Vec<Decimal> {
        position
            .stakes
            .iter()
            .map(|id| store.load::<Stake>(id).unwrap().shares)
            .collect()
    }

    #[test]
    fn test_stake_appends_newest_lot() {
        let (mut chain, pool, mut position, mut store) = setup();
        let shape = shape_for(RewardModuleKind::Competitive);
        chain.set_lots(REWARD_MODULE, USER, vec![lot(5, 10)]);
        reconcile_stake(&mut store, &chain, shape, &pool, &mut position, &TxHash::new("0xa"), 5, Timestamp::new(10), 0).unwrap();
        chain.set_lots(REWARD_MODULE, USER, vec![lot(5, 10), lot(7, 20)]);
        reconcile_stake(&mut store, &chain, shape, &pool, &mut position, &TxHash::new("0xb"), 7, Timestamp::new(20), 0).unwrap();
        // Retry of the second event.
        reconcile_stake(&mut store, &chain, shape, &pool, &mut position, &TxHash::new("0xb"), 7, Timestamp::new(20), 0).unwrap();

        assert_eq!(position.stakes.len(), 2);
        assert_eq!(stored_shares(&store, &position), vec![Decimal::from_u64(5), Decimal::from_u64(7)]);
        refresh_position_shares(&store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert_eq!(position.shares, Decimal::from_u64(12));
    }

    #[test]
    fn test_unstake_trims_tail_and_refreshes_new_tail() {
        let (mut chain, pool, mut position, mut store) = setup();
        let shape = shape_for(RewardModuleKind::Competitive);
        let mut lots = Vec::new();
        for (i, tx) in ["0x1", "0x2", "0x3"].iter().enumerate() {
            lots.push(lot(10, 100 + i as i64));
            chain.set_lots(REWARD_MODULE, USER, lots.clone());
            reconcile_stake(&mut store, &chain, shape, &pool, &mut position, &TxHash::new(*tx), 10, Timestamp::new(0), 0).unwrap();
        }

        // Unstake 15 shares: lot 2 is gone, lot 1 shrinks to 5.
        chain.set_lots(REWARD_MODULE, USER, vec![lot(10, 100), lot(5, 101)]);
        reconcile_unstake(&mut store, &chain, shape, &pool, &mut position, 0).unwrap();

        assert_eq!(position.stakes.len(), 2);
        assert!(store.load::<Stake>(&Stake::id_for_tx(&position.id, &TxHash::new("0x3"))).is_none());
        assert_eq!(stored_shares(&store, &position), vec![Decimal::from_u64(10), Decimal::from_u64(5)]);
    }

    #[test]
    fn test_unstake_timestamp_mismatch_takes_chain_value() {
        let (mut chain, pool, mut position, mut store) = setup();
        let shape = shape_for(RewardModuleKind::Competitive);
        chain.set_lots(REWARD_MODULE, USER, vec![lot(10, 100)]);
        reconcile_stake(&mut store, &chain, shape, &pool, &mut position, &TxHash::new("0x1"), 10, Timestamp::new(0), 0).unwrap();

        chain.set_lots(REWARD_MODULE, USER, vec![lot(4, 555)]);
        reconcile_unstake(&mut store, &chain, shape, &pool, &mut position, 0).unwrap();
        let stake = store.load::<Stake>(&position.stakes[0]).unwrap();
        assert_eq!(stake.timestamp, Timestamp::new(555));
        assert_eq!(stake.shares, Decimal::from_u64(4));
    }

    #[test]
    fn test_claim_with_equal_count_touches_only_tail_timestamp() {
        let (mut chain, pool, mut position, mut store) = setup();
        let shape = shape_for(RewardModuleKind::Vesting);
        chain.set_lots(REWARD_MODULE, USER, vec![lot(3, 1)]);
        reconcile_stake(&mut store, &chain, shape, &pool, &mut position, &TxHash::new("0x1"), 3, Timestamp::new(0), 0).unwrap();
        let ids = position.stakes.clone();

        chain.set_lots(REWARD_MODULE, USER, vec![lot(3, 99)]);
        reconcile_claim(&mut store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert_eq!(position.stakes, ids);
        assert_eq!(store.load::<Stake>(&ids[0]).unwrap().timestamp, Timestamp::new(99));
    }

    #[test]
    fn test_claim_after_merge_rebuilds_by_index() {
        let (mut chain, pool, mut position, mut store) = setup();
        let shape = shape_for(RewardModuleKind::Competitive);
        let mut lots = Vec::new();
        for (i, tx) in ["0x1", "0x2", "0x3"].iter().enumerate() {
            lots.push(lot(10, i as i64));
            chain.set_lots(REWARD_MODULE, USER, lots.clone());
            reconcile_stake(&mut store, &chain, shape, &pool, &mut position, &TxHash::new(*tx), 10, Timestamp::new(0), 0).unwrap();
        }

        chain.set_lots(REWARD_MODULE, USER, vec![lot(30, 50)]);
        reconcile_claim(&mut store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert_eq!(position.stakes, vec![Stake::id_for_index(&position.id, 0)]);
        assert_eq!(store.count(crate::store::EntityKind::Stake), 1);
        refresh_position_shares(&store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert_eq!(position.shares, Decimal::from_u64(30));
    }

    #[test]
    fn test_claim_is_noop_for_multi() {
        let (mut chain, pool, mut position, mut store) = setup();
        let shape = shape_for(RewardModuleKind::Multi);
        chain.set_lots(REWARD_MODULE, USER, vec![lot(3, 1)]);
        reconcile_claim(&mut store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert!(position.stakes.is_empty());
    }

    #[test]
    fn test_linear_uses_aggregate_and_event_lots() {
        let (mut chain, pool, mut position, mut store) = setup();
        let shape = shape_for(RewardModuleKind::Linear);
        chain.set_position_shares(REWARD_MODULE, USER, 42);
        reconcile_stake(&mut store, &chain, shape, &pool, &mut position, &TxHash::new("0x1"), 40, Timestamp::new(9), 0).unwrap();
        refresh_position_shares(&store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert_eq!(position.shares, Decimal::from_u64(42));
        let stake = store.load::<Stake>(&position.stakes[0]).unwrap();
        assert_eq!(stake.timestamp, Timestamp::new(9));
    }

    #[test]
    fn test_linear_unstake_shrinks_lots_to_aggregate() {
        let (mut chain, pool, mut position, mut store) = setup();
        let shape = shape_for(RewardModuleKind::Linear);
        for (i, shares) in [10u128, 20, 30].iter().enumerate() {
            let tx = TxHash::new(format!("0x{}", i));
            reconcile_stake(&mut store, &chain, shape, &pool, &mut position, &tx, *shares, Timestamp::new(i as i64), 0).unwrap();
        }
        let first_two: Vec<String> = position.stakes[..2].to_vec();
        let newest = position.stakes[2].clone();

        // 35 of 60 leave: the newest lot goes, the middle one keeps 5.
        chain.set_position_shares(REWARD_MODULE, USER, 25);
        reconcile_unstake(&mut store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert_eq!(position.stakes, first_two);
        assert!(store.load::<Stake>(&newest).is_none());
        assert_eq!(stored_shares(&store, &position), vec![Decimal::from_u64(10), Decimal::from_u64(5)]);
        refresh_position_shares(&store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert_eq!(position.shares, Decimal::from_u64(25));

        chain.set_position_shares(REWARD_MODULE, USER, 0);
        reconcile_unstake(&mut store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert!(position.stakes.is_empty());
        assert_eq!(store.count(crate::store::EntityKind::Stake), 0);
    }

    #[test]
    fn test_close_if_empty_removes_everything_once() {
        let (mut chain, mut pool, mut position, mut store) = setup();
        let shape = shape_for(RewardModuleKind::Competitive);
        pool.users = 3;
        chain.set_lots(REWARD_MODULE, USER, vec![lot(3, 1)]);
        reconcile_stake(&mut store, &chain, shape, &pool, &mut position, &TxHash::new("0x1"), 3, Timestamp::new(0), 0).unwrap();
        store.save(&position);

        refresh_position_shares(&store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert!(!close_if_empty(&mut store, &mut pool, &position));

        chain.set_lots(REWARD_MODULE, USER, vec![]);
        reconcile_unstake(&mut store, &chain, shape, &pool, &mut position, 0).unwrap();
        refresh_position_shares(&store, &chain, shape, &pool, &mut position, 0).unwrap();
        assert!(close_if_empty(&mut store, &mut pool, &position));
        assert_eq!(pool.users, 2);
        assert_eq!(store.count(crate::store::EntityKind::Stake), 0);
        assert!(store.load::<Position>(&position.id).is_none());
    }
}
