//! The single cross-pool aggregate.

use super::{Address, Decimal, Timestamp};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Platform {
    pub id: String,
    pub tvl: Decimal,
    pub staked_usd: Decimal,
    pub rewards_usd: Decimal,
    pub users: u64,
    pub pools: u64,
    pub operations: u64,
    pub gysr_spent: Decimal,
    pub gysr_vested: Decimal,
    pub gysr_fees: Decimal,
    pub volume: Decimal,
    pub rewards_volume: Decimal,
    /// Pools refreshed by the sweep, in admission order.
    pub active_pools: Vec<Address>,
    /// Time of the last completed sweep.
    pub updated: Timestamp,
}

impl Platform {
    pub const ID: &'static str = "platform";

    pub fn new() -> Self {
        Self {
            id: Self::ID.to_string(),
            tvl: Decimal::zero(),
            staked_usd: Decimal::zero(),
            rewards_usd: Decimal::zero(),
            users: 0,
            pools: 0,
            operations: 0,
            gysr_spent: Decimal::zero(),
            gysr_vested: Decimal::zero(),
            gysr_fees: Decimal::zero(),
            volume: Decimal::zero(),
            rewards_volume: Decimal::zero(),
            active_pools: Vec::new(),
            updated: Timestamp::default(),
        }
    }

    pub fn is_active(&self, pool: &Address) -> bool {
        self.active_pools.contains(pool)
    }
}

impl Default for Platform {
    fn default() -> Self {
        Self::new()
    }
}
