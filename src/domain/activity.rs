//! User, transaction and daily snapshot records.

use super::{Address, Decimal, Timestamp, TxHash};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: Address,
    pub operations: u64,
    /// USD value of rewards received.
    pub earned: Decimal,
    pub gysr_spent: Decimal,
}

impl User {
    pub fn new(id: Address) -> Self {
        Self {
            id,
            operations: 0,
            earned: Decimal::zero(),
            gysr_spent: Decimal::zero(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransactionKind {
    Stake,
    Unstake,
    Claim,
    Fund,
    Withdraw,
}

/// One user-facing pool transaction, keyed by transaction hash.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Transaction {
    pub id: TxHash,
    pub kind: TransactionKind,
    pub pool: Address,
    pub user: Address,
    pub amount: Decimal,
    /// Reward tokens distributed in this transaction.
    pub earnings: Decimal,
    pub gysr_spent: Decimal,
    pub block: u64,
    pub timestamp: Timestamp,
}

impl Transaction {
    pub fn new(
        id: TxHash,
        kind: TransactionKind,
        pool: Address,
        user: Address,
        block: u64,
        timestamp: Timestamp,
    ) -> Self {
        Self {
            id,
            kind,
            pool,
            user,
            amount: Decimal::zero(),
            earnings: Decimal::zero(),
            gysr_spent: Decimal::zero(),
            block,
            timestamp,
        }
    }
}

/// End-of-day view of a pool. Volume accumulates during the day, the rest is
/// overwritten on every refresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PoolDayData {
    pub id: String,
    pub pool: Address,
    pub day: i64,
    pub date: Timestamp,
    pub volume: Decimal,
    pub total_staked: Decimal,
    pub total_gysr_spent: Decimal,
    pub total_gysr_vested: Decimal,
    pub users: u64,
    pub tvl: Decimal,
    pub apr: Decimal,
    pub usage: Decimal,
}

impl PoolDayData {
    pub fn id_for(pool: &Address, now: Timestamp) -> String {
        format!("{}_{}", pool, now.day())
    }

    pub fn new(pool: &Address, now: Timestamp) -> Self {
        Self {
            id: Self::id_for(pool, now),
            pool: pool.clone(),
            day: now.day(),
            date: now.day_start(),
            volume: Decimal::zero(),
            total_staked: Decimal::zero(),
            total_gysr_spent: Decimal::zero(),
            total_gysr_vested: Decimal::zero(),
            users: 0,
            tvl: Decimal::zero(),
            apr: Decimal::zero(),
            usage: Decimal::zero(),
        }
    }
}
