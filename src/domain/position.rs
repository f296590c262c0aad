//! Positions and the stake lots that make them up.

use super::{Address, Decimal, Timestamp, TxHash};
use serde::{Deserialize, Serialize};

/// One user's aggregate stake in one pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Position {
    pub id: String,
    pub user: Address,
    pub pool: Address,
    pub shares: Decimal,
    /// Stake ids in on-chain lot order.
    pub stakes: Vec<String>,
}

impl Position {
    pub fn id_for(pool: &Address, user: &Address) -> String {
        format!("{}_{}", pool, user)
    }

    pub fn new(pool: &Address, user: &Address) -> Self {
        Self {
            id: Self::id_for(pool, user),
            user: user.clone(),
            pool: pool.clone(),
            shares: Decimal::zero(),
            stakes: Vec::new(),
        }
    }
}

/// One stake lot, mirroring one on-chain lot entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stake {
    pub id: String,
    pub position: String,
    pub user: Address,
    pub pool: Address,
    pub shares: Decimal,
    pub timestamp: Timestamp,
}

impl Stake {
    /// Id of a lot appended by a stake transaction.
    pub fn id_for_tx(position: &str, tx_hash: &TxHash) -> String {
        format!("{}_{}", position, tx_hash)
    }

    /// Id of a lot rebuilt from the on-chain list.
    pub fn id_for_index(position: &str, index: usize) -> String {
        format!("{}_{}", position, index)
    }
}
