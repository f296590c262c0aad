//! Entity store abstraction.
//!
//! Handlers read and write materialized records through [`EntityStore`].
//! Two implementations exist:
//! - [`MemoryStore`]: the full working set, loaded from SQLite at startup
//! - [`StagedStore`]: a per-event write overlay whose change set is committed
//!   atomically with the event cursor, or dropped on failure

use crate::domain::{
    Funding, Platform, Pool, PoolDayData, PoolRewardToken, PoolStakingToken, Position, Stake,
    Token, Transaction, User,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub mod memory;
pub mod staged;

pub use memory::MemoryStore;
pub use staged::{ChangeSet, StagedStore};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Token,
    Pool,
    PoolStakingToken,
    PoolRewardToken,
    Funding,
    Position,
    Stake,
    Platform,
    User,
    Transaction,
    PoolDayData,
}

impl EntityKind {
    pub const ALL: [EntityKind; 11] = [
        EntityKind::Token,
        EntityKind::Pool,
        EntityKind::PoolStakingToken,
        EntityKind::PoolRewardToken,
        EntityKind::Funding,
        EntityKind::Position,
        EntityKind::Stake,
        EntityKind::Platform,
        EntityKind::User,
        EntityKind::Transaction,
        EntityKind::PoolDayData,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Token => "token",
            EntityKind::Pool => "pool",
            EntityKind::PoolStakingToken => "pool_staking_token",
            EntityKind::PoolRewardToken => "pool_reward_token",
            EntityKind::Funding => "funding",
            EntityKind::Position => "position",
            EntityKind::Stake => "stake",
            EntityKind::Platform => "platform",
            EntityKind::User => "user",
            EntityKind::Transaction => "transaction",
            EntityKind::PoolDayData => "pool_day_data",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntityKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EntityKind::ALL
            .iter()
            .copied()
            .find(|k| k.as_str() == s)
            .ok_or_else(|| format!("unknown entity kind: {}", s))
    }
}

/// Any stored record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Record {
    Token(Token),
    Pool(Pool),
    PoolStakingToken(PoolStakingToken),
    PoolRewardToken(PoolRewardToken),
    Funding(Funding),
    Position(Position),
    Stake(Stake),
    Platform(Platform),
    User(User),
    Transaction(Transaction),
    PoolDayData(PoolDayData),
}

impl Record {
    pub fn kind(&self) -> EntityKind {
        match self {
            Record::Token(_) => EntityKind::Token,
            Record::Pool(_) => EntityKind::Pool,
            Record::PoolStakingToken(_) => EntityKind::PoolStakingToken,
            Record::PoolRewardToken(_) => EntityKind::PoolRewardToken,
            Record::Funding(_) => EntityKind::Funding,
            Record::Position(_) => EntityKind::Position,
            Record::Stake(_) => EntityKind::Stake,
            Record::Platform(_) => EntityKind::Platform,
            Record::User(_) => EntityKind::User,
            Record::Transaction(_) => EntityKind::Transaction,
            Record::PoolDayData(_) => EntityKind::PoolDayData,
        }
    }

    pub fn id(&self) -> String {
        match self {
            Record::Token(e) => e.entity_id(),
            Record::Pool(e) => e.entity_id(),
            Record::PoolStakingToken(e) => e.entity_id(),
            Record::PoolRewardToken(e) => e.entity_id(),
            Record::Funding(e) => e.entity_id(),
            Record::Position(e) => e.entity_id(),
            Record::Stake(e) => e.entity_id(),
            Record::Platform(e) => e.entity_id(),
            Record::User(e) => e.entity_id(),
            Record::Transaction(e) => e.entity_id(),
            Record::PoolDayData(e) => e.entity_id(),
        }
    }

    /// Canonical JSON body, as persisted.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        match self {
            Record::Token(e) => serde_json::to_string(e),
            Record::Pool(e) => serde_json::to_string(e),
            Record::PoolStakingToken(e) => serde_json::to_string(e),
            Record::PoolRewardToken(e) => serde_json::to_string(e),
            Record::Funding(e) => serde_json::to_string(e),
            Record::Position(e) => serde_json::to_string(e),
            Record::Stake(e) => serde_json::to_string(e),
            Record::Platform(e) => serde_json::to_string(e),
            Record::User(e) => serde_json::to_string(e),
            Record::Transaction(e) => serde_json::to_string(e),
            Record::PoolDayData(e) => serde_json::to_string(e),
        }
    }

    pub fn from_json(kind: EntityKind, body: &str) -> Result<Record, serde_json::Error> {
        Ok(match kind {
            EntityKind::Token => Record::Token(serde_json::from_str(body)?),
            EntityKind::Pool => Record::Pool(serde_json::from_str(body)?),
            EntityKind::PoolStakingToken => Record::PoolStakingToken(serde_json::from_str(body)?),
            EntityKind::PoolRewardToken => Record::PoolRewardToken(serde_json::from_str(body)?),
            EntityKind::Funding => Record::Funding(serde_json::from_str(body)?),
            EntityKind::Position => Record::Position(serde_json::from_str(body)?),
            EntityKind::Stake => Record::Stake(serde_json::from_str(body)?),
            EntityKind::Platform => Record::Platform(serde_json::from_str(body)?),
            EntityKind::User => Record::User(serde_json::from_str(body)?),
            EntityKind::Transaction => Record::Transaction(serde_json::from_str(body)?),
            EntityKind::PoolDayData => Record::PoolDayData(serde_json::from_str(body)?),
        })
    }
}

/// A record type the store can hold.
pub trait Entity: Clone + Sized {
    const KIND: EntityKind;

    fn entity_id(&self) -> String;
    fn into_record(self) -> Record;
    fn from_record(record: Record) -> Option<Self>;
}

macro_rules! impl_entity {
    ($ty:ident, |$e:ident| $id:expr) => {
        impl Entity for $ty {
            const KIND: EntityKind = EntityKind::$ty;

            fn entity_id(&self) -> String {
                let $e = self;
                $id
            }

            fn into_record(self) -> Record {
                Record::$ty(self)
            }

            fn from_record(record: Record) -> Option<Self> {
                match record {
                    Record::$ty(e) => Some(e),
                    _ => None,
                }
            }
        }
    };
}

impl_entity!(Token, |e| e.id.to_string());
impl_entity!(Pool, |e| e.id.to_string());
impl_entity!(PoolStakingToken, |e| e.id.clone());
impl_entity!(PoolRewardToken, |e| e.id.clone());
impl_entity!(Funding, |e| e.id.clone());
impl_entity!(Position, |e| e.id.clone());
impl_entity!(Stake, |e| e.id.clone());
impl_entity!(Platform, |e| e.id.clone());
impl_entity!(User, |e| e.id.to_string());
impl_entity!(Transaction, |e| e.id.to_string());
impl_entity!(PoolDayData, |e| e.id.clone());

/// Synchronous key-value store of materialized records.
///
/// Loads return owned copies; a record changes only when saved back.
pub trait EntityStore {
    fn get(&self, kind: EntityKind, id: &str) -> Option<Record>;
    fn put(&mut self, record: Record);
    fn delete(&mut self, kind: EntityKind, id: &str);
    /// All ids of one kind, in ascending order.
    fn ids(&self, kind: EntityKind) -> Vec<String>;

    fn load<E: Entity>(&self, id: &str) -> Option<E>
    where
        Self: Sized,
    {
        self.get(E::KIND, id).and_then(E::from_record)
    }

    fn save<E: Entity>(&mut self, entity: &E)
    where
        Self: Sized,
    {
        self.put(entity.clone().into_record());
    }

    fn remove<E: Entity>(&mut self, id: &str)
    where
        Self: Sized,
    {
        self.delete(E::KIND, id);
    }

    /// The platform singleton, created on first reference.
    fn load_platform(&self) -> Platform
    where
        Self: Sized,
    {
        self.load::<Platform>(Platform::ID).unwrap_or_default()
    }
}
