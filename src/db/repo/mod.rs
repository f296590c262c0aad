//! Repository layer for database operations.
//!
//! Methods are organized across submodules:
//! - `entities.rs` - record loading and the per-event commit
//! - `cursor.rs` - the resume cursor

mod cursor;
mod entities;

use crate::store::{EntityKind, Record};
use sqlx::sqlite::SqlitePool;

/// One persisted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRow {
    pub kind: EntityKind,
    pub id: String,
    pub body: String,
}

impl EntityRow {
    pub fn encode(record: &Record) -> Result<Self, serde_json::Error> {
        Ok(Self {
            kind: record.kind(),
            id: record.id(),
            body: record.to_json()?,
        })
    }

    pub fn decode(&self) -> Result<Record, serde_json::Error> {
        Record::from_json(self.kind, &self.body)
    }
}

/// Everything one applied event writes, ready to commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventWrite {
    pub upserts: Vec<EntityRow>,
    pub deletes: Vec<(EntityKind, String)>,
}

/// Repository for database operations.
#[derive(Debug, Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Repository { pool }
    }
}
