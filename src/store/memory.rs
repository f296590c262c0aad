//! In-memory working set.

use super::{ChangeSet, EntityKind, EntityStore, Record};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;

/// Every record, ordered by (kind, id) so iteration is deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MemoryStore {
    records: BTreeMap<(EntityKind, String), Record>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_records(records: impl IntoIterator<Item = Record>) -> Self {
        let mut store = Self::new();
        for record in records {
            store.put(record);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn count(&self, kind: EntityKind) -> usize {
        self.records.keys().filter(|(k, _)| *k == kind).count()
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Fold a committed change set into the working set.
    pub fn apply(&mut self, changes: ChangeSet) {
        for (kind, id) in changes.deletes {
            self.records.remove(&(kind, id));
        }
        for record in changes.upserts {
            self.put(record);
        }
    }

    /// SHA-256 over the canonical serialization of every record.
    ///
    /// Two stores built from the same ordered event sequence have equal digests.
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        for ((kind, id), record) in &self.records {
            hasher.update(kind.as_str().as_bytes());
            hasher.update(b"|");
            hasher.update(id.as_bytes());
            hasher.update(b"|");
            let body = record.to_json().unwrap_or_default();
            hasher.update(body.as_bytes());
            hasher.update(b"\n");
        }
        hex::encode(hasher.finalize())
    }
}

impl EntityStore for MemoryStore {
    fn get(&self, kind: EntityKind, id: &str) -> Option<Record> {
        self.records.get(&(kind, id.to_string())).cloned()
    }

    fn put(&mut self, record: Record) {
        self.records.insert((record.kind(), record.id()), record);
    }

    fn delete(&mut self, kind: EntityKind, id: &str) {
        self.records.remove(&(kind, id.to_string()));
    }

    fn ids(&self, kind: EntityKind) -> Vec<String> {
        self.records
            .keys()
            .filter(|(k, _)| *k == kind)
            .map(|(_, id)| id.clone())
            .collect()
    }
}
