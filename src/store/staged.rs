//! Per-event write overlay.

use super::{EntityKind, EntityStore, MemoryStore, Record};
use std::collections::BTreeMap;

/// Writes made while applying one event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    pub upserts: Vec<Record>,
    pub deletes: Vec<(EntityKind, String)>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.upserts.is_empty() && self.deletes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.upserts.len() + self.deletes.len()
    }
}

/// Reads fall through to the base store; writes stay in the overlay until
/// [`StagedStore::into_changes`] hands them to the committer.
pub struct StagedStore<'a> {
    base: &'a MemoryStore,
    // None marks a deletion.
    writes: BTreeMap<(EntityKind, String), Option<Record>>,
}

impl<'a> StagedStore<'a> {
    pub fn new(base: &'a MemoryStore) -> Self {
        Self {
            base,
            writes: BTreeMap::new(),
        }
    }

    pub fn into_changes(self) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for ((kind, id), write) in self.writes {
            match write {
                Some(record) => changes.upserts.push(record),
                None => changes.deletes.push((kind, id)),
            }
        }
        changes
    }
}

impl EntityStore for StagedStore<'_> {
    fn get(&self, kind: EntityKind, id: &str) -> Option<Record> {
        match self.writes.get(&(kind, id.to_string())) {
            Some(write) => write.clone(),
            None => self.base.get(kind, id),
        }
    }

    fn put(&mut self, record: Record) {
        self.writes
            .insert((record.kind(), record.id()), Some(record));
    }

    fn delete(&mut self, kind: EntityKind, id: &str) {
        self.writes.insert((kind, id.to_string()), None);
    }

    fn ids(&self, kind: EntityKind) -> Vec<String> {
        let mut ids: Vec<String> = self
            .base
            .ids(kind)
            .into_iter()
            .filter(|id| !matches!(self.writes.get(&(kind, id.clone())), Some(None)))
            .collect();
        for ((k, id), write) in &self.writes {
            if *k == kind && write.is_some() && !ids.contains(id) {
                ids.push(id.clone());
            }
        }
        ids.sort();
        ids
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, Token, TokenKind};

    fn token(id: &str) -> Token {
        Token::new(Address::new(id), 18, TokenKind::Standard)
    }

    #[test]
    fn test_overlay_reads_own_writes() {
        let mut base = MemoryStore::new();
        base.save(&token("0xaa"));

        let mut staged = StagedStore::new(&base);
        let mut updated = token("0xaa");
        updated.symbol = "AA".to_string();
        staged.save(&updated);
        staged.save(&token("0xbb"));
        staged.remove::<Token>("0xaa");

        assert!(staged.load::<Token>("0xaa").is_none());
        assert!(staged.load::<Token>("0xbb").is_some());
        assert_eq!(staged.ids(EntityKind::Token), vec!["0xbb".to_string()]);
        // Base untouched until the change set is applied.
        assert!(base.load::<Token>("0xaa").is_some());
    }

    #[test]
    fn test_changes_apply_to_base() {
        let mut base = MemoryStore::new();
        base.save(&token("0xaa"));

        let changes = {
            let mut staged = StagedStore::new(&base);
            staged.save(&token("0xbb"));
            staged.remove::<Token>("0xaa");
            staged.into_changes()
        };
        assert_eq!(changes.len(), 2);

        base.apply(changes);
        assert!(base.load::<Token>("0xaa").is_none());
        assert!(base.load::<Token>("0xbb").is_some());
    }

    #[test]
    fn test_dropped_overlay_leaves_base_untouched() {
        let base = MemoryStore::new();
        let before = base.digest();
        {
            let mut staged = StagedStore::new(&base);
            staged.save(&token("0xcc"));
        }
        assert_eq!(base.digest(), before);
    }
}
