//! Canonical event ordering for deterministic processing.

use crate::domain::ChainEvent;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Position of an event in canonical chain order.
///
/// Ordering: block number -> log index. The indexer persists the cursor of
/// the last applied event and resumes strictly after it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EventCursor {
    pub block: u64,
    pub log_index: u32,
}

impl EventCursor {
    pub fn new(block: u64, log_index: u32) -> Self {
        Self { block, log_index }
    }

    /// True if `event` comes strictly after this cursor.
    pub fn precedes(&self, event: &ChainEvent) -> bool {
        *self < event.cursor()
    }
}

impl fmt::Display for EventCursor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.block, self.log_index)
    }
}

/// Sort events into canonical order. Stable for duplicate cursors.
pub fn sort_events_canonical(events: &mut [ChainEvent]) {
    events.sort_by_key(|e| e.cursor());
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, BlockRef, EventKind, TxHash};

    fn event(block: u64, log_index: u32) -> ChainEvent {
        ChainEvent {
            block: BlockRef::new(block, block as i64 * 12),
            tx_hash: TxHash::new(format!("0x{}", block)),
            log_index,
            address: Address::zero(),
            kind: EventKind::Heartbeat,
        }
    }

    #[test]
    fn test_sort_by_block_then_log_index() {
        let mut events = vec![event(2, 0), event(1, 5), event(1, 2)];
        sort_events_canonical(&mut events);
        let cursors: Vec<_> = events.iter().map(|e| e.cursor()).collect();
        assert_eq!(
            cursors,
            vec![
                EventCursor::new(1, 2),
                EventCursor::new(1, 5),
                EventCursor::new(2, 0)
            ]
        );
    }

    #[test]
    fn test_cursor_precedes() {
        let cursor = EventCursor::new(1, 5);
        assert!(!cursor.precedes(&event(1, 5)));
        assert!(!cursor.precedes(&event(1, 4)));
        assert!(cursor.precedes(&event(1, 6)));
        assert!(cursor.precedes(&event(2, 0)));
    }
}
