//! Mock event source for testing without files or network calls.

use super::{page, EventSource, EventSourceError};
use crate::domain::{sort_events_canonical, ChainEvent, EventCursor};
use async_trait::async_trait;

/// Mock event source that serves predefined events.
#[derive(Debug, Clone, Default)]
pub struct MockEventSource {
    events: Vec<ChainEvent>,
    fail_with: Option<EventSourceError>,
}

impl MockEventSource {
    /// Create a new mock event source with no events.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one event.
    pub fn with_event(mut self, event: ChainEvent) -> Self {
        self.events.push(event);
        sort_events_canonical(&mut self.events);
        self
    }

    /// Add several events.
    pub fn with_events(mut self, events: Vec<ChainEvent>) -> Self {
        self.events.extend(events);
        sort_events_canonical(&mut self.events);
        self
    }

    /// Make every fetch fail with `err`.
    pub fn failing(mut self, err: EventSourceError) -> Self {
        self.fail_with = Some(err);
        self
    }
}

#[async_trait]
impl EventSource for MockEventSource {
    async fn fetch_events(
        &self,
        after: Option<EventCursor>,
        limit: usize,
    ) -> Result<Vec<ChainEvent>, EventSourceError> {
        if let Some(err) = &self.fail_with {
            return Err(err.clone());
        }
        Ok(page(&self.events, after, limit))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{Address, BlockRef, EventKind, TxHash};

    fn tick(block: u64) -> ChainEvent {
        ChainEvent {
            block: BlockRef::new(block, block as i64 * 12),
            tx_hash: TxHash::new(format!("0x{}", block)),
            log_index: 0,
            address: Address::zero(),
            kind: EventKind::Heartbeat,
        }
    }

    #[tokio::test]
    async fn test_mock_pages_in_order() {
        let mock = MockEventSource::new().with_events(vec![tick(3), tick(1), tick(2)]);
        let events = mock.fetch_events(Some(EventCursor::new(1, 0)), 5).await.unwrap();
        let blocks: Vec<_> = events.iter().map(|e| e.block.number).collect();
        assert_eq!(blocks, vec![2, 3]);
    }

    #[tokio::test]
    async fn test_mock_failure() {
        let mock = MockEventSource::new()
            .with_event(tick(1))
            .failing(EventSourceError::RateLimited);
        let err = mock.fetch_events(None, 5).await.unwrap_err();
        assert!(matches!(err, EventSourceError::RateLimited));
    }
}
