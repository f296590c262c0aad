//! Event source abstraction for pulling decoded chain events.

use crate::domain::{ChainEvent, EventCursor};
use async_trait::async_trait;
use std::fmt;

pub mod file;
pub mod http;
pub mod mock;

pub use file::FileEventSource;
pub use http::HttpEventSource;
pub use mock::MockEventSource;

/// Ordered supply of chain events.
///
/// Implementations must return events in canonical order and handle their
/// own pagination, retry/backoff and rate limiting.
#[async_trait]
pub trait EventSource: Send + Sync + fmt::Debug {
    /// Fetch at most `limit` events strictly after `after` (from the start
    /// when `None`), in canonical order. An empty batch means drained.
    async fn fetch_events(
        &self,
        after: Option<EventCursor>,
        limit: usize,
    ) -> Result<Vec<ChainEvent>, EventSourceError>;
}

/// Error type for event source operations.
#[derive(Debug, Clone)]
pub enum EventSourceError {
    /// Network error (e.g., connection timeout, DNS failure)
    NetworkError(String),
    /// HTTP error (e.g., 429 rate limit, 5xx server error)
    HttpError { status: u16, message: String },
    /// Parsing error (invalid JSON or malformed event)
    ParseError(String),
    /// Rate limit exceeded (caller should implement backoff)
    RateLimited,
    /// Local file could not be read or decompressed
    Io(String),
}

impl fmt::Display for EventSourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventSourceError::NetworkError(msg) => write!(f, "Network error: {}", msg),
            EventSourceError::HttpError { status, message } => {
                write!(f, "HTTP error {}: {}", status, message)
            }
            EventSourceError::ParseError(msg) => write!(f, "Parse error: {}", msg),
            EventSourceError::RateLimited => write!(f, "Rate limited"),
            EventSourceError::Io(msg) => write!(f, "I/O error: {}", msg),
        }
    }
}

impl std::error::Error for EventSourceError {}

/// Events strictly after `after`, capped at `limit`. Input must be sorted.
pub(crate) fn page(events: &[ChainEvent], after: Option<EventCursor>, limit: usize) -> Vec<ChainEvent> {
    let start = match after {
        Some(cursor) => events.partition_point(|e| e.cursor() <= cursor),
        None => 0,
    };
    events.iter().skip(start).take(limit).cloned().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_source_error_display() {
        let err = EventSourceError::NetworkError("connection timeout".to_string());
        assert_eq!(err.to_string(), "Network error: connection timeout");

        let err = EventSourceError::HttpError {
            status: 429,
            message: "Too many requests".to_string(),
        };
        assert_eq!(err.to_string(), "HTTP error 429: Too many requests");

        let err = EventSourceError::ParseError("invalid JSON".to_string());
        assert_eq!(err.to_string(), "Parse error: invalid JSON");

        assert_eq!(EventSourceError::RateLimited.to_string(), "Rate limited");
    }
}
