//! Recorded event log on disk: JSON lines, optionally lz4-framed.

use super::{page, EventSource, EventSourceError};
use crate::domain::{sort_events_canonical, ChainEvent, EventCursor};
use async_trait::async_trait;
use std::io::Read;
use std::path::Path;
use tracing::info;

/// Replays a `.jsonl` or `.jsonl.lz4` file, one [`ChainEvent`] per line.
#[derive(Debug, Clone)]
pub struct FileEventSource {
    events: Vec<ChainEvent>,
}

impl FileEventSource {
    /// Read and decode the whole file. Blank lines are skipped.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, EventSourceError> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| EventSourceError::Io(format!("{}: {}", path.display(), e)))?;
        let text = if path.extension().is_some_and(|ext| ext == "lz4") {
            decompress_lz4_frame(&bytes)?
        } else {
            bytes
        };
        let source = Self::from_jsonl(&text)?;
        info!(
            path = %path.display(),
            events = source.events.len(),
            "loaded event file"
        );
        Ok(source)
    }

    pub fn from_jsonl(bytes: &[u8]) -> Result<Self, EventSourceError> {
        let text = std::str::from_utf8(bytes)
            .map_err(|e| EventSourceError::ParseError(e.to_string()))?;
        let mut events = Vec::new();
        for (n, line) in text.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            let event: ChainEvent = serde_json::from_str(line)
                .map_err(|e| EventSourceError::ParseError(format!("line {}: {}", n + 1, e)))?;
            events.push(event);
        }
        sort_events_canonical(&mut events);
        Ok(Self { events })
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

pub fn decompress_lz4_frame(lz4_bytes: &[u8]) -> Result<Vec<u8>, EventSourceError> {
    let mut decoder = lz4_flex::frame::FrameDecoder::new(lz4_bytes);
    let mut out = Vec::new();
    decoder
        .read_to_end(&mut out)
        .map_err(|e| EventSourceError::Io(format!("lz4: {}", e)))?;
    Ok(out)
}

#[async_trait]
impl EventSource for FileEventSource {
    async fn fetch_events(
        &self,
        after: Option<EventCursor>,
        limit: usize,
    ) -> Result<Vec<ChainEvent>, EventSourceError> {
        Ok(page(&self.events, after, limit))
    }
}
