use crate::chain::ChainError;
use crate::config::ConfigError;
use crate::domain::{Address, EventCursor};
use crate::datasource::EventSourceError;
use thiserror::Error;

/// Failure while applying one event. Nothing from the event is committed.
#[derive(Debug, Error)]
pub enum HandlerError {
    #[error(transparent)]
    Chain(#[from] ChainError),
    #[error("pool not indexed: {0}")]
    UnknownPool(Address),
    #[error("missing {kind} record {id}")]
    MissingRecord { kind: &'static str, id: String },
}

impl HandlerError {
    pub fn missing(kind: &'static str, id: impl Into<String>) -> Self {
        HandlerError::MissingRecord {
            kind,
            id: id.into(),
        }
    }
}

#[derive(Debug, Error)]
pub enum IndexerError {
    #[error("event {cursor} ({event}) failed: {source}")]
    Handler {
        cursor: EventCursor,
        event: &'static str,
        #[source]
        source: HandlerError,
    },
    #[error("event source: {0}")]
    Source(#[from] EventSourceError),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
    #[error("record encoding: {0}")]
    Encoding(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),
    #[error("chain state: {0}")]
    ChainState(String),
    #[error(transparent)]
    Indexer(#[from] IndexerError),
    #[error("database: {0}")]
    Database(#[from] sqlx::Error),
}
