pub mod chain;
pub mod config;
pub mod datasource;
pub mod db;
pub mod domain;
pub mod engine;
pub mod error;
pub mod handlers;
pub mod orchestration;
pub mod pricing;
pub mod store;

pub use chain::{ChainError, ChainReader, ChainTimeline, ChainView, StaticChain};
pub use config::{Config, Deployment};
pub use datasource::{
    EventSource, EventSourceError, FileEventSource, HttpEventSource, MockEventSource,
};
pub use db::{init_db, Repository};
pub use domain::{Address, ChainEvent, Decimal, EventCursor, EventKind, Timestamp};
pub use error::{AppError, HandlerError, IndexerError};
pub use handlers::dispatch;
pub use orchestration::{Indexer, RunSummary};
pub use store::{EntityStore, MemoryStore, StagedStore};
