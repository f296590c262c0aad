//! Async shell around the synchronous core: pull events, apply, commit.

pub mod indexer;

pub use indexer::{Indexer, RunSummary};
