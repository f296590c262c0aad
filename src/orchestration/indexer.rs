use crate::chain::ChainView;
use crate::config::Deployment;
use crate::db::{EntityRow, EventWrite, Repository};
use crate::domain::{ChainEvent, EventCursor};
use crate::error::IndexerError;
use crate::handlers::dispatch;
use crate::store::{ChangeSet, MemoryStore, StagedStore};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info};

use crate::datasource::EventSource;

/// Result of a run that stopped because the source drained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    pub applied: usize,
    pub cursor: Option<EventCursor>,
    pub digest: String,
}

/// Drives events from a source through the handlers, one atomic commit per
/// event.
///
/// The in-memory store mirrors the database: it is loaded once at startup
/// and only changes after the matching commit succeeds.
pub struct Indexer<C: ChainView> {
    repo: Repository,
    source: Arc<dyn EventSource>,
    chain: C,
    deployment: Deployment,
    store: MemoryStore,
    cursor: Option<EventCursor>,
    batch_size: usize,
    poll_interval: Duration,
}

impl<C: ChainView> Indexer<C> {
    /// Load the persisted records and cursor.
    pub async fn open(
        repo: Repository,
        source: Arc<dyn EventSource>,
        chain: C,
        deployment: Deployment,
    ) -> Result<Self, IndexerError> {
        let rows = repo.load_entities().await?;
        let records = rows
            .iter()
            .map(EntityRow::decode)
            .collect::<Result<Vec<_>, _>>()?;
        let store = MemoryStore::from_records(records);
        let cursor = repo.get_cursor().await?;
        info!(
            records = store.len(),
            cursor = ?cursor,
            "indexer state loaded"
        );

        Ok(Self {
            repo,
            source,
            chain,
            deployment,
            store,
            cursor,
            batch_size: 500,
            poll_interval: Duration::ZERO,
        })
    }

    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }

    /// Zero stops [`Indexer::run`] once the source is drained.
    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn store(&self) -> &MemoryStore {
        &self.store
    }

    pub fn cursor(&self) -> Option<EventCursor> {
        self.cursor
    }

    /// Apply one event. Events at or before the cursor are skipped and
    /// return `false`.
    ///
    /// On a handler failure nothing is committed and the cursor stays put,
    /// so the same event is retried on the next run.
    pub async fn apply(&mut self, event: &ChainEvent) -> Result<bool, IndexerError> {
        let cursor = event.cursor();
        if let Some(last) = self.cursor {
            if !last.precedes(event) {
                debug!(cursor = %cursor, "event already applied");
                return Ok(false);
            }
        }

        self.chain.seek(event.block.number);
        let changes = {
            let mut staged = StagedStore::new(&self.store);
            if let Err(source) = dispatch(&mut staged, &self.chain, &self.deployment, event) {
                error!(
                    cursor = %cursor,
                    event = event.kind.name(),
                    tx = %event.tx_hash,
                    error = %source,
                    "event failed, nothing committed"
                );
                return Err(IndexerError::Handler {
                    cursor,
                    event: event.kind.name(),
                    source,
                });
            }
            staged.into_changes()
        };

        let write = encode(&changes)?;
        self.repo.commit_event(&write, cursor).await?;
        self.store.apply(changes);
        self.cursor = Some(cursor);
        Ok(true)
    }

    /// Fetch and apply one batch. Returns the number of events applied.
    pub async fn run_once(&mut self) -> Result<usize, IndexerError> {
        let events = self
            .source
            .fetch_events(self.cursor, self.batch_size)
            .await?;
        let mut applied = 0;
        for event in &events {
            if self.apply(event).await? {
                applied += 1;
            }
        }
        if applied > 0 {
            debug!(applied, cursor = ?self.cursor, "batch applied");
        }
        Ok(applied)
    }

    /// Apply batches until the source drains, or forever when polling.
    pub async fn run(&mut self) -> Result<RunSummary, IndexerError> {
        let mut total = 0;
        loop {
            let applied = self.run_once().await?;
            total += applied;
            if applied > 0 {
                continue;
            }
            if self.poll_interval.is_zero() {
                break;
            }
            tokio::time::sleep(self.poll_interval).await;
        }

        let digest = self.store.digest();
        info!(
            applied = total,
            cursor = ?self.cursor,
            records = self.store.len(),
            digest = %digest,
            "event source drained"
        );
        Ok(RunSummary {
            applied: total,
            cursor: self.cursor,
            digest,
        })
    }
}

fn encode(changes: &ChangeSet) -> Result<EventWrite, serde_json::Error> {
    Ok(EventWrite {
        upserts: changes
            .upserts
            .iter()
            .map(EntityRow::encode)
            .collect::<Result<Vec<_>, _>>()?,
        deletes: changes.deletes.clone(),
    })
}
