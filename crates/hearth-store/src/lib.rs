//! Metadata store abstractions and in-memory backend.
//!
//! Single source of truth for per-activity pinned/hidden flags. Writes are
//! last-writer-wins per key, every write re-emits the full table on the watch
//! channel, and write failures surface to the caller: silently losing a pin
//! or hide intent is unacceptable.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use hearth_core::{ComponentMetadata, MetadataKey};

mod sqlite;

pub use sqlite::SqliteMetadataStore;

/// Result type for metadata store operations.
pub type StoreResult<T> = Result<T, MetadataStoreError>;

/// Full point-in-time metadata table, shared immutably with subscribers.
pub type MetadataTable = Arc<HashMap<MetadataKey, ComponentMetadata>>;

/// Errors returned by store implementations.
#[derive(Debug, Error)]
pub enum MetadataStoreError {
    #[error("invalid persisted value for '{field}': {value}")]
    InvalidPersistedValue { field: &'static str, value: String },
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Async store contract consumed by the aggregation engine and the facade.
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Latest-table watch stream; the current table is readable immediately
    /// via `borrow` and the full table is re-emitted on every write.
    fn subscribe(&self) -> watch::Receiver<MetadataTable>;

    async fn get(&self, key: &MetadataKey) -> StoreResult<Option<ComponentMetadata>>;

    /// Last-writer-wins write, creating the row if absent.
    async fn upsert(&self, key: MetadataKey, metadata: ComponentMetadata) -> StoreResult<()>;

    /// Opportunistic garbage collection of rows whose component no longer
    /// exists. Orphan rows are harmless, so callers invoke this at leisure.
    /// Returns the number of rows removed.
    async fn prune_orphans(&self, live: &HashSet<MetadataKey>) -> StoreResult<usize>;
}

/// In-memory implementation for tests and local experimentation.
pub struct InMemoryMetadataStore {
    inner: RwLock<HashMap<MetadataKey, ComponentMetadata>>,
    table_tx: watch::Sender<MetadataTable>,
}

impl Default for InMemoryMetadataStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryMetadataStore {
    pub fn new() -> Self {
        let (table_tx, _) = watch::channel(Arc::new(HashMap::new()) as MetadataTable);
        Self {
            inner: RwLock::new(HashMap::new()),
            table_tx,
        }
    }
}

#[async_trait]
impl MetadataStore for InMemoryMetadataStore {
    fn subscribe(&self) -> watch::Receiver<MetadataTable> {
        self.table_tx.subscribe()
    }

    async fn get(&self, key: &MetadataKey) -> StoreResult<Option<ComponentMetadata>> {
        Ok(self.inner.read().await.get(key).copied())
    }

    async fn upsert(&self, key: MetadataKey, metadata: ComponentMetadata) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        inner.insert(key, metadata);
        let table: MetadataTable = Arc::new(inner.clone());
        drop(inner);
        self.table_tx.send_replace(table);
        Ok(())
    }

    async fn prune_orphans(&self, live: &HashSet<MetadataKey>) -> StoreResult<usize> {
        let mut inner = self.inner.write().await;
        let before = inner.len();
        inner.retain(|key, _| live.contains(key));
        let pruned = before - inner.len();
        if pruned > 0 {
            debug!(pruned, "pruned orphan metadata rows");
            let table: MetadataTable = Arc::new(inner.clone());
            drop(inner);
            self.table_tx.send_replace(table);
        }
        Ok(pruned)
    }
}
