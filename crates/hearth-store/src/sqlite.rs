//! SQLite-backed `MetadataStore` implementation with durable persistence.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use rusqlite::{params, Connection};
use tokio::sync::{watch, Mutex};
use tracing::debug;

use hearth_core::{
    current_unix_timestamp_ms, ComponentMetadata, ComponentName, MetadataKey, Profile, ProfileKind,
};

use crate::{MetadataStore, MetadataStoreError, MetadataTable, StoreResult};

const METADATA_SCHEMA_VERSION: u32 = 1;
const SQLITE_BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Persistent SQLite store backend for pinned/hidden flags.
pub struct SqliteMetadataStore {
    db_path: PathBuf,
    table_tx: watch::Sender<MetadataTable>,
    // Serializes write+reload+publish so concurrent upserts cannot publish
    // tables out of order.
    write_lock: Mutex<()>,
}

impl SqliteMetadataStore {
    /// Opens (or creates) the store at `path` and loads the current table so
    /// the first watch value is complete before this returns.
    pub fn new(path: impl AsRef<Path>) -> StoreResult<Self> {
        let db_path = path.as_ref().to_path_buf();
        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let connection = open_connection(&db_path)?;
        initialize_schema(&connection)?;
        let initial = load_table(&connection)?;
        let (table_tx, _) = watch::channel(initial);
        Ok(Self {
            db_path,
            table_tx,
            write_lock: Mutex::new(()),
        })
    }

    fn reload_and_publish(&self, connection: &Connection) -> StoreResult<()> {
        let table = load_table(connection)?;
        self.table_tx.send_replace(table);
        Ok(())
    }
}

#[async_trait]
impl MetadataStore for SqliteMetadataStore {
    fn subscribe(&self) -> watch::Receiver<MetadataTable> {
        self.table_tx.subscribe()
    }

    async fn get(&self, key: &MetadataKey) -> StoreResult<Option<ComponentMetadata>> {
        Ok(self.table_tx.borrow().get(key).copied())
    }

    async fn upsert(&self, key: MetadataKey, metadata: ComponentMetadata) -> StoreResult<()> {
        let _guard = self.write_lock.lock().await;
        let connection = open_connection(&self.db_path)?;
        connection.execute(
            "INSERT INTO component_metadata \
             (package, class_name, profile_kind, profile_user, is_pinned, is_hidden, updated_unix_ms) \
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7) \
             ON CONFLICT(package, class_name, profile_kind, profile_user) DO UPDATE SET \
             is_pinned = excluded.is_pinned, \
             is_hidden = excluded.is_hidden, \
             updated_unix_ms = excluded.updated_unix_ms",
            params![
                key.component.package,
                key.component.class_name,
                key.profile.kind.as_str(),
                key.profile.user_id,
                metadata.is_pinned,
                metadata.is_hidden,
                current_unix_timestamp_ms(),
            ],
        )?;
        self.reload_and_publish(&connection)
    }

    async fn prune_orphans(&self, live: &HashSet<MetadataKey>) -> StoreResult<usize> {
        let _guard = self.write_lock.lock().await;
        let connection = open_connection(&self.db_path)?;
        let stored = load_table(&connection)?;
        let mut pruned = 0_usize;
        for key in stored.keys() {
            if live.contains(key) {
                continue;
            }
            pruned += connection.execute(
                "DELETE FROM component_metadata \
                 WHERE package = ?1 AND class_name = ?2 AND profile_kind = ?3 AND profile_user = ?4",
                params![
                    key.component.package,
                    key.component.class_name,
                    key.profile.kind.as_str(),
                    key.profile.user_id,
                ],
            )?;
        }
        if pruned > 0 {
            debug!(pruned, "pruned orphan metadata rows");
            self.reload_and_publish(&connection)?;
        }
        Ok(pruned)
    }
}

fn open_connection(db_path: &Path) -> StoreResult<Connection> {
    let connection = Connection::open(db_path)?;
    connection.busy_timeout(SQLITE_BUSY_TIMEOUT)?;
    connection.execute_batch(
        r#"
        PRAGMA journal_mode = WAL;
        PRAGMA synchronous = NORMAL;
        "#,
    )?;
    Ok(connection)
}

fn initialize_schema(connection: &Connection) -> StoreResult<()> {
    connection.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS component_metadata (
            package TEXT NOT NULL,
            class_name TEXT NOT NULL,
            profile_kind TEXT NOT NULL,
            profile_user INTEGER NOT NULL,
            is_pinned INTEGER NOT NULL,
            is_hidden INTEGER NOT NULL,
            updated_unix_ms INTEGER NOT NULL,
            PRIMARY KEY (package, class_name, profile_kind, profile_user)
        );
        "#,
    )?;
    connection.pragma_update(None, "user_version", METADATA_SCHEMA_VERSION)?;
    Ok(())
}

fn load_table(connection: &Connection) -> StoreResult<MetadataTable> {
    let mut statement = connection.prepare(
        "SELECT package, class_name, profile_kind, profile_user, is_pinned, is_hidden \
         FROM component_metadata",
    )?;
    let mut rows = statement.query([])?;
    let mut table = HashMap::new();
    while let Some(row) = rows.next()? {
        let package: String = row.get(0)?;
        let class_name: String = row.get(1)?;
        let profile_kind: String = row.get(2)?;
        let profile_user: u32 = row.get(3)?;
        let is_pinned: bool = row.get(4)?;
        let is_hidden: bool = row.get(5)?;

        let kind = parse_profile_kind(&profile_kind)?;
        let key = MetadataKey::new(
            ComponentName::new(package, class_name),
            Profile::new(kind, profile_user),
        );
        table.insert(
            key,
            ComponentMetadata {
                is_pinned,
                is_hidden,
            },
        );
    }
    Ok(Arc::new(table))
}

fn parse_profile_kind(value: &str) -> StoreResult<ProfileKind> {
    match value {
        "personal" => Ok(ProfileKind::Personal),
        "work" => Ok(ProfileKind::Work),
        "private" => Ok(ProfileKind::Private),
        other => Err(MetadataStoreError::InvalidPersistedValue {
            field: "profile_kind",
            value: other.to_string(),
        }),
    }
}
