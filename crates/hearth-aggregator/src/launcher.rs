//! Launcher facade: the single surface the view layer talks to.
//!
//! Wires the profile directory, component directory, metadata store, resource
//! cache, and aggregation engine together, and exposes thin read-modify-write
//! wrappers for pin/hide mutations.

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::{bail, Result};
use tokio::sync::watch;
use tokio_stream::wrappers::WatchStream;

use hearth_cache::{spawn_invalidation_listener, InvalidationListenerHandle, ResourceCache};
use hearth_core::{ComponentHandle, MetadataKey, Profile, Resource};
use hearth_directory::ComponentDirectory;
use hearth_profiles::ProfileDirectory;
use hearth_store::MetadataStore;

use crate::{start_aggregation_engine, AggregationEngineConfig, AggregationHandle, SharedSnapshot};

/// Collaborators needed to bring up one launcher core.
pub struct LauncherConfig {
    pub own_package: String,
    pub directory: Arc<dyn ComponentDirectory>,
    pub metadata_store: Arc<dyn MetadataStore>,
    pub profile_directory: Arc<ProfileDirectory>,
}

pub struct Launcher {
    engine: AggregationHandle,
    cache: Arc<ResourceCache>,
    cache_listener: InvalidationListenerHandle,
    metadata_store: Arc<dyn MetadataStore>,
    profile_directory: Arc<ProfileDirectory>,
}

impl Launcher {
    /// Starts the engine and the cache invalidation listener. The first
    /// record snapshot is available synchronously once this returns.
    pub fn start(config: LauncherConfig) -> Self {
        let LauncherConfig {
            own_package,
            directory,
            metadata_store,
            profile_directory,
        } = config;

        let primary_profile = profile_directory.current().primary;
        let cache = ResourceCache::new(Arc::clone(&directory), primary_profile);
        let cache_listener =
            spawn_invalidation_listener(Arc::clone(&cache), directory.subscribe_changes());

        let engine = start_aggregation_engine(AggregationEngineConfig {
            own_package,
            directory,
            metadata_store: Arc::clone(&metadata_store),
            profiles_rx: profile_directory.subscribe(),
        });

        Self {
            engine,
            cache,
            cache_listener,
            metadata_store,
            profile_directory,
        }
    }

    /// Latest-snapshot watch channel for the view layer.
    pub fn records(&self) -> watch::Receiver<SharedSnapshot> {
        self.engine.subscribe()
    }

    /// Same stream as [`Launcher::records`], as a `Stream` for combinators.
    pub fn records_stream(&self) -> WatchStream<SharedSnapshot> {
        WatchStream::new(self.engine.subscribe())
    }

    pub fn current_records(&self) -> SharedSnapshot {
        self.engine.current()
    }

    /// Resolves the badged icon and label for one record's handle.
    pub async fn resolve(&self, handle: &ComponentHandle) -> Arc<Resource> {
        self.cache.resolve(handle).await
    }

    pub async fn set_pinned(&self, handle: &ComponentHandle, pinned: bool) -> Result<()> {
        let key = metadata_key(handle)?;
        let current = self.metadata_store.get(&key).await?.unwrap_or_default();
        self.metadata_store
            .upsert(key, current.with_pinned(pinned))
            .await?;
        Ok(())
    }

    pub async fn set_hidden(&self, handle: &ComponentHandle, hidden: bool) -> Result<()> {
        let key = metadata_key(handle)?;
        let current = self.metadata_store.get(&key).await?.unwrap_or_default();
        self.metadata_store
            .upsert(key, current.with_hidden(hidden))
            .await?;
        Ok(())
    }

    /// Requests quiet-mode toggle for a secondary profile; the outcome shows
    /// up through a later profile emission.
    pub fn set_profile_enabled(&self, profile: Profile, enabled: bool) {
        self.profile_directory.set_enabled(profile, enabled);
    }

    /// Drops metadata rows for components no longer present in the current
    /// snapshot. Orphans are harmless, so this is best-effort housekeeping.
    pub async fn prune_orphan_metadata(&self) -> Result<usize> {
        let snapshot = self.engine.current();
        let live: HashSet<MetadataKey> = snapshot
            .records
            .iter()
            .filter_map(|record| MetadataKey::for_handle(&record.handle))
            .collect();
        Ok(self.metadata_store.prune_orphans(&live).await?)
    }

    pub async fn shutdown(&mut self) {
        self.engine.shutdown().await;
        self.cache_listener.shutdown().await;
    }
}

fn metadata_key(handle: &ComponentHandle) -> Result<MetadataKey> {
    let Some(key) = MetadataKey::for_handle(handle) else {
        // Caller bug: only activities carry persisted metadata.
        debug_assert!(false, "pin/hide on non-activity handle");
        bail!(
            "{} components do not carry pinned/hidden state",
            handle.kind_str()
        );
    };
    Ok(key)
}
