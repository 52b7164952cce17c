//! Aggregation engine: merges live directory state, profile availability, and
//! persisted metadata into atomic, diff-friendly record snapshots.
//!
//! Every input change (profile set, metadata table, package-change event)
//! triggers one recompute; signals arriving faster than recomputation are
//! coalesced into a single pass over the latest inputs. Publishes are whole
//! snapshot replacements, never in-place mutation: readers may hold an old
//! snapshot indefinitely and it stays internally consistent.

use std::sync::Arc;

use arc_swap::ArcSwap;
use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use hearth_core::{
    ComponentHandle, ComponentRecord, MetadataKey, Profile, ProfileKind, ProfileSet,
};
use hearth_directory::{ComponentDirectory, PackageChangeEvent};
use hearth_store::{MetadataStore, MetadataTable};

mod launcher;
pub mod view;


pub use launcher::{Launcher, LauncherConfig};

/// One immutable, fully computed generation of the aggregated record list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordSnapshot {
    pub generation: u64,
    pub records: Vec<ComponentRecord>,
}

pub type SharedSnapshot = Arc<RecordSnapshot>;

/// Inputs wired into one aggregation engine instance.
pub struct AggregationEngineConfig {
    /// The launcher's own package, excluded from every snapshot.
    pub own_package: String,
    pub directory: Arc<dyn ComponentDirectory>,
    pub metadata_store: Arc<dyn MetadataStore>,
    pub profiles_rx: watch::Receiver<ProfileSet>,
}

/// Owned engine task plus snapshot access.
pub struct AggregationHandle {
    current: Arc<ArcSwap<RecordSnapshot>>,
    records_rx: watch::Receiver<SharedSnapshot>,
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl AggregationHandle {
    /// Latest-snapshot stream. The current snapshot is readable immediately
    /// via `borrow`.
    pub fn subscribe(&self) -> watch::Receiver<SharedSnapshot> {
        self.records_rx.clone()
    }

    /// Lock-free read of the current snapshot.
    pub fn current(&self) -> SharedSnapshot {
        self.current.load_full()
    }

    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Starts the engine. The first snapshot is computed before this returns, so
/// subscribers never observe an empty pre-initialization window.
pub fn start_aggregation_engine(config: AggregationEngineConfig) -> AggregationHandle {
    let AggregationEngineConfig {
        own_package,
        directory,
        metadata_store,
        profiles_rx,
    } = config;

    let metadata_rx = metadata_store.subscribe();
    let changes_rx = directory.subscribe_changes();

    let initial_records = compute_records(
        &own_package,
        directory.as_ref(),
        &profiles_rx.borrow(),
        &metadata_rx.borrow(),
    );
    let initial: SharedSnapshot = Arc::new(RecordSnapshot {
        generation: 1,
        records: initial_records,
    });
    let current = Arc::new(ArcSwap::new(Arc::clone(&initial)));
    let (records_tx, records_rx) = watch::channel(Arc::clone(&initial));

    let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
    let loop_ctx = EngineContext {
        own_package,
        directory,
        current: Arc::clone(&current),
        records_tx,
    };
    let task = tokio::spawn(run_aggregation_loop(
        loop_ctx,
        shutdown_rx,
        profiles_rx,
        metadata_rx,
        changes_rx,
    ));

    AggregationHandle {
        current,
        records_rx,
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    }
}

struct EngineContext {
    own_package: String,
    directory: Arc<dyn ComponentDirectory>,
    current: Arc<ArcSwap<RecordSnapshot>>,
    records_tx: watch::Sender<SharedSnapshot>,
}

async fn run_aggregation_loop(
    ctx: EngineContext,
    mut shutdown_rx: oneshot::Receiver<()>,
    mut profiles_rx: watch::Receiver<ProfileSet>,
    mut metadata_rx: watch::Receiver<MetadataTable>,
    mut changes_rx: broadcast::Receiver<PackageChangeEvent>,
) {
    let mut generation = ctx.current.load().generation;
    loop {
        tokio::select! {
            _ = &mut shutdown_rx => break,
            changed = profiles_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            changed = metadata_rx.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            event = changes_rx.recv() => match event {
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    // The re-query below covers whatever was skipped.
                    warn!(skipped, "package change stream lagged");
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
        }

        // Coalesce: absorb every signal that arrived while we were waiting,
        // then recompute once from the latest point-in-time inputs.
        let profiles = profiles_rx.borrow_and_update().clone();
        let table = metadata_rx.borrow_and_update().clone();
        loop {
            match changes_rx.try_recv() {
                Ok(_) | Err(broadcast::error::TryRecvError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }

        let records = compute_records(&ctx.own_package, ctx.directory.as_ref(), &profiles, &table);
        generation += 1;
        let snapshot: SharedSnapshot = Arc::new(RecordSnapshot {
            generation,
            records,
        });
        debug!(
            generation,
            records = snapshot.records.len(),
            "published record snapshot"
        );
        ctx.current.store(Arc::clone(&snapshot));
        ctx.records_tx.send_replace(snapshot);
    }
}

/// Profiles contributing components to the snapshot: the primary plus every
/// secondary that is enabled or not private. A quieted work profile keeps
/// showing its entries until toggled; a quieted private profile disappears.
/// Longstanding launcher behavior, preserved deliberately.
fn effective_profiles(set: &ProfileSet) -> Vec<Profile> {
    let mut profiles = Vec::with_capacity(1 + set.secondary.len());
    profiles.push(set.primary);
    for state in &set.secondary {
        if state.is_enabled || state.profile.kind != ProfileKind::Private {
            profiles.push(state.profile);
        }
    }
    profiles
}

fn compute_records(
    own_package: &str,
    directory: &dyn ComponentDirectory,
    profiles: &ProfileSet,
    table: &MetadataTable,
) -> Vec<ComponentRecord> {
    let mut records = Vec::new();
    for profile in effective_profiles(profiles) {
        let activities = match directory.list_activities(profile) {
            Ok(activities) => activities,
            Err(error) => {
                // One failing profile degrades to empty, never globally.
                warn!(?profile, %error, "profile query failed; contributing no records");
                Vec::new()
            }
        };
        for activity in activities {
            if activity.component.package == own_package {
                continue;
            }
            let handle = ComponentHandle::activity(activity.component, profile);
            let metadata = MetadataKey::for_handle(&handle)
                .and_then(|key| table.get(&key).copied())
                .unwrap_or_default();
            records.push(ComponentRecord::new(handle, metadata));
        }
    }
    records
}
