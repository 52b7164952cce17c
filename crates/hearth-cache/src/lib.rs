//! Single-flight, invalidation-aware resource cache.
//!
//! Maps a component handle to its resolved badged icon and label. For N
//! concurrent callers of the same handle exactly one raw fetch and transform
//! runs; everyone shares the result. Package-change events evict matching
//! entries; an in-flight resolution for an evicted entry still completes and
//! is delivered to its waiters, but is never cached over a fresher flight.
//!
//! The entry map is guarded by a mutex held only around lookup, insert, and
//! remove. Fetch and transform work runs on the blocking-capable scheduler,
//! off the critical section.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::{broadcast, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use hearth_core::{
    ArgbColor, ComponentHandle, IconArtwork, Profile, RawComponentInfo, RawIcon, RenderableIcon,
    Resource,
};
use hearth_directory::{ComponentDirectory, PackageChangeEvent};


/// Generated-background palette for legacy icons. Indexed by a stable hash of
/// the package name so a package keeps its color across restarts.
const LEGACY_BACKGROUND_PALETTE: [u32; 8] = [
    0xFF_26_32_38,
    0xFF_37_47_4F,
    0xFF_45_5A_64,
    0xFF_54_6E_7A,
    0xFF_3E_27_23,
    0xFF_4E_34_2E,
    0xFF_1B_5E_20,
    0xFF_0D_47_A1,
];

type FlightValue = Option<Arc<Resource>>;

struct CacheEntry {
    flight_id: u64,
    value_rx: watch::Receiver<FlightValue>,
}

/// Single-flight cache over a [`ComponentDirectory`].
pub struct ResourceCache {
    directory: Arc<dyn ComponentDirectory>,
    primary_profile: Profile,
    entries: Mutex<HashMap<ComponentHandle, CacheEntry>>,
    next_flight_id: AtomicU64,
}

impl ResourceCache {
    pub fn new(directory: Arc<dyn ComponentDirectory>, primary_profile: Profile) -> Arc<Self> {
        Arc::new(Self {
            directory,
            primary_profile,
            entries: Mutex::new(HashMap::new()),
            next_flight_id: AtomicU64::new(1),
        })
    }

    /// Resolves the display resource for one handle, joining an existing
    /// flight when one is already running or cached.
    ///
    /// Never fails: a vanished component resolves to a placeholder resource,
    /// retried naturally after the next invalidation round.
    pub async fn resolve(self: &Arc<Self>, handle: &ComponentHandle) -> Arc<Resource> {
        let mut new_flight = None;
        let mut value_rx = {
            let mut entries = lock_unpoisoned(&self.entries);
            match entries.get(handle) {
                Some(entry) => entry.value_rx.clone(),
                None => {
                    let flight_id = self.next_flight_id.fetch_add(1, Ordering::Relaxed);
                    let (value_tx, value_rx) = watch::channel(None);
                    entries.insert(
                        handle.clone(),
                        CacheEntry {
                            flight_id,
                            value_rx: value_rx.clone(),
                        },
                    );
                    new_flight = Some((flight_id, value_tx));
                    value_rx
                }
            }
        };
        if let Some((flight_id, value_tx)) = new_flight {
            // Lock released; the fetch/transform runs off the critical section.
            self.spawn_resolution(handle.clone(), flight_id, value_tx);
        }

        loop {
            if let Some(resource) = value_rx.borrow_and_update().clone() {
                return resource;
            }
            if value_rx.changed().await.is_err() {
                // Resolution task dropped its sender without publishing.
                warn!(
                    package = handle.package(),
                    "resolution flight aborted; serving placeholder"
                );
                return Arc::new(Resource::placeholder(handle));
            }
        }
    }

    /// Evicts every entry matching (package, profile) of the event.
    /// In-flight resolutions are not cancelled; their results simply stop
    /// being current. Returns the number of evicted entries.
    pub fn apply_package_change(&self, event: &PackageChangeEvent) -> usize {
        let mut entries = lock_unpoisoned(&self.entries);
        let before = entries.len();
        entries.retain(|handle, _| !event.matches(handle));
        before - entries.len()
    }

    pub fn invalidate_package(&self, package: &str, profile: Profile) -> usize {
        self.apply_package_change(&PackageChangeEvent {
            profile,
            packages: vec![package.to_string()],
        })
    }

    /// Drops every entry. Fallback for a lagged change stream, where the
    /// precise eviction set is unknown.
    pub fn clear(&self) {
        lock_unpoisoned(&self.entries).clear();
    }

    pub fn len(&self) -> usize {
        lock_unpoisoned(&self.entries).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn contains(&self, handle: &ComponentHandle) -> bool {
        lock_unpoisoned(&self.entries).contains_key(handle)
    }

    fn spawn_resolution(
        self: &Arc<Self>,
        handle: ComponentHandle,
        flight_id: u64,
        value_tx: watch::Sender<FlightValue>,
    ) {
        let cache = Arc::clone(self);
        tokio::spawn(async move {
            let directory = Arc::clone(&cache.directory);
            let fetch_handle = handle.clone();
            let fetched =
                tokio::task::spawn_blocking(move || directory.resolve_raw(&fetch_handle)).await;

            let resource = match fetched {
                Ok(Ok(info)) => compose_resource(&handle, info, cache.primary_profile),
                Ok(Err(error)) => {
                    warn!(
                        package = handle.package(),
                        %error,
                        "raw fetch failed; resolving to placeholder"
                    );
                    Resource::placeholder(&handle)
                }
                Err(join_error) => {
                    warn!(
                        package = handle.package(),
                        %join_error,
                        "raw fetch panicked; resolving to placeholder"
                    );
                    Resource::placeholder(&handle)
                }
            };

            let still_current = {
                let entries = lock_unpoisoned(&cache.entries);
                entries
                    .get(&handle)
                    .map(|entry| entry.flight_id == flight_id)
                    .unwrap_or(false)
            };
            if !still_current {
                // Evicted mid-flight: waiters on this flight still get the
                // value, but the map keeps whatever is fresher (or nothing).
                debug!(
                    package = handle.package(),
                    flight_id, "resolution superseded before completion"
                );
            }
            let _ = value_tx.send(Some(Arc::new(resource)));
        });
    }
}

/// Transforms a raw fetch result into the render-ready resource: adaptive
/// composition or legacy fallback, then the profile badge when the handle's
/// profile is not the primary.
fn compose_resource(
    handle: &ComponentHandle,
    info: RawComponentInfo,
    primary_profile: Profile,
) -> Resource {
    let artwork = match info.icon {
        Some(RawIcon::Adaptive {
            background,
            foreground,
        }) => IconArtwork::Adaptive {
            background,
            foreground,
        },
        Some(RawIcon::Bitmap { pixmap }) => IconArtwork::Legacy {
            pixmap,
            generated_background: generated_background_color(handle.package()),
        },
        None => IconArtwork::Placeholder,
    };
    let profile = handle.profile();
    let badge = (profile != primary_profile).then_some(profile.kind);
    Resource {
        label: info.label,
        icon: RenderableIcon { artwork, badge },
    }
}

/// Stable FNV-1a hash of the package name into the background palette.
fn generated_background_color(package: &str) -> ArgbColor {
    let mut hash: u64 = 0xcbf2_9ce4_8422_2325;
    for byte in package.bytes() {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(0x0000_0100_0000_01b3);
    }
    let index = (hash % LEGACY_BACKGROUND_PALETTE.len() as u64) as usize;
    ArgbColor(LEGACY_BACKGROUND_PALETTE[index])
}

/// Owned background task that evicts cache entries on package-change events.
pub struct InvalidationListenerHandle {
    shutdown_tx: Option<oneshot::Sender<()>>,
    task: Option<JoinHandle<()>>,
}

impl InvalidationListenerHandle {
    pub async fn shutdown(&mut self) {
        if let Some(shutdown_tx) = self.shutdown_tx.take() {
            let _ = shutdown_tx.send(());
        }
        if let Some(task) = self.task.take() {
            let _ = task.await;
        }
    }
}

/// Subscribes the cache to a package-change stream. The returned handle owns
/// the listener task; dropping it without `shutdown` detaches the task until
/// the change stream closes.
pub fn spawn_invalidation_listener(
    cache: Arc<ResourceCache>,
    mut changes_rx: broadcast::Receiver<PackageChangeEvent>,
) -> InvalidationListenerHandle {
    let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();
    let task = tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                event = changes_rx.recv() => match event {
                    Ok(event) => {
                        let evicted = cache.apply_package_change(&event);
                        debug!(
                            profile = ?event.profile,
                            packages = ?event.packages,
                            evicted,
                            "cache invalidation"
                        );
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        // Unknown events were dropped; evicting everything is
                        // the only safe recovery.
                        warn!(skipped, "change stream lagged; clearing resource cache");
                        cache.clear();
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                },
            }
        }
    });
    InvalidationListenerHandle {
        shutdown_tx: Some(shutdown_tx),
        task: Some(task),
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
