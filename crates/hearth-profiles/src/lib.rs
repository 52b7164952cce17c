//! Profile directory: tracks which OS user profiles exist and whether each is
//! enabled, and re-emits the full set on every lifecycle broadcast.
//!
//! The first value is computed synchronously at construction so subscribers
//! never observe a missed-update window. Redundant identical emissions are
//! allowed; downstream consumers must tolerate them.

use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tracing::debug;

use hearth_core::{Profile, ProfileLifecycleSignal, ProfileSet, ProfileState};

/// OS seam for profile enumeration and quiet-mode requests.
///
/// `current_profiles` is a synchronous query and may block on OS IPC.
/// `request_quiet_mode` is fire-and-forget; success is observed through a
/// later lifecycle signal, never through a return value.
pub trait ProfileSource: Send + Sync {
    fn current_profiles(&self) -> ProfileSet;
    fn request_quiet_mode(&self, profile: Profile, enabled: bool);
}

/// Watch-backed profile directory over a [`ProfileSource`].
pub struct ProfileDirectory {
    source: Arc<dyn ProfileSource>,
    profiles_tx: watch::Sender<ProfileSet>,
}

impl ProfileDirectory {
    /// Queries the source once, synchronously, so the watch channel holds a
    /// valid set before this returns.
    pub fn new(source: Arc<dyn ProfileSource>) -> Self {
        let initial = source.current_profiles();
        let (profiles_tx, _) = watch::channel(initial);
        Self {
            source,
            profiles_tx,
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<ProfileSet> {
        self.profiles_tx.subscribe()
    }

    pub fn current(&self) -> ProfileSet {
        self.profiles_tx.borrow().clone()
    }

    /// Requeries the source and re-emits. No dedup: an identical set still
    /// wakes subscribers, which is harmless for coalescing consumers.
    pub fn handle_lifecycle_signal(&self, signal: ProfileLifecycleSignal) {
        let set = self.source.current_profiles();
        debug!(
            ?signal,
            secondary_count = set.secondary.len(),
            "profile lifecycle requery"
        );
        self.profiles_tx.send_replace(set);
    }

    /// Asks the OS to toggle quiet mode for a secondary profile. The result
    /// arrives asynchronously as a lifecycle signal, not as a return value.
    pub fn set_enabled(&self, profile: Profile, enabled: bool) {
        debug!(?profile, enabled, "quiet mode request");
        self.source.request_quiet_mode(profile, enabled);
    }
}

/// Mutable in-memory source for tests and local experimentation.
pub struct StaticProfileSource {
    inner: Mutex<ProfileSet>,
}

impl StaticProfileSource {
    pub fn new(set: ProfileSet) -> Arc<Self> {
        Arc::new(Self {
            inner: Mutex::new(set),
        })
    }

    /// Replaces the backing set. Callers still need to deliver a lifecycle
    /// signal to the directory for the change to be observed, matching how
    /// the OS behaves.
    pub fn replace(&self, set: ProfileSet) {
        *lock_unpoisoned(&self.inner) = set;
    }

    pub fn set_secondary_enabled(&self, profile: Profile, enabled: bool) {
        let mut inner = lock_unpoisoned(&self.inner);
        for state in &mut inner.secondary {
            if state.profile == profile {
                state.is_enabled = enabled;
            }
        }
    }
}

impl ProfileSource for StaticProfileSource {
    fn current_profiles(&self) -> ProfileSet {
        lock_unpoisoned(&self.inner).clone()
    }

    fn request_quiet_mode(&self, profile: Profile, enabled: bool) {
        // The in-memory OS applies quiet-mode requests immediately.
        self.set_secondary_enabled(profile, enabled);
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
