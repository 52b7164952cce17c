//! Component directory adapter: wraps OS enumeration of activities,
//! shortcuts, shortcut creators, and widget providers per profile, and fans
//! out package-change notifications.
//!
//! Change events report only *that* something changed for (profile, package);
//! callers re-query. A package the OS throws for during a scoped re-query
//! contributes an empty component list instead of corrupting the whole scan.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use hearth_core::{ComponentHandle, ComponentName, Profile, RawComponentInfo, RawIcon};


const PACKAGE_CHANGE_CHANNEL_CAPACITY: usize = 64;

/// Result type for directory operations.
pub type DirectoryResult<T> = Result<T, DirectoryError>;

/// Errors surfaced by directory backends.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DirectoryError {
    #[error("profile {0:?} is unavailable")]
    ProfileUnavailable(Profile),
    #[error("package '{0}' is unavailable")]
    PackageUnavailable(String),
    #[error("component '{0}' not found")]
    ComponentNotFound(String),
}

/// One or more packages changed under one profile. Carries no detail about
/// what changed; consumers must re-query the affected scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PackageChangeEvent {
    pub profile: Profile,
    pub packages: Vec<String>,
}

impl PackageChangeEvent {
    pub fn matches(&self, handle: &ComponentHandle) -> bool {
        handle.profile() == self.profile
            && self.packages.iter().any(|package| package == handle.package())
    }
}

/// Launchable activity as enumerated by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityInfo {
    pub component: ComponentName,
    pub label: String,
    pub icon: Option<RawIcon>,
}

/// Pinned shortcut as enumerated by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutInfo {
    pub package: String,
    pub shortcut_id: String,
    pub label: String,
    pub icon: Option<RawIcon>,
}

/// Shortcut-creator activity as enumerated by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShortcutCreatorInfo {
    pub component: ComponentName,
    pub label: String,
}

/// App-widget provider as enumerated by the OS.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WidgetProviderInfo {
    pub component: ComponentName,
    pub label: String,
}

/// OS seam for per-profile component enumeration and raw resource fetch.
///
/// Queries are synchronous and may block on OS IPC; callers that care run
/// them on a blocking-capable scheduler.
pub trait ComponentDirectory: Send + Sync {
    fn list_activities(&self, profile: Profile) -> DirectoryResult<Vec<ActivityInfo>>;
    fn list_shortcuts(&self, profile: Profile) -> DirectoryResult<Vec<ShortcutInfo>>;
    fn list_shortcut_creators(&self, profile: Profile)
        -> DirectoryResult<Vec<ShortcutCreatorInfo>>;
    fn list_widget_providers(&self, profile: Profile)
        -> DirectoryResult<Vec<WidgetProviderInfo>>;

    /// Fetches the raw icon and label for one handle. Fails when the
    /// component vanished between enumeration and fetch.
    fn resolve_raw(&self, handle: &ComponentHandle) -> DirectoryResult<RawComponentInfo>;

    fn subscribe_changes(&self) -> broadcast::Receiver<PackageChangeEvent>;
}

#[derive(Debug, Clone, Default)]
struct InstalledPackage {
    activities: Vec<ActivityInfo>,
    shortcuts: Vec<ShortcutInfo>,
    shortcut_creators: Vec<ShortcutCreatorInfo>,
    widget_providers: Vec<WidgetProviderInfo>,
    // Simulates a package the OS throws for during enumeration.
    poisoned: bool,
}

#[derive(Default)]
struct DirectoryInner {
    packages: HashMap<(Profile, String), InstalledPackage>,
    unavailable_profiles: Vec<Profile>,
    resolve_calls: HashMap<ComponentHandle, u64>,
}

/// Mutable in-memory directory backend for tests and local experimentation.
///
/// Mutations do not fire change events on their own; call
/// [`InMemoryComponentDirectory::notify_change`] (or the remove/install
/// helpers that do) to mimic the OS broadcast timing under test.
pub struct InMemoryComponentDirectory {
    inner: Mutex<DirectoryInner>,
    changes_tx: broadcast::Sender<PackageChangeEvent>,
}

impl Default for InMemoryComponentDirectory {
    fn default() -> Self {
        Self::new()
    }
}

impl InMemoryComponentDirectory {
    pub fn new() -> Self {
        let (changes_tx, _) = broadcast::channel(PACKAGE_CHANGE_CHANNEL_CAPACITY);
        Self {
            inner: Mutex::new(DirectoryInner::default()),
            changes_tx,
        }
    }

    pub fn install_activity(
        &self,
        profile: Profile,
        package: &str,
        class_name: &str,
        label: &str,
        icon: Option<RawIcon>,
    ) {
        let mut inner = lock_unpoisoned(&self.inner);
        let entry = inner
            .packages
            .entry((profile, package.to_string()))
            .or_default();
        entry.activities.push(ActivityInfo {
            component: ComponentName::new(package, class_name),
            label: label.to_string(),
            icon,
        });
    }

    pub fn install_shortcut(
        &self,
        profile: Profile,
        package: &str,
        shortcut_id: &str,
        label: &str,
        icon: Option<RawIcon>,
    ) {
        let mut inner = lock_unpoisoned(&self.inner);
        let entry = inner
            .packages
            .entry((profile, package.to_string()))
            .or_default();
        entry.shortcuts.push(ShortcutInfo {
            package: package.to_string(),
            shortcut_id: shortcut_id.to_string(),
            label: label.to_string(),
            icon,
        });
    }

    pub fn install_widget_provider(
        &self,
        profile: Profile,
        package: &str,
        class_name: &str,
        label: &str,
    ) {
        let mut inner = lock_unpoisoned(&self.inner);
        let entry = inner
            .packages
            .entry((profile, package.to_string()))
            .or_default();
        entry.widget_providers.push(WidgetProviderInfo {
            component: ComponentName::new(package, class_name),
            label: label.to_string(),
        });
    }

    pub fn install_shortcut_creator(
        &self,
        profile: Profile,
        package: &str,
        class_name: &str,
        label: &str,
    ) {
        let mut inner = lock_unpoisoned(&self.inner);
        let entry = inner
            .packages
            .entry((profile, package.to_string()))
            .or_default();
        entry.shortcut_creators.push(ShortcutCreatorInfo {
            component: ComponentName::new(package, class_name),
            label: label.to_string(),
        });
    }

    /// Removes a package under one profile and fires the matching change
    /// event, like an uninstall broadcast.
    pub fn remove_package(&self, profile: Profile, package: &str) {
        {
            let mut inner = lock_unpoisoned(&self.inner);
            inner.packages.remove(&(profile, package.to_string()));
        }
        self.notify_change(profile, &[package]);
    }

    /// Marks a package so enumeration and raw fetch fail for it, simulating
    /// a missing or corrupt package mid-query.
    pub fn poison_package(&self, profile: Profile, package: &str) {
        let mut inner = lock_unpoisoned(&self.inner);
        if let Some(entry) = inner.packages.get_mut(&(profile, package.to_string())) {
            entry.poisoned = true;
        }
    }

    /// Marks a whole profile as unavailable so scoped queries fail for it.
    pub fn set_profile_unavailable(&self, profile: Profile, unavailable: bool) {
        let mut inner = lock_unpoisoned(&self.inner);
        inner.unavailable_profiles.retain(|p| *p != profile);
        if unavailable {
            inner.unavailable_profiles.push(profile);
        }
    }

    /// Fires a package-change event without mutating installed state, like an
    /// in-place update broadcast.
    pub fn notify_change(&self, profile: Profile, packages: &[&str]) {
        let event = PackageChangeEvent {
            profile,
            packages: packages.iter().map(|p| p.to_string()).collect(),
        };
        debug!(profile = ?event.profile, packages = ?event.packages, "package change");
        // Nobody listening yet is fine; events are re-query hints, not state.
        let _ = self.changes_tx.send(event);
    }

    /// Number of raw-fetch calls observed for one handle. Lets tests assert
    /// single-flight and invalidation behavior.
    pub fn resolve_call_count(&self, handle: &ComponentHandle) -> u64 {
        lock_unpoisoned(&self.inner)
            .resolve_calls
            .get(handle)
            .copied()
            .unwrap_or(0)
    }

    fn collect<T: Clone>(
        &self,
        profile: Profile,
        pick: impl Fn(&InstalledPackage) -> &Vec<T>,
    ) -> DirectoryResult<Vec<T>> {
        let inner = lock_unpoisoned(&self.inner);
        if inner.unavailable_profiles.contains(&profile) {
            return Err(DirectoryError::ProfileUnavailable(profile));
        }
        let mut out = Vec::new();
        let mut keys: Vec<&(Profile, String)> = inner
            .packages
            .keys()
            .filter(|(p, _)| *p == profile)
            .collect();
        keys.sort();
        for key in keys {
            let entry = &inner.packages[key];
            if entry.poisoned {
                // A single bad package must not corrupt the whole list.
                warn!(package = %key.1, "skipping package that failed enumeration");
                continue;
            }
            out.extend(pick(entry).iter().cloned());
        }
        Ok(out)
    }
}

impl ComponentDirectory for InMemoryComponentDirectory {
    fn list_activities(&self, profile: Profile) -> DirectoryResult<Vec<ActivityInfo>> {
        self.collect(profile, |entry| &entry.activities)
    }

    fn list_shortcuts(&self, profile: Profile) -> DirectoryResult<Vec<ShortcutInfo>> {
        self.collect(profile, |entry| &entry.shortcuts)
    }

    fn list_shortcut_creators(
        &self,
        profile: Profile,
    ) -> DirectoryResult<Vec<ShortcutCreatorInfo>> {
        self.collect(profile, |entry| &entry.shortcut_creators)
    }

    fn list_widget_providers(
        &self,
        profile: Profile,
    ) -> DirectoryResult<Vec<WidgetProviderInfo>> {
        self.collect(profile, |entry| &entry.widget_providers)
    }

    fn resolve_raw(&self, handle: &ComponentHandle) -> DirectoryResult<RawComponentInfo> {
        let mut inner = lock_unpoisoned(&self.inner);
        *inner.resolve_calls.entry(handle.clone()).or_insert(0) += 1;

        let key = (handle.profile(), handle.package().to_string());
        let Some(entry) = inner.packages.get(&key) else {
            return Err(DirectoryError::PackageUnavailable(
                handle.package().to_string(),
            ));
        };
        if entry.poisoned {
            return Err(DirectoryError::PackageUnavailable(
                handle.package().to_string(),
            ));
        }

        match handle {
            ComponentHandle::Application { .. } => entry
                .activities
                .first()
                .map(|activity| RawComponentInfo {
                    label: activity.label.clone(),
                    icon: activity.icon,
                })
                .ok_or_else(|| DirectoryError::ComponentNotFound(handle.package().to_string())),
            ComponentHandle::Activity { component, .. } => entry
                .activities
                .iter()
                .find(|activity| activity.component == *component)
                .map(|activity| RawComponentInfo {
                    label: activity.label.clone(),
                    icon: activity.icon,
                })
                .ok_or_else(|| DirectoryError::ComponentNotFound(component.class_name.clone())),
            ComponentHandle::Shortcut { shortcut_id, .. } => entry
                .shortcuts
                .iter()
                .find(|shortcut| shortcut.shortcut_id == *shortcut_id)
                .map(|shortcut| RawComponentInfo {
                    label: shortcut.label.clone(),
                    icon: shortcut.icon,
                })
                .ok_or_else(|| DirectoryError::ComponentNotFound(shortcut_id.clone())),
            ComponentHandle::ShortcutCreator { component, .. } => entry
                .shortcut_creators
                .iter()
                .find(|creator| creator.component == *component)
                .map(|creator| RawComponentInfo {
                    label: creator.label.clone(),
                    icon: None,
                })
                .ok_or_else(|| DirectoryError::ComponentNotFound(component.class_name.clone())),
        }
    }

    fn subscribe_changes(&self) -> broadcast::Receiver<PackageChangeEvent> {
        self.changes_tx.subscribe()
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
