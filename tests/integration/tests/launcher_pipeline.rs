//! End-to-end launcher pipeline tests wiring the real in-memory backends
//! through the facade: profile directory, component directory, metadata
//! store, resource cache, and aggregation engine together.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;

use hearth_aggregator::view;
use hearth_aggregator::{Launcher, LauncherConfig, SharedSnapshot};
use hearth_core::{
    ComponentHandle, ComponentMetadata, ComponentName, MetadataKey, Profile, ProfileKind,
    ProfileLifecycleSignal, ProfileSet, ProfileState,
};
use hearth_directory::InMemoryComponentDirectory;
use hearth_profiles::{ProfileDirectory, StaticProfileSource};
use hearth_store::{InMemoryMetadataStore, MetadataStore, SqliteMetadataStore};

const OWN_PACKAGE: &str = "app.hearth";
const EMISSION_TIMEOUT: Duration = Duration::from_secs(5);

fn personal() -> Profile {
    Profile::new(ProfileKind::Personal, 0)
}

fn work() -> Profile {
    Profile::new(ProfileKind::Work, 10)
}

fn activity(package: &str, class: &str, profile: Profile) -> ComponentHandle {
    ComponentHandle::activity(ComponentName::new(package, class), profile)
}

struct World {
    directory: Arc<InMemoryComponentDirectory>,
    source: Arc<StaticProfileSource>,
    profiles: Arc<ProfileDirectory>,
}

impl World {
    fn new(set: ProfileSet) -> Self {
        // RUST_LOG=debug surfaces engine/cache traces when a test misbehaves.
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
        let source = StaticProfileSource::new(set);
        let profiles = Arc::new(ProfileDirectory::new(source.clone()));
        Self {
            directory: Arc::new(InMemoryComponentDirectory::new()),
            source,
            profiles,
        }
    }

    fn launcher(&self, store: Arc<dyn MetadataStore>) -> Launcher {
        Launcher::start(LauncherConfig {
            own_package: OWN_PACKAGE.to_string(),
            directory: self.directory.clone(),
            metadata_store: store,
            profile_directory: self.profiles.clone(),
        })
    }
}

async fn next_snapshot(
    rx: &mut tokio::sync::watch::Receiver<SharedSnapshot>,
) -> SharedSnapshot {
    timeout(EMISSION_TIMEOUT, rx.changed())
        .await
        .expect("snapshot emission within timeout")
        .expect("engine alive");
    rx.borrow_and_update().clone()
}

#[tokio::test]
async fn records_carry_defaults_for_unstored_components() {
    let world = World::new(ProfileSet::primary_only(personal()));
    world
        .directory
        .install_activity(personal(), "com.mail", ".Inbox", "Mail", None);
    world
        .directory
        .install_activity(personal(), "com.photos", ".Gallery", "Photos", None);

    let mut launcher = world.launcher(Arc::new(InMemoryMetadataStore::new()));
    let snapshot = launcher.current_records();

    assert_eq!(snapshot.records.len(), 2);
    for record in &snapshot.records {
        assert_eq!(record.metadata, ComponentMetadata::default());
    }

    launcher.shutdown().await;
}

#[tokio::test]
async fn pinning_round_trips_through_store_and_records() {
    let world = World::new(ProfileSet::primary_only(personal()));
    world
        .directory
        .install_activity(personal(), "com.mail", ".Inbox", "Mail", None);

    let store = Arc::new(InMemoryMetadataStore::new());
    let mut launcher = world.launcher(store.clone());
    let handle = activity("com.mail", ".Inbox", personal());

    let mut rx = launcher.records();
    rx.mark_unchanged();
    launcher.set_pinned(&handle, true).await.expect("set_pinned");

    // The store is the source of truth...
    let key = MetadataKey::for_handle(&handle).expect("activity key");
    let stored = store.get(&key).await.expect("get").expect("row present");
    assert!(stored.is_pinned);
    assert!(!stored.is_hidden);

    // ...and the write shows up in the next published snapshot.
    let snapshot = next_snapshot(&mut rx).await;
    assert!(snapshot.records[0].metadata.is_pinned);

    launcher.shutdown().await;
}

#[tokio::test]
async fn hiding_preserves_the_pinned_flag() {
    let world = World::new(ProfileSet::primary_only(personal()));
    world
        .directory
        .install_activity(personal(), "com.mail", ".Inbox", "Mail", None);

    let store = Arc::new(InMemoryMetadataStore::new());
    let mut launcher = world.launcher(store.clone());
    let handle = activity("com.mail", ".Inbox", personal());

    launcher.set_pinned(&handle, true).await.expect("set_pinned");
    launcher.set_hidden(&handle, true).await.expect("set_hidden");

    let key = MetadataKey::for_handle(&handle).expect("activity key");
    let stored = store.get(&key).await.expect("get").expect("row present");
    assert!(stored.is_pinned);
    assert!(stored.is_hidden);

    launcher.shutdown().await;
}

#[tokio::test]
async fn pinning_a_shortcut_handle_is_rejected() {
    let world = World::new(ProfileSet::primary_only(personal()));
    let launcher = Arc::new(world.launcher(Arc::new(InMemoryMetadataStore::new())));

    let shortcut = ComponentHandle::Shortcut {
        package: "com.mail".to_string(),
        shortcut_id: "compose".to_string(),
        profile: personal(),
    };
    // Fails fast in dev builds (debug assertion), errors in release.
    let outcome = tokio::spawn({
        let launcher = Arc::clone(&launcher);
        async move { launcher.set_pinned(&shortcut, true).await }
    })
    .await;
    match outcome {
        Err(join_error) => assert!(join_error.is_panic()),
        Ok(result) => assert!(result.is_err()),
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn concurrent_resolves_share_one_fetch() {
    let world = World::new(ProfileSet::primary_only(personal()));
    world
        .directory
        .install_activity(personal(), "com.mail", ".Inbox", "Mail", None);

    let launcher = Arc::new(world.launcher(Arc::new(InMemoryMetadataStore::new())));
    let handle = activity("com.mail", ".Inbox", personal());

    let first = tokio::spawn({
        let launcher = Arc::clone(&launcher);
        let handle = handle.clone();
        async move { launcher.resolve(&handle).await }
    });
    let second = tokio::spawn({
        let launcher = Arc::clone(&launcher);
        let handle = handle.clone();
        async move { launcher.resolve(&handle).await }
    });

    let first = first.await.expect("first resolve");
    let second = second.await.expect("second resolve");
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(world.directory.resolve_call_count(&handle), 1);
}

#[tokio::test]
async fn package_change_forces_a_fresh_fetch() {
    let world = World::new(ProfileSet::primary_only(personal()));
    world
        .directory
        .install_activity(personal(), "com.mail", ".Inbox", "Mail", None);

    let mut launcher = world.launcher(Arc::new(InMemoryMetadataStore::new()));
    let handle = activity("com.mail", ".Inbox", personal());

    launcher.resolve(&handle).await;
    assert_eq!(world.directory.resolve_call_count(&handle), 1);

    world.directory.notify_change(personal(), &["com.mail"]);

    // Eviction is asynchronous; poll until the next resolve refetches.
    let mut waited = 0;
    loop {
        launcher.resolve(&handle).await;
        if world.directory.resolve_call_count(&handle) >= 2 {
            break;
        }
        assert!(waited < 200, "cache never refetched after package change");
        tokio::time::sleep(Duration::from_millis(5)).await;
        waited += 1;
    }

    launcher.shutdown().await;
}

#[tokio::test]
async fn added_work_profile_appears_with_badged_resources() {
    let world = World::new(ProfileSet::primary_only(personal()));
    world
        .directory
        .install_activity(work(), "com.chat", ".Main", "Chat", None);

    let mut launcher = world.launcher(Arc::new(InMemoryMetadataStore::new()));
    assert!(launcher.current_records().records.is_empty());

    let mut rx = launcher.records();
    rx.mark_unchanged();
    world.source.replace(ProfileSet::new(
        personal(),
        vec![ProfileState {
            profile: work(),
            is_enabled: true,
        }],
    ));
    world
        .profiles
        .handle_lifecycle_signal(ProfileLifecycleSignal::Added);

    let snapshot = next_snapshot(&mut rx).await;
    let chat = activity("com.chat", ".Main", work());
    assert!(snapshot.records.iter().any(|record| record.handle == chat));

    let resource = launcher.resolve(&chat).await;
    assert_eq!(resource.icon.badge, Some(ProfileKind::Work));

    launcher.shutdown().await;
}

#[tokio::test]
async fn pinned_intent_survives_restart() {
    let temp = tempfile::tempdir().expect("tempdir");
    let db_path = temp.path().join("metadata.sqlite");

    let world = World::new(ProfileSet::primary_only(personal()));
    world
        .directory
        .install_activity(personal(), "com.mail", ".Inbox", "Mail", None);
    let handle = activity("com.mail", ".Inbox", personal());

    {
        let store = Arc::new(SqliteMetadataStore::new(&db_path).expect("open store"));
        let mut launcher = world.launcher(store);
        launcher.set_pinned(&handle, true).await.expect("set_pinned");
        launcher.shutdown().await;
    }

    let store = Arc::new(SqliteMetadataStore::new(&db_path).expect("reopen store"));
    let mut launcher = world.launcher(store);
    let snapshot = launcher.current_records();
    assert!(snapshot.records[0].metadata.is_pinned);

    launcher.shutdown().await;
}

#[tokio::test]
async fn prune_drops_rows_for_uninstalled_components() {
    let world = World::new(ProfileSet::primary_only(personal()));
    world
        .directory
        .install_activity(personal(), "com.mail", ".Inbox", "Mail", None);

    let store = Arc::new(InMemoryMetadataStore::new());
    let dead_key = MetadataKey::new(ComponentName::new("com.gone", ".Main"), personal());
    store
        .upsert(dead_key.clone(), ComponentMetadata::default().with_pinned(true))
        .await
        .expect("seed orphan");

    let mut launcher = world.launcher(store.clone());
    let handle = activity("com.mail", ".Inbox", personal());
    launcher.set_pinned(&handle, true).await.expect("set_pinned");

    let pruned = launcher.prune_orphan_metadata().await.expect("prune");
    assert_eq!(pruned, 1);
    assert!(store.get(&dead_key).await.expect("get").is_none());

    let live_key = MetadataKey::for_handle(&handle).expect("activity key");
    assert!(store.get(&live_key).await.expect("get").is_some());

    launcher.shutdown().await;
}

#[tokio::test]
async fn projected_view_orders_pinned_first_with_labels() {
    let world = World::new(ProfileSet::primary_only(personal()));
    world
        .directory
        .install_activity(personal(), "com.zebra", ".Main", "Zebra", None);
    world
        .directory
        .install_activity(personal(), "com.apple", ".Main", "Apple", None);

    let mut launcher = world.launcher(Arc::new(InMemoryMetadataStore::new()));
    let zebra = activity("com.zebra", ".Main", personal());
    launcher.set_pinned(&zebra, true).await.expect("set_pinned");

    let mut rx = launcher.records();
    let snapshot = loop {
        let snapshot = rx.borrow_and_update().clone();
        if snapshot.records.iter().any(|record| record.metadata.is_pinned) {
            break snapshot;
        }
        timeout(EMISSION_TIMEOUT, rx.changed())
            .await
            .expect("emission")
            .expect("engine alive");
    };

    let mut resources = std::collections::HashMap::new();
    for record in &snapshot.records {
        resources.insert(record.handle.clone(), launcher.resolve(&record.handle).await);
    }

    let items = view::project(&snapshot.records, &resources);
    let labels: Vec<&str> = items.iter().map(|item| item.label.as_str()).collect();
    assert_eq!(labels, vec!["Zebra", "Apple"]);

    launcher.shutdown().await;
}
