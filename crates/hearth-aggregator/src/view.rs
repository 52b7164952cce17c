//! View projection boundary: turns record snapshots plus resolved resources
//! into render-ready, diffable items with a stable total order.
//!
//! The engine itself never sorts; presentation order lives here so the view
//! layer gets deterministic diffs. Ties are broken by the handle's structural
//! ordering, which is total.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use hearth_core::{ComponentHandle, ComponentRecord, RenderableIcon, Resource};

/// One render-ready entry. `icon` is `None` while the resource is still
/// resolving; the view shows its own loading treatment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ViewItem {
    pub handle: ComponentHandle,
    pub label: String,
    pub icon: Option<RenderableIcon>,
    pub is_pinned: bool,
}

/// Incremental change between two projected lists, keyed by handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewDiff {
    Inserted(ViewItem),
    Updated(ViewItem),
    Removed(ComponentHandle),
}

/// Projects records into display order: hidden records dropped, pinned items
/// first, then case-insensitive label order, handle order as tiebreak.
pub fn project(
    records: &[ComponentRecord],
    resources: &HashMap<ComponentHandle, Arc<Resource>>,
) -> Vec<ViewItem> {
    let mut items: Vec<ViewItem> = records
        .iter()
        .filter(|record| !record.metadata.is_hidden)
        .map(|record| {
            let resource = resources.get(&record.handle);
            ViewItem {
                handle: record.handle.clone(),
                label: resource
                    .map(|resource| resource.label.clone())
                    .unwrap_or_else(|| record.handle.package().to_string()),
                icon: resource.map(|resource| resource.icon),
                is_pinned: record.metadata.is_pinned,
            }
        })
        .collect();

    items.sort_by(|a, b| {
        b.is_pinned
            .cmp(&a.is_pinned)
            .then_with(|| a.label.to_lowercase().cmp(&b.label.to_lowercase()))
            .then_with(|| a.handle.cmp(&b.handle))
    });
    items
}

/// Diffs two projected lists by handle. Removals come first, then inserts and
/// updates in the new list's order, so a view can apply them sequentially.
pub fn diff(old: &[ViewItem], new: &[ViewItem]) -> Vec<ViewDiff> {
    let old_by_handle: HashMap<&ComponentHandle, &ViewItem> =
        old.iter().map(|item| (&item.handle, item)).collect();
    let new_handles: HashSet<&ComponentHandle> = new.iter().map(|item| &item.handle).collect();

    let mut changes = Vec::new();
    for item in old {
        if !new_handles.contains(&item.handle) {
            changes.push(ViewDiff::Removed(item.handle.clone()));
        }
    }
    for item in new {
        match old_by_handle.get(&item.handle) {
            None => changes.push(ViewDiff::Inserted(item.clone())),
            Some(previous) if *previous != item => changes.push(ViewDiff::Updated(item.clone())),
            Some(_) => {}
        }
    }
    changes
}
