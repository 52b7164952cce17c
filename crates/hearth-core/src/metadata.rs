//! Persisted per-component user metadata and its stable key.

use serde::{Deserialize, Serialize};

use crate::handle::{ComponentHandle, ComponentName};
use crate::profile::Profile;

/// User-controlled flags persisted per activity. Absent rows mean the
/// documented default of `{pinned: false, hidden: false}`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentMetadata {
    pub is_pinned: bool,
    pub is_hidden: bool,
}

impl ComponentMetadata {
    pub fn with_pinned(self, is_pinned: bool) -> Self {
        Self { is_pinned, ..self }
    }

    pub fn with_hidden(self, is_hidden: bool) -> Self {
        Self { is_hidden, ..self }
    }
}

/// Stable metadata-store key. Only activities carry persisted metadata;
/// every other handle kind always resolves to the default.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct MetadataKey {
    pub component: ComponentName,
    pub profile: Profile,
}

impl MetadataKey {
    pub fn new(component: ComponentName, profile: Profile) -> Self {
        Self { component, profile }
    }

    /// Key for a handle, or `None` for handle kinds without persisted rows.
    pub fn for_handle(handle: &ComponentHandle) -> Option<Self> {
        match handle {
            ComponentHandle::Activity { component, profile } => Some(Self {
                component: component.clone(),
                profile: *profile,
            }),
            _ => None,
        }
    }
}
