//! Structural component identity used as cache key and diff identity.

use serde::{Deserialize, Serialize};

use crate::profile::Profile;

/// Fully qualified activity class within a package.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ComponentName {
    pub package: String,
    pub class_name: String,
}

impl ComponentName {
    pub fn new(package: impl Into<String>, class_name: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            class_name: class_name.into(),
        }
    }
}

/// Discriminated identity for one launchable OS entity.
///
/// Equality and hashing are structural: two handles naming the same OS entity
/// compare equal regardless of when or how they were built. The derived
/// ordering is total and is used to break presentation-order ties.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ComponentHandle {
    Application {
        package: String,
        profile: Profile,
    },
    Activity {
        component: ComponentName,
        profile: Profile,
    },
    Shortcut {
        package: String,
        shortcut_id: String,
        profile: Profile,
    },
    ShortcutCreator {
        component: ComponentName,
        profile: Profile,
    },
}

impl ComponentHandle {
    pub fn activity(component: ComponentName, profile: Profile) -> Self {
        ComponentHandle::Activity { component, profile }
    }

    /// Package owning the component, total over every variant.
    pub fn package(&self) -> &str {
        match self {
            ComponentHandle::Application { package, .. } => package,
            ComponentHandle::Activity { component, .. } => &component.package,
            ComponentHandle::Shortcut { package, .. } => package,
            ComponentHandle::ShortcutCreator { component, .. } => &component.package,
        }
    }

    pub fn profile(&self) -> Profile {
        match self {
            ComponentHandle::Application { profile, .. }
            | ComponentHandle::Activity { profile, .. }
            | ComponentHandle::Shortcut { profile, .. }
            | ComponentHandle::ShortcutCreator { profile, .. } => *profile,
        }
    }

    pub fn kind_str(&self) -> &'static str {
        match self {
            ComponentHandle::Application { .. } => "application",
            ComponentHandle::Activity { .. } => "activity",
            ComponentHandle::Shortcut { .. } => "shortcut",
            ComponentHandle::ShortcutCreator { .. } => "shortcut_creator",
        }
    }
}
