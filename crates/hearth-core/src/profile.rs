//! OS user-profile identity and profile-set snapshots.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// Enumerates supported `ProfileKind` values.
pub enum ProfileKind {
    Personal,
    Work,
    Private,
}

impl ProfileKind {
    pub fn as_str(self) -> &'static str {
        match self {
            ProfileKind::Personal => "personal",
            ProfileKind::Work => "work",
            ProfileKind::Private => "private",
        }
    }
}

/// One OS user context under which components are enumerated separately.
///
/// Equality is structural; two values naming the same OS user compare equal
/// regardless of where they were constructed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Profile {
    pub kind: ProfileKind,
    pub user_id: u32,
}

impl Profile {
    pub fn new(kind: ProfileKind, user_id: u32) -> Self {
        Self { kind, user_id }
    }
}

/// A secondary profile together with its current quiet-mode state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileState {
    pub profile: Profile,
    pub is_enabled: bool,
}

/// Snapshot of every profile known to the OS at one point in time.
///
/// Exactly one profile is primary and the primary cannot be disabled;
/// secondary profiles toggle independently.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProfileSet {
    pub primary: Profile,
    pub secondary: Vec<ProfileState>,
}

impl ProfileSet {
    pub fn new(primary: Profile, secondary: Vec<ProfileState>) -> Self {
        Self { primary, secondary }
    }

    pub fn primary_only(primary: Profile) -> Self {
        Self {
            primary,
            secondary: Vec::new(),
        }
    }

    /// All profiles in the set, primary first.
    pub fn all_profiles(&self) -> Vec<Profile> {
        let mut profiles = Vec::with_capacity(1 + self.secondary.len());
        profiles.push(self.primary);
        profiles.extend(self.secondary.iter().map(|state| state.profile));
        profiles
    }

    pub fn is_enabled(&self, profile: Profile) -> bool {
        if profile == self.primary {
            return true;
        }
        self.secondary
            .iter()
            .find(|state| state.profile == profile)
            .map(|state| state.is_enabled)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
/// OS profile-lifecycle broadcasts that trigger a profile-set requery.
pub enum ProfileLifecycleSignal {
    Added,
    Removed,
    Available,
    Unavailable,
    Unlocked,
}
