//! Resolved display resources: labels and render-ready icon descriptions.
//!
//! The core never decodes pixels. Raw icon bytes stay behind opaque handles
//! owned by the OS directory; this module only describes the composition the
//! view layer must render (adaptive layers, legacy fallback, badge).

use serde::{Deserialize, Serialize};

use crate::handle::ComponentHandle;
use crate::profile::ProfileKind;

/// Opaque reference to icon bytes held by the component directory.
pub type RawIconHandle = u64;

/// Raw icon as reported by the OS for one component.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum RawIcon {
    Adaptive {
        background: RawIconHandle,
        foreground: RawIconHandle,
    },
    Bitmap {
        pixmap: RawIconHandle,
    },
}

/// Raw label and icon fetched from the directory for one handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RawComponentInfo {
    pub label: String,
    pub icon: Option<RawIcon>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArgbColor(pub u32);

/// Icon composition produced by the resource cache transform step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IconArtwork {
    /// Adaptive icon composed from its own background and foreground layers.
    Adaptive {
        background: RawIconHandle,
        foreground: RawIconHandle,
    },
    /// Legacy bitmap shaped onto a generated background. The background color
    /// is a deterministic function of the package so it is stable across
    /// restarts.
    Legacy {
        pixmap: RawIconHandle,
        generated_background: ArgbColor,
    },
    /// Well-defined substitute when the raw fetch failed.
    Placeholder,
}

/// Render-ready icon: composed artwork plus the optional profile badge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RenderableIcon {
    pub artwork: IconArtwork,
    pub badge: Option<ProfileKind>,
}

/// Resolved display resource for one component handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub label: String,
    pub icon: RenderableIcon,
}

impl Resource {
    /// Placeholder served when a component vanished mid-resolution. Callers
    /// retry naturally after the next invalidation round.
    pub fn placeholder(handle: &ComponentHandle) -> Self {
        Self {
            label: handle.package().to_string(),
            icon: RenderableIcon {
                artwork: IconArtwork::Placeholder,
                badge: None,
            },
        }
    }
}
