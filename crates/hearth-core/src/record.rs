//! Aggregation engine output unit.

use serde::{Deserialize, Serialize};

use crate::handle::ComponentHandle;
use crate::metadata::ComponentMetadata;

/// One live component joined with its persisted metadata (or the default).
///
/// Exactly one record exists per live OS component visible under the current
/// effective profile set; records disappear as soon as the OS reports the
/// component gone, even if a metadata row lingers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComponentRecord {
    pub handle: ComponentHandle,
    pub metadata: ComponentMetadata,
}

impl ComponentRecord {
    pub fn new(handle: ComponentHandle, metadata: ComponentMetadata) -> Self {
        Self { handle, metadata }
    }

    pub fn with_default_metadata(handle: ComponentHandle) -> Self {
        Self {
            handle,
            metadata: ComponentMetadata::default(),
        }
    }
}
