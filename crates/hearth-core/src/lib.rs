//! Shared domain types for the Hearth launcher core.
//!
//! Defines profile, component-handle, metadata, record, and resource types
//! used by the directory adapters, metadata store, resource cache, and
//! aggregation engine.

pub mod handle;
pub mod metadata;
pub mod profile;
pub mod record;
pub mod resource;
pub mod time_utils;

pub use handle::{ComponentHandle, ComponentName};
pub use metadata::{ComponentMetadata, MetadataKey};
pub use profile::{Profile, ProfileKind, ProfileLifecycleSignal, ProfileSet, ProfileState};
pub use record::ComponentRecord;
pub use resource::{ArgbColor, IconArtwork, RawComponentInfo, RawIcon, RenderableIcon, Resource};
pub use time_utils::current_unix_timestamp_ms;
