//! xcraft overlay
//!
//! Pure resolution of module configuration from schema field definitions
//! and override trees. Nothing in this crate touches the filesystem.

pub mod error;
pub mod field;
pub mod flatten;
pub mod merge;
pub mod resolve;
pub mod value;

pub use error::OverlayError;
pub use field::FieldDef;
pub use flatten::{lookup, merge_flat, unflatten};
pub use merge::{deep_merge, merge_maps};
pub use resolve::{resolve, resolve_flat};
pub use value::{is_negative_zero, ModuleOverrides, OverrideValue, Overrides};

/// A module's resolved, nested configuration.
pub type ModuleConfig = serde_json::Map<String, serde_json::Value>;
