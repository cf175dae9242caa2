//! Field resolution
//!
//! Precedence per field, in schema order:
//! 1. an override that carries a concrete value
//! 2. the schema default
//! 3. nothing (the key is left out of the result)

use serde_json::{Map, Value};

use crate::field::FieldDef;
use crate::flatten::unflatten;
use crate::value::{OverrideValue, Overrides};

/// Resolve each field to its flat dotted name, in schema order.
pub fn resolve_flat(defs: &[FieldDef], overrides: Option<&Overrides>) -> Map<String, Value> {
    let mut flat = Map::new();

    for def in defs {
        let overridden = overrides
            .and_then(|o| o.get_path(&def.name))
            .and_then(OverrideValue::to_json);

        if let Some(value) = overridden.or_else(|| def.default.clone()) {
            flat.insert(def.name.clone(), value);
        }
    }

    flat
}

/// Resolve a module's field definitions against optional overrides into the
/// nested config that is persisted for the module.
pub fn resolve(defs: &[FieldDef], overrides: Option<&Overrides>) -> Map<String, Value> {
    unflatten(&resolve_flat(defs, overrides))
}
