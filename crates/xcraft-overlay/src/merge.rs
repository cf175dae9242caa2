//! Deep merge of JSON configuration trees
//!
//! Merge semantics:
//! - Objects: deep-merge by key
//! - Arrays: REPLACE (last wins)
//! - Scalars: override (last wins)

use serde_json::{Map, Value};

/// Deep merge two JSON values.
///
/// - Objects: deep-merge by key (recursive)
/// - Arrays: REPLACE (second wins entirely)
/// - Scalars: override (second wins)
/// - Null: override (null can override any value)
pub fn deep_merge(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base_map), Value::Object(overlay_map)) => {
            merge_maps(&mut base_map, overlay_map);
            Value::Object(base_map)
        }

        // Arrays: REPLACE (no concatenation, no index-wise merge)
        (Value::Array(_), overlay @ Value::Array(_)) => overlay,

        (_, overlay) => overlay,
    }
}

/// Deep merge `overlay` into `base` in place.
///
/// Keys already present in `base` keep their position; new keys are appended.
pub fn merge_maps(base: &mut Map<String, Value>, overlay: Map<String, Value>) {
    for (key, overlay_value) in overlay {
        let merged = match base.get_mut(&key) {
            Some(base_value) => deep_merge(base_value.take(), overlay_value),
            None => overlay_value,
        };
        base.insert(key, merged);
    }
}
