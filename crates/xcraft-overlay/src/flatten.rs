//! Dotted-path helpers
//!
//! Field names are dotted paths (`bus.port`). On disk every segment is a
//! nested object, so flat maps coming from field resolution or from
//! reconfiguration answers are unflattened before they are written.

use serde_json::{Map, Value};

use crate::merge::merge_maps;

/// Split a dotted field name into its path segments.
pub fn segments(name: &str) -> impl Iterator<Item = &str> {
    name.split('.')
}

/// Build the nested object for a single dotted key.
fn nest(name: &str, value: Value) -> Map<String, Value> {
    let mut parts: Vec<&str> = segments(name).collect();
    let last = parts.pop().unwrap_or(name);

    let mut node = Map::new();
    node.insert(last.to_string(), value);
    for part in parts.into_iter().rev() {
        let mut parent = Map::new();
        parent.insert(part.to_string(), Value::Object(node));
        node = parent;
    }
    node
}

/// Turn a flat map of dotted names into a nested object.
///
/// Keys are applied in iteration order; a later key that targets a path
/// below an earlier scalar replaces that scalar with an object.
pub fn unflatten(flat: &Map<String, Value>) -> Map<String, Value> {
    let mut nested = Map::new();
    merge_flat(&mut nested, flat);
    nested
}

/// Deep-merge a flat map of dotted names into an existing nested object.
///
/// Branches of `target` not named by `flat` are preserved, and applying the
/// same `flat` map twice leaves `target` as after the first application.
pub fn merge_flat(target: &mut Map<String, Value>, flat: &Map<String, Value>) {
    for (name, value) in flat {
        merge_maps(target, nest(name, value.clone()));
    }
}

/// Look up the value stored at a dotted path.
pub fn lookup<'a>(config: &'a Map<String, Value>, name: &str) -> Option<&'a Value> {
    let mut parts = segments(name);
    let mut current = config.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn map(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_unflatten_nested_keys() {
        let flat = map(json!({
            "bus.host": "localhost",
            "bus.port": 35400,
            "verbose": true
        }));
        let nested = unflatten(&flat);

        assert_eq!(
            Value::Object(nested),
            json!({"bus": {"host": "localhost", "port": 35400}, "verbose": true})
        );
    }

    #[test]
    fn test_unflatten_deep_path() {
        let nested = unflatten(&map(json!({"a.b.c.d": 1})));
        assert_eq!(Value::Object(nested), json!({"a": {"b": {"c": {"d": 1}}}}));
    }

    #[test]
    fn test_merge_flat_preserves_siblings() {
        let mut target = map(json!({"a": 1, "bus": {"host": "h", "port": 1}}));
        merge_flat(&mut target, &map(json!({"bus.port": 2})));

        assert_eq!(
            Value::Object(target),
            json!({"a": 1, "bus": {"host": "h", "port": 2}})
        );
    }

    #[test]
    fn test_merge_flat_is_idempotent() {
        let answers = map(json!({"a": 2, "b.c": [1, 2], "b.d": "x"}));
        let mut once = map(json!({"a": 1, "b": {"c": [9], "e": true}}));
        merge_flat(&mut once, &answers);

        let mut twice = once.clone();
        merge_flat(&mut twice, &answers);

        assert_eq!(once, twice);
    }

    #[test]
    fn test_lookup() {
        let config = map(json!({"bus": {"port": 35400}, "name": "x"}));

        assert_eq!(lookup(&config, "bus.port"), Some(&json!(35400)));
        assert_eq!(lookup(&config, "name"), Some(&json!("x")));
        assert_eq!(lookup(&config, "bus.host"), None);
        assert_eq!(lookup(&config, "name.sub"), None);
    }
}
