//! Override values
//!
//! An override tree mirrors a module config: tables nest by path segment,
//! leaves carry either a concrete value or [`OverrideValue::UseDefault`],
//! which tells resolution to fall through to the field's schema default.

use std::collections::btree_map::{self, BTreeMap};

use serde_json::{Map, Value};

use crate::error::OverlayError;
use crate::flatten::segments;

/// A single node of an override tree.
#[derive(Debug, Clone, PartialEq)]
pub enum OverrideValue {
    /// Do not override; the schema default applies.
    UseDefault,
    /// A concrete replacement value (never a JSON object).
    Value(Value),
    /// A nested table of overrides.
    Table(Overrides),
}

/// True for an IEEE-754 negative zero stored in a JSON number.
///
/// Override documents on disk have no tagged form, so `-0.0` is the
/// spelling of [`OverrideValue::UseDefault`] there.
pub fn is_negative_zero(value: &Value) -> bool {
    match value {
        Value::Number(n) => n.is_f64() && n.as_f64().is_some_and(|f| f == 0.0 && f.is_sign_negative()),
        _ => false,
    }
}

/// Copy of `value` with every negative zero nested in arrays written as `0`.
///
/// The sentinel only has meaning where a field default can take over;
/// inside an array there is none, so the sign is dropped.
fn normalize_zeros(value: &Value) -> Value {
    match value {
        v if is_negative_zero(v) => Value::from(0),
        Value::Array(items) => Value::Array(items.iter().map(normalize_zeros).collect()),
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), normalize_zeros(v)))
                .collect(),
        ),
        v => v.clone(),
    }
}

impl OverrideValue {
    /// Build an override node from a JSON value.
    ///
    /// Objects become tables (dotted keys expanded), negative zero becomes
    /// [`OverrideValue::UseDefault`], anything else is a concrete value.
    pub fn from_json(value: Value) -> Self {
        match value {
            Value::Object(map) => OverrideValue::Table(Overrides::from_map(map)),
            v if is_negative_zero(&v) => OverrideValue::UseDefault,
            v => OverrideValue::Value(v),
        }
    }

    /// The JSON value this override contributes, if any.
    ///
    /// Tables are rendered as objects with their `UseDefault` leaves dropped.
    pub fn to_json(&self) -> Option<Value> {
        match self {
            OverrideValue::UseDefault => None,
            OverrideValue::Value(v) if is_negative_zero(v) => None,
            OverrideValue::Value(v) => Some(normalize_zeros(v)),
            OverrideValue::Table(table) => Some(Value::Object(table.to_json())),
        }
    }

    pub fn as_table(&self) -> Option<&Overrides> {
        match self {
            OverrideValue::Table(table) => Some(table),
            _ => None,
        }
    }
}

impl From<Value> for OverrideValue {
    fn from(value: Value) -> Self {
        OverrideValue::from_json(value)
    }
}

impl From<Overrides> for OverrideValue {
    fn from(table: Overrides) -> Self {
        OverrideValue::Table(table)
    }
}

/// A tree of overrides keyed by path segment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Overrides {
    entries: BTreeMap<String, OverrideValue>,
}

impl Overrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a JSON object, expanding dotted keys into nested tables.
    pub fn from_map(map: Map<String, Value>) -> Self {
        let mut overrides = Self::new();
        for (key, value) in map {
            overrides.insert(&key, OverrideValue::from_json(value));
        }
        overrides
    }

    /// Build from a JSON document that must be an object.
    pub fn from_json(value: Value) -> Result<Self, OverlayError> {
        match value {
            Value::Object(map) => Ok(Self::from_map(map)),
            other => Err(OverlayError::NotATable(json_kind(&other))),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn iter(&self) -> btree_map::Iter<'_, String, OverrideValue> {
        self.entries.iter()
    }

    /// Direct child lookup (no path splitting).
    pub fn get(&self, key: &str) -> Option<&OverrideValue> {
        self.entries.get(key)
    }

    /// Set the override at a dotted path, creating intermediate tables.
    ///
    /// A scalar sitting where an intermediate table is needed is replaced.
    /// Inserting a table merges into an existing table at that path.
    pub fn insert(&mut self, path: &str, value: impl Into<OverrideValue>) {
        let parts: Vec<&str> = segments(path).collect();
        self.insert_at(&parts, value.into());
    }

    fn insert_at(&mut self, parts: &[&str], value: OverrideValue) {
        match parts {
            [] => {}
            [last] => self.put(last.to_string(), value),
            [head, rest @ ..] => {
                let mut child = match self.entries.remove(*head) {
                    Some(OverrideValue::Table(table)) => table,
                    _ => Overrides::new(),
                };
                child.insert_at(rest, value);
                self.entries
                    .insert(head.to_string(), OverrideValue::Table(child));
            }
        }
    }

    /// Resolve a dotted path through nested tables.
    pub fn get_path(&self, path: &str) -> Option<&OverrideValue> {
        let mut parts = segments(path);
        let mut current = self.entries.get(parts.next()?)?;
        for part in parts {
            current = current.as_table()?.entries.get(part)?;
        }
        Some(current)
    }

    /// Deep-merge `other` over `self`: tables merge recursively, every other
    /// node from `other` replaces what was there.
    pub fn merge(&mut self, other: Overrides) {
        for (key, value) in other.entries {
            self.put(key, value);
        }
    }

    fn put(&mut self, key: String, value: OverrideValue) {
        if let OverrideValue::Table(incoming) = value {
            if let Some(OverrideValue::Table(existing)) = self.entries.get_mut(&key) {
                existing.merge(incoming);
                return;
            }
            self.entries.insert(key, OverrideValue::Table(incoming));
            return;
        }
        self.entries.insert(key, value);
    }

    /// Render as a JSON object, dropping `UseDefault` leaves.
    pub fn to_json(&self) -> Map<String, Value> {
        self.entries
            .iter()
            .filter_map(|(key, value)| value.to_json().map(|v| (key.clone(), v)))
            .collect()
    }
}

impl<'a> IntoIterator for &'a Overrides {
    type Item = (&'a String, &'a OverrideValue);
    type IntoIter = btree_map::Iter<'a, String, OverrideValue>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

/// Override trees keyed by literal module name.
///
/// Module names may contain dots (`goblin.core`), so the module level is
/// never split; dotted paths are only expanded inside each module's table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleOverrides {
    modules: BTreeMap<String, Overrides>,
}

impl ModuleOverrides {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build from a document `{ "<module>": { ...overrides } }`.
    pub fn from_json(value: Value) -> Result<Self, OverlayError> {
        let map = match value {
            Value::Object(map) => map,
            other => return Err(OverlayError::NotATable(json_kind(&other))),
        };

        let mut modules = Self::new();
        for (module, table) in map {
            match table {
                Value::Object(table) => modules.insert(module, Overrides::from_map(table)),
                other => {
                    return Err(OverlayError::ModuleNotATable {
                        module,
                        kind: json_kind(&other),
                    })
                }
            }
        }
        Ok(modules)
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    /// Overrides for one module, looked up by its exact name.
    pub fn module(&self, name: &str) -> Option<&Overrides> {
        self.modules.get(name)
    }

    /// Add overrides for a module, merging over any already present.
    pub fn insert(&mut self, module: impl Into<String>, overrides: Overrides) {
        match self.modules.entry(module.into()) {
            btree_map::Entry::Occupied(mut entry) => entry.get_mut().merge(overrides),
            btree_map::Entry::Vacant(entry) => {
                entry.insert(overrides);
            }
        }
    }

    /// Merge `other` over `self`, module by module (later wins).
    pub fn merge(&mut self, other: ModuleOverrides) {
        for (module, overrides) in other.modules {
            self.insert(module, overrides);
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_negative_zero_detection() {
        assert!(is_negative_zero(&json!(-0.0)));
        assert!(!is_negative_zero(&json!(0.0)));
        assert!(!is_negative_zero(&json!(0)));
        assert!(!is_negative_zero(&json!("-0")));
    }

    #[test]
    fn test_negative_zero_parsed_from_text() {
        let value: Value = serde_json::from_str("-0.0").unwrap();
        assert_eq!(OverrideValue::from_json(value), OverrideValue::UseDefault);
    }

    #[test]
    fn test_from_map_expands_dotted_keys() {
        let overrides = Overrides::from_map(
            json!({"bus.port": 1, "bus": {"host": "h"}})
                .as_object()
                .cloned()
                .unwrap(),
        );

        assert_eq!(
            overrides.get_path("bus.port"),
            Some(&OverrideValue::Value(json!(1)))
        );
        assert_eq!(
            overrides.get_path("bus.host"),
            Some(&OverrideValue::Value(json!("h")))
        );
    }

    #[test]
    fn test_get_path_through_scalar() {
        let mut overrides = Overrides::new();
        overrides.insert("a", json!(5));
        assert_eq!(overrides.get_path("a.b"), None);
    }

    #[test]
    fn test_insert_replaces_scalar_intermediate() {
        let mut overrides = Overrides::new();
        overrides.insert("a", json!(5));
        overrides.insert("a.b", json!(6));
        assert_eq!(overrides.get_path("a.b"), Some(&OverrideValue::Value(json!(6))));
    }

    #[test]
    fn test_merge_later_wins() {
        let mut first = Overrides::from_json(json!({"net": {"port": 1, "host": "a"}})).unwrap();
        let second = Overrides::from_json(json!({"net": {"port": 2}, "log": {"level": 0}})).unwrap();
        first.merge(second);

        assert_eq!(
            Value::Object(first.to_json()),
            json!({"log": {"level": 0}, "net": {"host": "a", "port": 2}})
        );
    }

    #[test]
    fn test_merge_use_default_replaces_value() {
        let mut first = Overrides::new();
        first.insert("net.port", json!(1));
        let mut second = Overrides::new();
        second.insert("net.port", OverrideValue::UseDefault);
        first.merge(second);

        assert_eq!(first.get_path("net.port"), Some(&OverrideValue::UseDefault));
    }

    #[test]
    fn test_to_json_drops_use_default() {
        let mut overrides = Overrides::new();
        overrides.insert("a.b", OverrideValue::UseDefault);
        overrides.insert("a.c", json!(1));

        assert_eq!(Value::Object(overrides.to_json()), json!({"a": {"c": 1}}));
    }

    #[test]
    fn test_array_zeros_lose_their_sign() {
        let value: Value = serde_json::from_str("[-0.0, 1, [-0.0]]").unwrap();
        let rendered = OverrideValue::from_json(value).to_json().unwrap();

        assert_eq!(rendered, json!([0, 1, [0]]));
        assert!(!rendered.to_string().contains('-'));
    }

    #[test]
    fn test_module_names_keep_their_dots() {
        let modules = ModuleOverrides::from_json(json!({
            "goblin.core": {"port": 99, "bus.host": "h"}
        }))
        .unwrap();

        let core = modules.module("goblin.core").unwrap();
        assert_eq!(core.get_path("port"), Some(&OverrideValue::Value(json!(99))));
        assert_eq!(core.get_path("bus.host"), Some(&OverrideValue::Value(json!("h"))));
        assert!(modules.module("goblin").is_none());
    }

    #[test]
    fn test_module_overrides_merge_per_module() {
        let mut first = ModuleOverrides::from_json(json!({"net": {"port": 1, "host": "a"}})).unwrap();
        let second =
            ModuleOverrides::from_json(json!({"net": {"port": -0.0}, "log": {"level": 0}})).unwrap();
        first.merge(second);

        let net = first.module("net").unwrap();
        assert_eq!(net.get_path("port"), Some(&OverrideValue::UseDefault));
        assert_eq!(net.get_path("host"), Some(&OverrideValue::Value(json!("a"))));
        assert_eq!(first.len(), 2);
    }

    #[test]
    fn test_module_value_must_be_object() {
        let err = ModuleOverrides::from_json(json!({"net": 5})).unwrap_err();
        assert!(matches!(err, OverlayError::ModuleNotATable { ref module, .. } if module == "net"));
    }

    #[test]
    fn test_from_json_rejects_non_object() {
        let err = Overrides::from_json(json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("array"));
    }
}
