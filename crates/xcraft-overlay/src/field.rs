//! Schema field definitions

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Value};

/// A declared configuration field.
///
/// `name` is a dotted path into the module config. `default` distinguishes a
/// missing default (`None`) from an explicit JSON `null` default
/// (`Some(Value::Null)`). Any other keys of the schema record (prompt type,
/// message, choices, ...) are kept in `extra` and passed through untouched.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDef {
    pub name: String,

    #[serde(
        default,
        deserialize_with = "present",
        skip_serializing_if = "Option::is_none"
    )]
    pub default: Option<Value>,

    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn present<'de, D>(deserializer: D) -> Result<Option<Value>, D::Error>
where
    D: Deserializer<'de>,
{
    Value::deserialize(deserializer).map(Some)
}

impl FieldDef {
    /// A field without a default.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            default: None,
            extra: Map::new(),
        }
    }

    /// Set the schema default.
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Attach a piece of prompt metadata.
    pub fn with_extra(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(key.into(), value.into());
        self
    }
}
