//! Override sources
//!
//! `create_all` accepts any number of override sources, merged in the order
//! given (later sources win). A source is either an inline override tree or
//! a file. Files are read from disk on every call, never reused from an
//! earlier load, and hold one variant per application id:
//!
//! ```json
//! { "default": { "xcraft-core-bus": { "port": 35400 } },
//!   "my-app":  { "xcraft-core-bus": { "port": -0.0 } } }
//! ```
//!
//! `.toml` files are accepted as well and converted to JSON before use.

use std::fs;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use tracing::{debug, info};
use xcraft_overlay::ModuleOverrides;

use crate::constants::DEFAULT_VARIANT;
use crate::error::{EtcError, Result};

/// One override source handed to `create_all`.
#[derive(Debug, Clone)]
pub enum OverrideSource {
    /// Overrides keyed by module name, used as is.
    Inline(ModuleOverrides),
    /// A JSON or TOML file keyed by application id.
    File(PathBuf),
}

impl From<ModuleOverrides> for OverrideSource {
    fn from(overrides: ModuleOverrides) -> Self {
        OverrideSource::Inline(overrides)
    }
}

impl From<PathBuf> for OverrideSource {
    fn from(path: PathBuf) -> Self {
        OverrideSource::File(path)
    }
}

impl From<&Path> for OverrideSource {
    fn from(path: &Path) -> Self {
        OverrideSource::File(path.to_path_buf())
    }
}

/// Where a contributing source came from.
#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceOrigin {
    Inline,
    File,
}

/// Provenance of one override source.
#[derive(Debug, Clone, Serialize)]
pub struct SourceRecord {
    pub origin: SourceOrigin,

    /// File path (None for inline sources)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    /// SHA-256 digest of raw file bytes (None for inline sources)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub digest: Option<String>,

    /// Variant key selected from the file, if any applied
    #[serde(skip_serializing_if = "Option::is_none")]
    pub variant: Option<String>,
}

/// Merge all sources in order into one override set keyed by module name.
pub fn collect_overrides(
    sources: &[OverrideSource],
    app_id: Option<&str>,
) -> Result<(ModuleOverrides, Vec<SourceRecord>)> {
    let mut merged = ModuleOverrides::new();
    let mut records = Vec::with_capacity(sources.len());

    for source in sources {
        match source {
            OverrideSource::Inline(overrides) => {
                merged.merge(overrides.clone());
                records.push(SourceRecord {
                    origin: SourceOrigin::Inline,
                    path: None,
                    digest: None,
                    variant: None,
                });
            }
            OverrideSource::File(path) => {
                let (selected, record) = load_override_file(path, app_id)?;
                if let Some(overrides) = selected {
                    merged.merge(overrides);
                }
                records.push(record);
            }
        }
    }

    Ok((merged, records))
}

/// Read one override file and select its variant for `app_id`.
///
/// The `app_id` variant wins when present, else `default`; a file holding
/// neither contributes nothing.
pub fn load_override_file(
    path: &Path,
    app_id: Option<&str>,
) -> Result<(Option<ModuleOverrides>, SourceRecord)> {
    if !path.is_file() {
        return Err(EtcError::OverrideSource {
            path: path.to_path_buf(),
            reason: "file not found".to_string(),
        });
    }

    let bytes = fs::read(path).map_err(|e| EtcError::io(path, e))?;
    let digest = hex::encode(Sha256::digest(&bytes));
    let document = parse_document(path, &bytes)?;

    let Value::Object(mut variants) = document else {
        return Err(EtcError::OverrideSource {
            path: path.to_path_buf(),
            reason: "top level must be a table keyed by application id".to_string(),
        });
    };

    let variant = app_id
        .filter(|id| variants.contains_key(*id))
        .unwrap_or(DEFAULT_VARIANT)
        .to_string();

    let selected = match variants.remove(&variant) {
        Some(value) => {
            info!(path = %path.display(), variant = %variant, "applying override source");
            Some(ModuleOverrides::from_json(value)?)
        }
        None => {
            debug!(path = %path.display(), "override source has no applicable variant");
            None
        }
    };

    let record = SourceRecord {
        origin: SourceOrigin::File,
        path: Some(path.to_string_lossy().to_string()),
        digest: Some(digest),
        variant: selected.as_ref().map(|_| variant),
    };

    Ok((selected, record))
}

fn parse_document(path: &Path, bytes: &[u8]) -> Result<Value> {
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));

    if !is_toml {
        return serde_json::from_slice(bytes).map_err(|e| EtcError::json(path, e));
    }

    let contents = std::str::from_utf8(bytes).map_err(|e| EtcError::OverrideSource {
        path: path.to_path_buf(),
        reason: format!("invalid UTF-8: {}", e),
    })?;
    let value: toml::Value = toml::from_str(contents).map_err(|e| EtcError::Toml {
        path: path.to_path_buf(),
        source: e,
    })?;
    Ok(toml_to_json(value))
}

/// Convert TOML Value to JSON Value
fn toml_to_json(toml: toml::Value) -> Value {
    match toml {
        toml::Value::String(s) => Value::String(s),
        toml::Value::Integer(i) => Value::Number(i.into()),
        toml::Value::Float(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        toml::Value::Boolean(b) => Value::Bool(b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(arr) => Value::Array(arr.into_iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .into_iter()
                .map(|(k, v)| (k, toml_to_json(v)))
                .collect(),
        ),
    }
}
