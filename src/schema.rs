//! Module schema discovery and loading
//!
//! A module is a directory under a caller-supplied root whose name matches a
//! filter and which holds a `schema.json` array of field definitions.
//! Directories without a loadable schema are simply not modules.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use regex_lite::Regex;
use tracing::debug;
use walkdir::WalkDir;
use xcraft_overlay::FieldDef;

use crate::constants::SCHEMA_FILE;
use crate::error::{EtcError, Result};

/// Name filter applied to candidate module directories.
///
/// Matching is unanchored: `^` and `$` must be spelled out when needed.
#[derive(Debug, Clone)]
pub struct ModuleFilter {
    regex: Option<Regex>,
}

impl ModuleFilter {
    pub fn new(pattern: &str) -> Result<Self> {
        Ok(Self {
            regex: Some(Regex::new(pattern)?),
        })
    }

    /// Filter accepting every name.
    pub fn any() -> Self {
        Self { regex: None }
    }

    pub fn is_match(&self, name: &str) -> bool {
        self.regex.as_ref().map_or(true, |regex| regex.is_match(name))
    }
}

/// A module discovered under a modules root, with its loaded schema.
#[derive(Debug, Clone, PartialEq)]
pub struct ModuleSchema {
    pub name: String,
    pub fields: Vec<FieldDef>,
}

/// Path of a module's schema file.
pub fn schema_path(modules_root: &Path, module: &str) -> PathBuf {
    modules_root.join(module).join(SCHEMA_FILE)
}

/// List candidate module directories under `modules_root`, sorted by name.
///
/// An unreadable root yields no candidates.
pub fn discover_modules(modules_root: &Path, filter: &ModuleFilter) -> Vec<String> {
    WalkDir::new(modules_root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .filter_map(|entry| match entry {
            Ok(entry) => Some(entry),
            Err(e) => {
                debug!(root = %modules_root.display(), error = %e, "skipping unreadable entry");
                None
            }
        })
        .filter(|entry| entry.file_type().is_dir())
        .filter_map(|entry| entry.file_name().to_str().map(str::to_string))
        .filter(|name| filter.is_match(name))
        .collect()
}

/// Load and check one schema file.
///
/// The schema must be a JSON array of field definitions with unique names.
pub fn load_schema(path: &Path) -> Result<Vec<FieldDef>> {
    let bytes = fs::read(path).map_err(|e| EtcError::io(path, e))?;
    let fields: Vec<FieldDef> =
        serde_json::from_slice(&bytes).map_err(|e| EtcError::json(path, e))?;

    let mut seen = HashSet::new();
    for field in &fields {
        if field.name.is_empty() {
            return Err(EtcError::Schema {
                path: path.to_path_buf(),
                reason: "field with empty name".to_string(),
            });
        }
        if !seen.insert(field.name.as_str()) {
            return Err(EtcError::Schema {
                path: path.to_path_buf(),
                reason: format!("duplicate field '{}'", field.name),
            });
        }
    }

    Ok(fields)
}

/// Discover modules and load their schemas, skipping anything that fails.
pub fn load_modules(modules_root: &Path, filter: &ModuleFilter) -> Vec<ModuleSchema> {
    discover_modules(modules_root, filter)
        .into_iter()
        .filter_map(|name| match load_schema(&schema_path(modules_root, &name)) {
            Ok(fields) => Some(ModuleSchema { name, fields }),
            Err(e) => {
                debug!(module = %name, error = %e, "not a module, skipping");
                None
            }
        })
        .collect()
}
