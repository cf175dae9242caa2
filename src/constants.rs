//! On-disk layout and naming constants

use std::env;
use std::path::{Path, PathBuf};

/// Environment variable selecting the configuration root when the caller
/// does not pass one explicitly.
pub const ROOT_ENV: &str = "XCRAFT_ROOT";

/// Per-module config directories live under `<root>/etc`.
pub const ETC_DIR: &str = "etc";

/// Run files live under `<root>/var/run`.
pub const RUN_DIR: &str = "var/run";

/// Run files are named `<prefix>.<pid>`.
pub const RUN_FILE_PREFIX: &str = "xcraftd";

/// Module loaded at construction to locate the daemon run directory.
pub const BOOTSTRAP_MODULE: &str = "xcraft";

/// Key of the bootstrap config naming the root whose run directory is swept.
pub const BOOTSTRAP_ROOT_KEY: &str = "xcraftRoot";

/// Persisted config file name inside each module directory.
pub const CONFIG_FILE: &str = "config.json";

/// Schema file name inside each module source directory.
pub const SCHEMA_FILE: &str = "schema.json";

/// Variant of an override file used when no app id variant applies.
pub const DEFAULT_VARIANT: &str = "default";

/// Instance-local keys of a run file snapshot.
pub const SNAPSHOT_PID_KEY: &str = "pid";
pub const SNAPSHOT_FD_KEY: &str = "fd";

/// Pick the configuration root: explicit path first, then `XCRAFT_ROOT`.
pub fn resolve_root(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(root) = explicit {
        return Some(root.to_path_buf());
    }
    env::var_os(ROOT_ENV)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}
