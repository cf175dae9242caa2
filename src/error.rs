//! Error types for the configuration store.

use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;
use xcraft_overlay::OverlayError;

pub type Result<T> = std::result::Result<T, EtcError>;

/// Errors from store, registry, override and reconfiguration operations.
///
/// Absent configuration is never an error: lookups return `None` instead.
#[derive(Debug, Error)]
pub enum EtcError {
    #[error("I/O error on {}: {}", .path.display(), .source)]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("JSON error in {}: {}", .path.display(), .source)]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("TOML parse error in {}: {}", .path.display(), .source)]
    Toml {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid schema {}: {}", .path.display(), .reason)]
    Schema { path: PathBuf, reason: String },

    #[error("override source {}: {}", .path.display(), .reason)]
    OverrideSource { path: PathBuf, reason: String },

    #[error("invalid module filter: {0}")]
    Filter(#[from] regex_lite::Error),

    #[error(transparent)]
    Overlay(#[from] OverlayError),

    #[error("run file {}: {}", .path.display(), .source)]
    RunFile {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("prompt for module {module} failed: {source}")]
    Prompt {
        module: String,
        #[source]
        source: io::Error,
    },
}

impl EtcError {
    pub(crate) fn io(path: &Path, source: io::Error) -> Self {
        EtcError::Io {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn json(path: &Path, source: serde_json::Error) -> Self {
        EtcError::Json {
            path: path.to_path_buf(),
            source,
        }
    }

    pub(crate) fn run_file(path: &Path, source: io::Error) -> Self {
        EtcError::RunFile {
            path: path.to_path_buf(),
            source,
        }
    }
}
