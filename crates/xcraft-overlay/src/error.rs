//! Errors for override documents.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum OverlayError {
    #[error("override document must be an object, found {0}")]
    NotATable(&'static str),

    #[error("overrides for module {module} must be an object, found {kind}")]
    ModuleNotATable { module: String, kind: &'static str },
}
