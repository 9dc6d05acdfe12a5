//! Errors raised by the sheet application.

use thiserror::Error;

/// Errors from configuration and character persistence.
#[derive(Debug, Error)]
pub enum SheetError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Invalid configuration: {key} = {value:?}")]
    InvalidConfig { key: String, value: String },

    #[error("Version mismatch: expected {expected}, found {found}")]
    VersionMismatch { expected: u32, found: u32 },

    #[error("Character not found: {0}")]
    CharacterNotFound(String),
}

impl From<SheetError> for vellum::Error {
    fn from(err: SheetError) -> Self {
        match err {
            SheetError::Io(e) => vellum::Error::Io(e),
            SheetError::Json(e) => vellum::Error::Serialization(e),
            other => vellum::Error::component("character store", other.to_string()),
        }
    }
}
