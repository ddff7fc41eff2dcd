//! Error types for configuration loading, merging and validation.

use std::path::PathBuf;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, ConfigError>;

#[derive(Debug, Error)]
pub enum ConfigError {
    // Config discovery/loading errors
    #[error("no tote.toml or package.json `tote` field found in {}", .root.display())]
    NotFound { root: PathBuf },

    #[error("failed to parse {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid config value for `{field}`{}", .hint.as_ref().map(|h| format!(": {h}")).unwrap_or_default())]
    InvalidValue { field: String, hint: Option<String> },

    // Overlay merge errors
    #[error("unsupported overlay key `{key}`")]
    UnknownOverlayKey { key: String },

    #[error("--upload requires an [upload] table in the configuration")]
    MissingUploadTarget,

    // Schema validation errors (no filesystem checks)
    #[error("no entry points specified")]
    NoEntries,

    #[error("invalid path template `{template}`: {reason}")]
    InvalidTemplate { template: String, reason: String },

    #[error("schema validation failed: {message}")]
    SchemaValidation {
        message: String,
        hint: Option<String>,
    },

    // Filesystem validation errors (for CLI use)
    #[error("entry `{name}` not found: {}", .path.display())]
    EntryNotFound { name: String, path: PathBuf },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
