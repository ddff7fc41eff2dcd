//! Error types for tote-bundler operations.

use std::fmt;
use std::path::PathBuf;

use tote_config::ConfigError;

use crate::pipeline::BuildState;

/// Result type alias for tote-bundler operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Which registry table a name is looked up in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollaboratorKind {
    Stage,
    Plugin,
}

impl fmt::Display for CollaboratorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CollaboratorKind::Stage => write!(f, "stage"),
            CollaboratorKind::Plugin => write!(f, "plugin"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration could not be merged or validated.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// A stage or plugin name has no registered implementation.
    #[error("unknown {kind} `{name}`")]
    UnknownCollaborator {
        kind: CollaboratorKind,
        name: String,
    },

    /// A referenced module could not be found or read.
    #[error("{}: {message}", .file.display())]
    Discovery { file: PathBuf, message: String },

    /// A transform stage failed for one file.
    #[error("stage `{stage}` failed for {}: {cause:#}", .file.display())]
    Transform {
        file: PathBuf,
        stage: String,
        cause: anyhow::Error,
    },

    /// A plugin hook failed.
    #[error("plugin `{plugin}` failed in {hook}: {cause:#}")]
    Plugin {
        plugin: String,
        hook: &'static str,
        cause: anyhow::Error,
    },

    /// Two sources resolved to the same output path.
    #[error("`{first}` and `{second}` both resolve to output `{resolved}`")]
    EmitCollision {
        first: String,
        second: String,
        resolved: String,
    },

    /// Writing an output file failed; nothing from this build was published.
    #[error("failed to write {}: {cause}", .path.display())]
    Emit {
        path: PathBuf,
        #[source]
        cause: std::io::Error,
    },

    /// Invalid output path (e.g., directory traversal attempt).
    #[error("invalid output path: {0}")]
    InvalidOutputPath(String),

    /// A transform chain stopped because another one failed first.
    #[error("build cancelled")]
    Cancelled,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Stable, machine-readable error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Config(_) => "ConfigError",
            Error::UnknownCollaborator { .. } => "UnknownCollaboratorError",
            Error::Discovery { .. } => "DiscoveryError",
            Error::Transform { .. } => "TransformError",
            Error::Plugin { .. } => "PluginError",
            Error::EmitCollision { .. } => "EmitCollisionError",
            Error::Emit { .. } => "EmitError",
            Error::InvalidOutputPath(_) => "InvalidOutputPathError",
            Error::Cancelled => "CancelledError",
            Error::Io(_) => "IoError",
        }
    }

    /// The file the error is about, if there is one.
    pub fn file(&self) -> Option<String> {
        match self {
            Error::Config(ConfigError::EntryNotFound { path, .. })
            | Error::Config(ConfigError::Parse { path, .. })
            | Error::Discovery { file: path, .. }
            | Error::Transform { file: path, .. }
            | Error::Emit { path, .. } => Some(path.display().to_string()),
            Error::EmitCollision { second, .. } => Some(second.clone()),
            _ => None,
        }
    }

    pub(crate) fn plugin(plugin: &str, hook: &'static str, cause: anyhow::Error) -> Self {
        Error::Plugin {
            plugin: plugin.to_string(),
            hook,
            cause,
        }
    }
}

impl miette::Diagnostic for Error {
    fn code(&self) -> Option<Box<dyn fmt::Display + '_>> {
        Some(Box::new(self.kind()))
    }

    fn severity(&self) -> Option<miette::Severity> {
        Some(miette::Severity::Error)
    }

    fn help(&self) -> Option<Box<dyn fmt::Display + '_>> {
        match self {
            Error::UnknownCollaborator { kind, name } => Some(Box::new(format!(
                "No {kind} named `{name}` is registered. Check the spelling in your configuration \
                 or register an implementation before building."
            ))),
            Error::EmitCollision { .. } => Some(Box::new(
                "Give one of the rules its own `output` template, or add [path] or [hash] to the template.",
            )),
            Error::InvalidOutputPath(_) => Some(Box::new(
                "Output templates must stay inside the output directory and must not contain '..' components.",
            )),
            Error::Emit { .. } => Some(Box::new(
                "Failed to write file. Check disk space and permissions.",
            )),
            Error::Config(ConfigError::UnknownOverlayKey { .. }) => Some(Box::new(
                "Profiles may only set keys that exist in the base configuration.",
            )),
            _ => None,
        }
    }
}

/// A failed build: the error plus the state the build was in when it failed.
#[derive(Debug, thiserror::Error)]
#[error("build failed while {state}: {error}")]
pub struct BuildFailure {
    #[source]
    pub error: Error,
    pub state: BuildState,
    pub history: Vec<BuildState>,
}

impl BuildFailure {
    pub fn kind(&self) -> &'static str {
        self.error.kind()
    }
}
