//! Error handling for the tote CLI.
//!
//! Commands return [`CliError`]; `main` turns it into a `miette` report so
//! the user sees the error kind, the offending file and the cause.

use std::path::PathBuf;

use miette::Report;
use thiserror::Error;
use tote_bundler::BuildFailure;
use tote_config::ConfigError;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    /// The configuration could not be found or loaded.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The configuration loaded but did not resolve for this mode.
    #[error(transparent)]
    Resolve(#[from] tote_bundler::Error),

    /// A build ran and failed.
    #[error(transparent)]
    Build(#[from] BuildFailure),

    /// The project root does not exist.
    #[error("project directory not found: {}", .0.display())]
    ProjectNotFound(PathBuf),

    #[error("file watcher error: {0}")]
    Watch(#[from] notify::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl CliError {
    /// Stable kind string, shared with the bundler's error kinds where one applies.
    pub fn kind(&self) -> &'static str {
        match self {
            CliError::Config(_) => "ConfigError",
            CliError::Resolve(error) => error.kind(),
            CliError::Build(failure) => failure.kind(),
            CliError::ProjectNotFound(_) => "ProjectNotFoundError",
            CliError::Watch(_) => "WatchError",
            CliError::Io(_) => "IoError",
        }
    }
}

/// Convert a [`CliError`] into a report for the terminal.
pub fn cli_error_to_miette(err: CliError) -> Report {
    match err {
        CliError::Build(failure) => {
            let kind = failure.kind();
            let context = match failure.error.file() {
                Some(file) => format!("{kind} in state `{}` ({file})", failure.state),
                None => format!("{kind} in state `{}`", failure.state),
            };
            Report::new(failure.error).wrap_err(context)
        }
        CliError::Resolve(error) => {
            let kind = error.kind();
            Report::new(error).wrap_err(format!("{kind}: configuration did not resolve"))
        }
        CliError::Config(error) => {
            let help = match &error {
                ConfigError::NotFound { .. } => {
                    "Create a tote.toml in the project root, add a `tote` field to package.json or pass --config <file>"
                }
                _ => "Run `tote check` to validate the configuration",
            };
            miette::miette!(code = "ConfigError", help = help, "{error}")
        }
        other => {
            let kind = other.kind();
            miette::miette!(code = kind, "{other}")
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tote_bundler::BuildState;

    #[test]
    fn build_failure_report_names_kind_state_and_file() {
        let failure = BuildFailure {
            error: tote_bundler::Error::Discovery {
                file: PathBuf::from("src/app.js"),
                message: "cannot resolve `./missing`".to_string(),
            },
            state: BuildState::Discovering,
            history: vec![BuildState::Idle, BuildState::ConfigResolved, BuildState::Discovering],
        };
        let report = cli_error_to_miette(CliError::Build(failure));
        let rendered = format!("{report}");
        assert!(rendered.contains("DiscoveryError"));
        assert!(rendered.contains("discovering"));
        assert!(rendered.contains("src/app.js"));
    }

    #[test]
    fn kinds_follow_the_bundler() {
        let error = CliError::Resolve(tote_bundler::Error::InvalidOutputPath("x".to_string()));
        assert_eq!(error.kind(), "InvalidOutputPathError");
        assert_eq!(CliError::Config(ConfigError::NoEntries).kind(), "ConfigError");
    }
}
