//! # tote-cli
//!
//! The `tote` command: argument parsing, logging setup, terminal output,
//! error reporting and watch mode on top of `tote-bundler`.
//!
//! - [`cli`] - clap definitions
//! - [`commands`] - `build` (with `--watch`) and `check`
//! - [`error`] - [`CliError`] and its miette rendering
//! - [`logger`] - tracing subscriber setup
//! - [`ui`] - status lines and the build summary

pub mod cli;
pub mod commands;
pub mod error;
pub mod logger;
pub mod ui;

pub use error::{CliError, Result};
