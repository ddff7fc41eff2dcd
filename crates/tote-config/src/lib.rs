//! Configuration for the tote build pipeline.
//!
//! - [`Configuration`]: the effective, immutable build configuration
//! - [`Overlay`] and [`merge`]: mode-specific partial configurations
//! - [`ConfigDiscovery`]: loading `tote.toml` / `package.json` with `TOTE_` env overrides
//! - [`SchemaValidator`] / [`FsValidator`]: validation strategies

pub mod config;
pub mod discovery;
pub mod error;
pub mod overlay;
pub mod rule;
pub mod template;
pub mod validation;

pub use config::*;
pub use error::*;
pub use overlay::{merge, merge_all, Overlay, OutputOverlay, ProjectOverlay, ResolveOverlay, SettingsOverlay};
pub use rule::{MatchPattern, PluginRef, Rule, StageRef};

pub use discovery::{discover, ConfigDiscovery, ConfigFile, ENV_PREFIX, UPLOAD_MODE};
pub use validation::{validate_fs, validate_schema, ConfigValidator, FsValidator, SchemaValidator};
