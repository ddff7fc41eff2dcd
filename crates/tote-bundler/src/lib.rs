//! # tote-bundler
//!
//! Build orchestration for a single web application: classify files by rule,
//! run each through its chain of named transform stages, and emit the results
//! with a manifest.
//!
//! ```no_run
//! use tote_bundler::{BuildRequest, Pipeline, Registry};
//! use tote_config::ConfigDiscovery;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let file = ConfigDiscovery::new(".").load()?;
//! let report = Pipeline::new(Registry::with_builtins())
//!     .build(&file, &BuildRequest::new(".").mode("production"))
//!     .await?;
//!
//! for (source, entry) in report.manifest.iter() {
//!     println!("{source} -> {}", entry.output_path);
//! }
//! # Ok(()) }
//! ```
//!
//! Concrete transforms (Sass, Babel, minifiers...) are collaborators: register
//! a [`Transform`] under the name used in the configuration, or wire an
//! external tool through the built-in `command` stage.

pub mod builtins;
pub mod chain;
pub mod discover;
pub mod emit;
pub mod error;
pub mod hash;
pub mod paths;
pub mod pipeline;
pub mod registry;
pub mod rules;

pub use chain::{CancellationFlag, ChainExecutor, ChainJob, ResolvedStage, TransformedFile};
pub use discover::{DirectoryWalk, Discoverer, ModuleGraph, SourceFile, discoverer_for};
pub use emit::manifest::{FAILURE_MARKER, FailureMarker, MANIFEST_FILE, Manifest, ManifestEntry};
pub use emit::{EmitPlan, Emitter, PlannedOutput, output_path_for};
pub use error::{BuildFailure, CollaboratorKind, Error, Result};
pub use pipeline::{BuildReport, BuildRequest, BuildState, Pipeline, ResolvedBuild};
pub use registry::{Plugin, PluginContext, Registry, Transform, TransformRequest};
pub use rules::{RuleMatch, match_file, resolve};

pub use tote_config;
