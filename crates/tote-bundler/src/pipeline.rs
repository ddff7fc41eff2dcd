//! Build orchestration.
//!
//! A build moves through `Idle -> ConfigResolved -> Discovering ->
//! Transforming -> Emitting -> Done`; any error moves it to `Failed`. The
//! orchestrator knows nothing about modes: mode differences live entirely in
//! the overlays merged while resolving the configuration.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use tote_config::{ConfigFile, Configuration, ConfigValidator, FsValidator, PluginRef};

use crate::chain::{CancellationFlag, ChainExecutor, ChainJob, ResolvedStage};
use crate::discover::{Discoverer, discoverer_for};
use crate::emit::Emitter;
use crate::emit::manifest::{FailureMarker, Manifest};
use crate::error::{BuildFailure, Error, Result};
use crate::paths::absolutize;
use crate::registry::{Plugin, PluginContext, Registry};
use crate::rules::match_file;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BuildState {
    Idle,
    ConfigResolved,
    Discovering,
    Transforming,
    Emitting,
    Done,
    Failed,
}

impl fmt::Display for BuildState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            BuildState::Idle => "idle",
            BuildState::ConfigResolved => "config-resolved",
            BuildState::Discovering => "discovering",
            BuildState::Transforming => "transforming",
            BuildState::Emitting => "emitting",
            BuildState::Done => "done",
            BuildState::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// What to build: project root, mode and command-line overrides.
#[derive(Debug, Clone)]
pub struct BuildRequest {
    root: PathBuf,
    mode: String,
    upload: bool,
    out_dir: Option<PathBuf>,
    jobs: Option<usize>,
}

impl BuildRequest {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            mode: "production".to_string(),
            upload: false,
            out_dir: None,
            jobs: None,
        }
    }

    pub fn mode(mut self, mode: impl Into<String>) -> Self {
        self.mode = mode.into();
        self
    }

    /// Append the upload plugin (production mode only).
    pub fn upload(mut self, upload: bool) -> Self {
        self.upload = upload;
        self
    }

    /// Override `output.dir`.
    pub fn out_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.out_dir = Some(dir.into());
        self
    }

    /// Override `settings.jobs`.
    pub fn jobs(mut self, jobs: usize) -> Self {
        self.jobs = Some(jobs);
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode_name(&self) -> &str {
        &self.mode
    }
}

/// A configuration ready to build: merged, expanded, validated and checked
/// against the registry.
#[derive(Debug, Clone)]
pub struct ResolvedBuild {
    pub config: Configuration,
    pub root: PathBuf,
    pub out_dir: PathBuf,
    pub mode: String,
    pub jobs: usize,
}

#[derive(Debug, Clone)]
pub struct BuildReport {
    pub manifest: Manifest,
    pub manifest_path: PathBuf,
    pub out_dir: PathBuf,
    pub mode: String,
    pub history: Vec<BuildState>,
    pub duration: Duration,
}

/// Runs builds against a registry of stages and plugins.
#[derive(Clone)]
pub struct Pipeline {
    registry: Registry,
    discoverer: Option<Arc<dyn Discoverer>>,
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("registry", &self.registry)
            .field("custom_discoverer", &self.discoverer.is_some())
            .finish()
    }
}

impl Default for Pipeline {
    fn default() -> Self {
        Self::new(Registry::with_builtins())
    }
}

impl Pipeline {
    pub fn new(registry: Registry) -> Self {
        Self {
            registry,
            discoverer: None,
        }
    }

    /// Use `discoverer` instead of the one selected by `settings.discovery`.
    pub fn with_discoverer(mut self, discoverer: impl Discoverer + 'static) -> Self {
        self.discoverer = Some(Arc::new(discoverer));
        self
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// `Idle -> ConfigResolved`: merge overlays, apply overrides, validate.
    pub fn resolve(&self, file: &ConfigFile, request: &BuildRequest) -> Result<ResolvedBuild> {
        let root = absolutize(&request.root)?;

        let mut config = file.materialize(&request.mode, request.upload)?;
        if let Some(dir) = &request.out_dir {
            config.output.dir = dir.clone();
        }
        if let Some(jobs) = request.jobs {
            config.settings.jobs = Some(jobs);
        }
        let config = config.expand_project_tokens();

        FsValidator::new(&root).validate(&config)?;
        self.registry.check(&config)?;

        let out_dir = absolutize(&root.join(&config.output.dir))?;
        if root.starts_with(&out_dir) {
            return Err(Error::InvalidOutputPath(format!(
                "output directory {} contains the project root",
                out_dir.display()
            )));
        }

        let jobs = config.settings.jobs.unwrap_or_else(num_cpus::get).max(1);

        Ok(ResolvedBuild {
            config,
            root,
            out_dir,
            mode: request.mode.clone(),
            jobs,
        })
    }

    /// Run one build to `Done` or `Failed`.
    ///
    /// On failure any stale manifest is removed and a `BUILD_FAILED` marker is
    /// written to the output directory (when the configuration got far enough
    /// to name one).
    pub async fn build(&self, file: &ConfigFile, request: &BuildRequest) -> std::result::Result<BuildReport, BuildFailure> {
        let started = Instant::now();
        let mut progress = Progress::new();

        let resolved = match self.resolve(file, request) {
            Ok(resolved) => resolved,
            Err(error) => return Err(progress.fail(error)),
        };
        progress.advance(BuildState::ConfigResolved);
        tracing::info!(
            mode = %resolved.mode,
            out_dir = %resolved.out_dir.display(),
            jobs = resolved.jobs,
            "configuration resolved"
        );

        match self.execute(&resolved, &mut progress).await {
            Ok((manifest, manifest_path)) => {
                progress.advance(BuildState::Done);
                let duration = started.elapsed();
                tracing::info!(files = manifest.len(), ?duration, "build finished");
                Ok(BuildReport {
                    manifest,
                    manifest_path,
                    out_dir: resolved.out_dir,
                    mode: resolved.mode,
                    history: progress.history,
                    duration,
                })
            }
            Err(error) => {
                record_failure(&resolved.out_dir, &error);
                Err(progress.fail(error))
            }
        }
    }

    async fn execute(&self, resolved: &ResolvedBuild, progress: &mut Progress) -> Result<(Manifest, PathBuf)> {
        let config = &resolved.config;
        let plugins = config
            .plugins
            .iter()
            .map(|plugin_ref| Ok((plugin_ref, self.registry.plugin(&plugin_ref.name)?)))
            .collect::<Result<Vec<_>>>()?;
        let hooks = Hooks {
            resolved,
            plugins: &plugins,
        };

        progress.advance(BuildState::Discovering);
        for (plugin_ref, plugin) in hooks.plugins {
            plugin
                .before_discover(&hooks.context(plugin_ref))
                .await
                .map_err(|cause| Error::plugin(&plugin_ref.name, "before_discover", cause))?;
        }
        let discoverer = self
            .discoverer
            .clone()
            .unwrap_or_else(|| discoverer_for(config.settings.discovery));
        let files = discoverer.discover(&resolved.root, config).await?;
        tracing::debug!(files = files.len(), "sources discovered");

        progress.advance(BuildState::Transforming);
        let jobs = files
            .into_iter()
            .map(|source| {
                let matched = match_file(&source.path, &config.rules);
                let stages = matched
                    .stages
                    .into_iter()
                    .map(|stage| {
                        Ok(ResolvedStage {
                            transform: self.registry.transform(&stage.name)?,
                            name: stage.name,
                            options: stage.options,
                        })
                    })
                    .collect::<Result<Vec<_>>>()?;
                Ok(ChainJob {
                    source,
                    stages,
                    output: matched.output,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let executor = ChainExecutor::new(&resolved.root, resolved.jobs);
        let mut transformed = executor.run_all(jobs, &CancellationFlag::new()).await?;
        for (plugin_ref, plugin) in hooks.plugins {
            plugin
                .after_transform(&hooks.context(plugin_ref), &mut transformed)
                .await
                .map_err(|cause| Error::plugin(&plugin_ref.name, "after_transform", cause))?;
        }

        progress.advance(BuildState::Emitting);
        let mut plan = Emitter::plan(transformed, config)?;
        for (plugin_ref, plugin) in hooks.plugins {
            plugin
                .before_emit(&hooks.context(plugin_ref), &mut plan)
                .await
                .map_err(|cause| Error::plugin(&plugin_ref.name, "before_emit", cause))?;
        }
        plan.check_collisions()?;

        std::fs::create_dir_all(&resolved.out_dir).map_err(|cause| Error::Emit {
            path: resolved.out_dir.clone(),
            cause,
        })?;
        let manifest = plan.write(&resolved.out_dir)?;
        for (plugin_ref, plugin) in hooks.plugins {
            plugin
                .after_emit(&hooks.context(plugin_ref), &manifest)
                .await
                .map_err(|cause| Error::plugin(&plugin_ref.name, "after_emit", cause))?;
        }

        let manifest_path = manifest.publish(&resolved.out_dir)?;
        Ok((manifest, manifest_path))
    }
}

struct Hooks<'a> {
    resolved: &'a ResolvedBuild,
    plugins: &'a [(&'a PluginRef, Arc<dyn Plugin>)],
}

impl Hooks<'_> {
    fn context<'s>(&'s self, plugin_ref: &'s PluginRef) -> PluginContext<'s> {
        PluginContext {
            config: &self.resolved.config,
            options: &plugin_ref.options,
            root: &self.resolved.root,
            out_dir: &self.resolved.out_dir,
            mode: &self.resolved.mode,
            name: &plugin_ref.name,
        }
    }
}

/// State history of one build.
struct Progress {
    history: Vec<BuildState>,
}

impl Progress {
    fn new() -> Self {
        Self {
            history: vec![BuildState::Idle],
        }
    }

    fn current(&self) -> BuildState {
        self.history.last().copied().unwrap_or(BuildState::Idle)
    }

    fn advance(&mut self, state: BuildState) {
        tracing::debug!(from = %self.current(), to = %state, "build state");
        self.history.push(state);
    }

    fn fail(mut self, error: Error) -> BuildFailure {
        let state = self.current();
        tracing::error!(%state, kind = error.kind(), "build failed: {error}");
        self.history.push(BuildState::Failed);
        BuildFailure {
            error,
            state,
            history: self.history,
        }
    }
}

/// Remove a stale manifest and leave a `BUILD_FAILED` marker.
fn record_failure(out_dir: &Path, error: &Error) {
    if let Err(e) = Manifest::remove_stale(out_dir) {
        tracing::warn!(error = %e, "failed to remove stale manifest");
    }
    match FailureMarker::from_error(error).write(out_dir) {
        Ok(path) => tracing::debug!(path = %path.display(), "failure marker written"),
        Err(e) => tracing::warn!(error = %e, "failed to write failure marker"),
    }
}
