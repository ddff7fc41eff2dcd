//! Command implementations.

pub mod build;
pub mod check;
pub mod watch;

use std::path::{Path, PathBuf};

use tote_bundler::{BuildReport, BuildRequest, Pipeline, ResolvedBuild};
use tote_config::{ConfigDiscovery, ConfigFile};

use crate::cli::{BuildArgs, ProjectArgs};
use crate::error::{CliError, Result};

pub use build::execute as build_execute;
pub use check::execute as check_execute;

/// One project as selected on the command line.
///
/// The configuration is reloaded for every build so watch mode picks up
/// edits to `tote.toml`.
#[derive(Debug, Clone)]
pub struct Session {
    root: PathBuf,
    config: Option<PathBuf>,
    request: BuildRequest,
    pipeline: Pipeline,
}

impl Session {
    pub fn new(project: &ProjectArgs) -> Result<Self> {
        if !project.cwd.is_dir() {
            return Err(CliError::ProjectNotFound(project.cwd.clone()));
        }
        Ok(Self {
            root: project.cwd.clone(),
            config: project.config.clone(),
            request: BuildRequest::new(&project.cwd).mode(&project.mode),
            pipeline: Pipeline::default(),
        })
    }

    /// Session for `tote build`, with its command-line overrides applied.
    pub fn for_build(args: &BuildArgs) -> Result<Self> {
        let mut session = Self::new(&args.project)?;
        let mut request = session.request.clone().upload(args.upload);
        if let Some(dir) = &args.out_dir {
            request = request.out_dir(dir);
        }
        if let Some(jobs) = args.jobs {
            request = request.jobs(jobs);
        }
        session.request = request;
        Ok(session)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn mode(&self) -> &str {
        self.request.mode_name()
    }

    pub fn load(&self) -> Result<ConfigFile> {
        let discovery = ConfigDiscovery::new(&self.root);
        let file = match &self.config {
            Some(path) => discovery.load_from(path)?,
            None => discovery.load()?,
        };
        Ok(file)
    }

    pub fn resolve(&self) -> Result<ResolvedBuild> {
        let file = self.load()?;
        Ok(self.pipeline.resolve(&file, &self.request)?)
    }

    pub async fn build(&self) -> Result<BuildReport> {
        let file = self.load()?;
        Ok(self.pipeline.build(&file, &self.request).await?)
    }
}
