//! Shared test utilities for tote-bundler tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use tempfile::TempDir;
use tote_bundler::{BuildFailure, BuildReport, BuildRequest, Pipeline, Registry, Transform, TransformRequest};
use tote_config::ConfigFile;

/// A throwaway project directory.
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("tempdir"),
        }
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    pub fn path(&self, relative: &str) -> PathBuf {
        self.dir.path().join(relative)
    }

    pub fn write(&self, relative: &str, content: &str) -> &Self {
        let path = self.path(relative);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dir");
        }
        fs::write(path, content).expect("write fixture");
        self
    }

    pub fn read(&self, relative: &str) -> String {
        fs::read_to_string(self.path(relative)).expect("read output")
    }

    pub fn request(&self, mode: &str) -> BuildRequest {
        BuildRequest::new(self.root()).mode(mode)
    }
}

pub fn config(toml: &str) -> ConfigFile {
    ConfigFile::from_toml_str(toml).expect("valid test config")
}

pub async fn build(
    registry: Registry,
    file: &ConfigFile,
    request: &BuildRequest,
) -> Result<BuildReport, BuildFailure> {
    Pipeline::new(registry).build(file, request).await
}

/// Appends `|<tag>` to its input, making stage order visible in the output.
pub struct Tag(pub &'static str);

#[async_trait]
impl Transform for Tag {
    async fn transform(&self, request: TransformRequest<'_>) -> anyhow::Result<Vec<u8>> {
        let mut out = request.content;
        out.extend_from_slice(format!("|{}", self.0).as_bytes());
        Ok(out)
    }
}

/// Always fails.
pub struct Broken;

#[async_trait]
impl Transform for Broken {
    async fn transform(&self, request: TransformRequest<'_>) -> anyhow::Result<Vec<u8>> {
        anyhow::bail!("cannot compile {}", request.path.display())
    }
}

/// Counts invocations, then passes content through.
#[derive(Clone, Default)]
pub struct Counter(pub Arc<AtomicUsize>);

impl Counter {
    pub fn count(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Transform for Counter {
    async fn transform(&self, request: TransformRequest<'_>) -> anyhow::Result<Vec<u8>> {
        self.0.fetch_add(1, Ordering::SeqCst);
        Ok(request.content)
    }
}
