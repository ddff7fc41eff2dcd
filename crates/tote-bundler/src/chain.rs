//! Transform chain execution.
//!
//! Stages of one file run strictly in order, each consuming the previous
//! stage's output. Independent files run concurrently, bounded by a semaphore.
//! The first failing chain cancels the rest: the shared [`CancellationFlag`]
//! is checked before every stage, so in-flight chains stop at their next stage
//! boundary and their output is dropped.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use serde_json::Value;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::discover::SourceFile;
use crate::error::{Error, Result};
use crate::registry::{Transform, TransformRequest};

/// Cooperative cancellation shared by every chain of one build.
#[derive(Debug, Clone, Default)]
pub struct CancellationFlag(Arc<AtomicBool>);

impl CancellationFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// A stage with its implementation already looked up.
#[derive(Clone)]
pub struct ResolvedStage {
    pub name: String,
    pub options: Value,
    pub transform: Arc<dyn Transform>,
}

impl std::fmt::Debug for ResolvedStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ResolvedStage")
            .field("name", &self.name)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

/// One file's work: where to read it, which stages to run, where it goes.
#[derive(Debug, Clone)]
pub struct ChainJob {
    pub source: SourceFile,
    pub stages: Vec<ResolvedStage>,
    /// Output template from the matching rules, if any
    pub output: Option<String>,
}

/// Final bytes of one source file after its chain ran.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformedFile {
    pub source: SourceFile,
    pub content: Vec<u8>,
    pub output: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChainExecutor {
    root: PathBuf,
    jobs: usize,
}

impl ChainExecutor {
    /// `jobs` bounds the number of chains running at once (at least 1).
    pub fn new(root: impl Into<PathBuf>, jobs: usize) -> Self {
        Self {
            root: root.into(),
            jobs: jobs.max(1),
        }
    }

    pub fn jobs(&self) -> usize {
        self.jobs
    }

    /// Run `content` of `file` through `stages` in order.
    pub async fn run(
        &self,
        file: &Path,
        content: Vec<u8>,
        stages: &[ResolvedStage],
        cancel: &CancellationFlag,
    ) -> Result<Vec<u8>> {
        run_chain(&self.root, file, content, stages, cancel).await
    }

    /// Read and transform every job's file; results keep the order of `jobs`.
    ///
    /// Returns the first real failure. Chains that observed cancellation are
    /// not reported.
    pub async fn run_all(&self, jobs: Vec<ChainJob>, cancel: &CancellationFlag) -> Result<Vec<TransformedFile>> {
        let semaphore = Arc::new(Semaphore::new(self.jobs));
        let root: Arc<Path> = Arc::from(self.root.as_path());
        let mut results: Vec<Option<TransformedFile>> = vec![None; jobs.len()];
        let mut set = JoinSet::new();

        for (index, job) in jobs.into_iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let root = Arc::clone(&root);
            let cancel = cancel.clone();
            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await.map_err(|_| Error::Cancelled)?;
                if cancel.is_cancelled() {
                    return Err(Error::Cancelled);
                }

                let path = root.join(&job.source.path);
                let content = tokio::fs::read(&path).await.map_err(|e| Error::Discovery {
                    file: job.source.path.clone(),
                    message: format!("cannot read source: {e}"),
                })?;

                let content = run_chain(&root, &job.source.path, content, &job.stages, &cancel).await?;
                Ok((
                    index,
                    TransformedFile {
                        source: job.source,
                        content,
                        output: job.output,
                    },
                ))
            });
        }

        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(Ok((index, file))) => results[index] = Some(file),
                Ok(Err(Error::Cancelled)) => continue,
                Ok(Err(error)) => {
                    cancel.cancel();
                    set.detach_all();
                    return Err(error);
                }
                Err(join_error) => {
                    cancel.cancel();
                    set.detach_all();
                    return Err(Error::Io(std::io::Error::other(format!(
                        "transform task failed: {join_error}"
                    ))));
                }
            }
        }

        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }

        Ok(results.into_iter().flatten().collect())
    }
}

async fn run_chain(
    root: &Path,
    file: &Path,
    mut content: Vec<u8>,
    stages: &[ResolvedStage],
    cancel: &CancellationFlag,
) -> Result<Vec<u8>> {
    for stage in stages {
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        tracing::trace!(file = %file.display(), stage = %stage.name, "running stage");

        content = stage
            .transform
            .transform(TransformRequest {
                path: file,
                root,
                content,
                options: &stage.options,
            })
            .await
            .map_err(|cause| Error::Transform {
                file: file.to_path_buf(),
                stage: stage.name.clone(),
                cause,
            })?;
    }

    if cancel.is_cancelled() {
        return Err(Error::Cancelled);
    }
    Ok(content)
}
