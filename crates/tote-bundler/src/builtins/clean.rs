//! `clean` plugin: empty the output directory before writing.

use std::path::Path;

use anyhow::{Context, bail};
use async_trait::async_trait;

use crate::emit::EmitPlan;
use crate::registry::{Plugin, PluginContext};

#[derive(Debug, Clone, Copy, Default)]
pub struct CleanPlugin;

#[async_trait]
impl Plugin for CleanPlugin {
    async fn before_emit(&self, ctx: &PluginContext<'_>, _plan: &mut EmitPlan) -> anyhow::Result<()> {
        clean_output_dir(ctx.out_dir, ctx.root).await
    }
}

/// Remove everything inside `out_dir`, keeping the directory itself.
async fn clean_output_dir(out_dir: &Path, root: &Path) -> anyhow::Result<()> {
    if root.starts_with(out_dir) {
        bail!(
            "refusing to clean {}: it contains the project root",
            out_dir.display()
        );
    }

    let mut entries = match tokio::fs::read_dir(out_dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
        Err(e) => return Err(e).with_context(|| format!("failed to read {}", out_dir.display())),
    };

    let mut removed = 0usize;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let result = if entry.file_type().await?.is_dir() {
            tokio::fs::remove_dir_all(&path).await
        } else {
            tokio::fs::remove_file(&path).await
        };
        result.with_context(|| format!("failed to remove {}", path.display()))?;
        removed += 1;
    }

    tracing::debug!(out_dir = %out_dir.display(), removed, "output directory cleaned");
    Ok(())
}
