//! `copy` plugin: emit static files that no source references.
//!
//! `patterns = [{ from = "static", to = "vendor" }]` copies a file or a whole
//! directory (hidden entries skipped) into the output.

use std::path::{Path, PathBuf};

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::Deserialize;
use walkdir::WalkDir;

use super::parse_options;
use crate::emit::EmitPlan;
use crate::paths::to_slash;
use crate::registry::{Plugin, PluginContext};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CopyOptions {
    patterns: Vec<CopyPattern>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CopyPattern {
    /// File or directory relative to the project root
    from: PathBuf,
    /// Destination relative to the output directory; a trailing `/` or an
    /// empty value keeps the file name
    #[serde(default)]
    to: String,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CopyPlugin;

#[async_trait]
impl Plugin for CopyPlugin {
    async fn before_emit(&self, ctx: &PluginContext<'_>, plan: &mut EmitPlan) -> anyhow::Result<()> {
        let options: CopyOptions = parse_options(ctx.name, ctx.options)?;

        for pattern in &options.patterns {
            let from = ctx.root.join(&pattern.from);
            for (file, output) in expand(&from, &pattern.to)? {
                let content = tokio::fs::read(&file)
                    .await
                    .with_context(|| format!("failed to read {}", file.display()))?;
                plan.add_artifact(ctx.name, output, content)?;
            }
        }
        Ok(())
    }
}

/// Files under `from` paired with their output paths.
fn expand(from: &Path, to: &str) -> anyhow::Result<Vec<(PathBuf, String)>> {
    if from.is_file() {
        let name = from
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();
        let output = if to.is_empty() || to.ends_with('/') {
            format!("{to}{name}")
        } else {
            to.to_string()
        };
        return Ok(vec![(from.to_path_buf(), output)]);
    }

    if !from.is_dir() {
        bail!("copy source {} does not exist", from.display());
    }

    let prefix = to.trim_end_matches('/');
    let mut files = Vec::new();
    let walker = WalkDir::new(from)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|entry| entry.depth() == 0 || !entry.file_name().to_string_lossy().starts_with('.'));
    for entry in walker {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = to_slash(entry.path().strip_prefix(from)?);
        let output = if prefix.is_empty() {
            relative
        } else {
            format!("{prefix}/{relative}")
        };
        files.push((entry.path().to_path_buf(), output));
    }
    Ok(files)
}
