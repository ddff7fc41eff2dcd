//! `upload` plugin: mirror the emitted files into a deployment directory.
//!
//! Enabled by `tote build --upload` in production mode, with options taken
//! from the `[upload]` table:
//!
//! ```toml
//! [upload]
//! target = "/srv/www"
//! server_dir = "shop"
//! ```

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::parse_options;
use crate::emit::manifest::Manifest;
use crate::registry::{Plugin, PluginContext};

#[derive(Debug, Deserialize)]
struct UploadOptions {
    target: PathBuf,
    #[serde(default)]
    server_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UploadPlugin;

#[async_trait]
impl Plugin for UploadPlugin {
    async fn after_emit(&self, ctx: &PluginContext<'_>, manifest: &Manifest) -> anyhow::Result<()> {
        let options: UploadOptions = parse_options(ctx.name, ctx.options)?;
        let destination = match &options.server_dir {
            Some(dir) => ctx.root.join(&options.target).join(dir),
            None => ctx.root.join(&options.target),
        };

        for (_, entry) in manifest.iter() {
            let from = ctx.out_dir.join(&entry.output_path);
            let to = destination.join(&entry.output_path);
            if let Some(parent) = to.parent() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .with_context(|| format!("failed to create {}", parent.display()))?;
            }
            tokio::fs::copy(&from, &to)
                .await
                .with_context(|| format!("failed to upload {} to {}", from.display(), to.display()))?;
        }

        tracing::info!(
            files = manifest.len(),
            destination = %destination.display(),
            "uploaded build output"
        );
        Ok(())
    }
}
