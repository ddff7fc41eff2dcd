//! `command` stage: pipe a file through an external program.
//!
//! ```toml
//! [[rules]]
//! test = '\.scss$'
//! use = [{ name = "command", options = { program = "sass", args = ["--stdin", "--load-path=src"] } }]
//! ```
//!
//! The file's bytes go to stdin, stdout becomes the stage output. `[file]` in
//! an argument expands to the source path relative to the project root.

use std::process::Stdio;

use anyhow::{Context, bail};
use async_trait::async_trait;
use serde::Deserialize;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::{Duration, timeout};

use super::parse_options;
use crate::paths::to_slash;
use crate::registry::{Transform, TransformRequest};

/// Default timeout for one invocation (30 seconds)
const DEFAULT_TIMEOUT_MS: u64 = 30_000;

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct CommandOptions {
    program: String,
    #[serde(default)]
    args: Vec<String>,
    #[serde(default = "default_timeout_ms")]
    timeout_ms: u64,
}

fn default_timeout_ms() -> u64 {
    DEFAULT_TIMEOUT_MS
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CommandStage;

#[async_trait]
impl Transform for CommandStage {
    async fn transform(&self, request: TransformRequest<'_>) -> anyhow::Result<Vec<u8>> {
        let options: CommandOptions = parse_options("command", request.options)?;
        let file = to_slash(request.path);

        let mut cmd = Command::new(&options.program);
        cmd.args(options.args.iter().map(|arg| arg.replace("[file]", &file)))
            .current_dir(request.root)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let mut child = cmd
            .spawn()
            .with_context(|| format!("failed to start `{}`", options.program))?;

        let mut stdin = child
            .stdin
            .take()
            .context("failed to capture stdin")?;

        // Written from its own task so a full stdout pipe cannot block the write
        let input = request.content;
        let writer = tokio::spawn(async move {
            let result = stdin.write_all(&input).await;
            drop(stdin);
            result
        });

        let output = timeout(Duration::from_millis(options.timeout_ms), child.wait_with_output())
            .await
            .map_err(|_| anyhow::anyhow!("`{}` timed out after {} ms", options.program, options.timeout_ms))?
            .with_context(|| format!("failed to run `{}`", options.program))?;

        match writer.await {
            Ok(Ok(())) => {}
            // The program may exit without reading all of its input
            Ok(Err(e)) if e.kind() == std::io::ErrorKind::BrokenPipe => {}
            Ok(Err(e)) => return Err(e).context("failed to write stdin"),
            Err(e) => bail!("stdin writer failed: {e}"),
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("`{}` exited with {}: {}", options.program, output.status, stderr.trim());
        }

        Ok(output.stdout)
    }
}
