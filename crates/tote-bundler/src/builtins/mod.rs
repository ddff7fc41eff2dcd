//! Generic collaborators registered by [`Registry::with_builtins`].
//!
//! Stages: `command`, `identity`.
//! Plugins: `clean`, `banner`, `html`, `include-assets`, `copy`, `upload`.

mod banner;
mod clean;
mod command;
mod copy;
mod html;
mod include_assets;
mod upload;

pub use banner::BannerPlugin;
pub use clean::CleanPlugin;
pub use command::CommandStage;
pub use copy::CopyPlugin;
pub use html::HtmlPlugin;
pub use include_assets::IncludeAssetsPlugin;
pub use upload::UploadPlugin;

use anyhow::Context;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::registry::{Registry, Transform, TransformRequest};

pub fn register_builtins(registry: &mut Registry) {
    registry.register_transform("command", CommandStage);
    registry.register_transform("identity", IdentityStage);

    registry.register_plugin("clean", CleanPlugin);
    registry.register_plugin("banner", BannerPlugin);
    registry.register_plugin("html", HtmlPlugin);
    registry.register_plugin("include-assets", IncludeAssetsPlugin);
    registry.register_plugin("copy", CopyPlugin);
    registry.register_plugin("upload", UploadPlugin);
}

/// Returns its input unchanged.
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityStage;

#[async_trait]
impl Transform for IdentityStage {
    async fn transform(&self, request: TransformRequest<'_>) -> anyhow::Result<Vec<u8>> {
        Ok(request.content)
    }
}

/// Deserialize a collaborator's options; `null` counts as an empty table.
pub(crate) fn parse_options<T: DeserializeOwned>(name: &str, options: &Value) -> anyhow::Result<T> {
    let options = match options {
        Value::Null => Value::Object(Default::default()),
        other => other.clone(),
    };
    serde_json::from_value(options).with_context(|| format!("invalid options for `{name}`"))
}

/// Insert `snippet` before the closing `tag` (e.g. `</head>`), or at the end.
pub(crate) fn insert_before_close(html: &str, tag: &str, snippet: &str) -> String {
    match find_ignore_case(html, tag) {
        Some(at) => format!("{}{}{}", &html[..at], snippet, &html[at..]),
        None => format!("{html}{snippet}"),
    }
}

/// Insert `snippet` right after the opening `tag` (e.g. `<head`), or at the start.
pub(crate) fn insert_after_open(html: &str, tag: &str, snippet: &str) -> String {
    let open_end = find_ignore_case(html, tag)
        .and_then(|at| html[at..].find('>').map(|close| at + close + 1));
    match open_end {
        Some(at) => format!("{}{}{}", &html[..at], snippet, &html[at..]),
        None => format!("{snippet}{html}"),
    }
}

fn find_ignore_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack.to_ascii_lowercase().find(&needle.to_ascii_lowercase())
}
