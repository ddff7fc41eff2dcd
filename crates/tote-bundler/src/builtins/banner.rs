//! `banner` plugin: prepend a comment to script and style outputs.
//!
//! `[project]` and `[version]` in the text expand from the project metadata.
//! No timestamp is added, so identical inputs keep identical hashes.

use std::path::Path;

use async_trait::async_trait;
use serde::Deserialize;

use super::parse_options;
use crate::chain::TransformedFile;
use crate::emit::output_path_for;
use crate::hash::content_hash;
use crate::registry::{Plugin, PluginContext};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct BannerOptions {
    banner: String,
    #[serde(default = "default_extensions")]
    extensions: Vec<String>,
}

fn default_extensions() -> Vec<String> {
    vec!["js".to_string(), "css".to_string()]
}

#[derive(Debug, Clone, Copy, Default)]
pub struct BannerPlugin;

#[async_trait]
impl Plugin for BannerPlugin {
    async fn after_transform(
        &self,
        ctx: &PluginContext<'_>,
        files: &mut [TransformedFile],
    ) -> anyhow::Result<()> {
        let options: BannerOptions = parse_options(ctx.name, ctx.options)?;
        let project = &ctx.config.project;
        let text = options
            .banner
            .replace("[project]", project.name.as_deref().unwrap_or_default())
            .replace("[version]", project.version.as_deref().unwrap_or_default())
            .replace("*/", "* /");
        let comment = format!("/*! {text} */\n");

        for file in files.iter_mut() {
            let output = output_path_for(
                ctx.config,
                &file.source,
                file.output.as_deref(),
                &content_hash(&file.content),
            )?;
            let ext = Path::new(&output).extension().and_then(|ext| ext.to_str());
            if ext.is_some_and(|ext| options.extensions.iter().any(|wanted| wanted == ext)) {
                let mut content = Vec::with_capacity(comment.len() + file.content.len());
                content.extend_from_slice(comment.as_bytes());
                content.append(&mut file.content);
                file.content = content;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::discover::SourceFile;
    use serde_json::json;
    use tote_config::Configuration;

    fn file(path: &str, output: Option<&str>) -> TransformedFile {
        TransformedFile {
            source: SourceFile::new(path),
            content: b"x".to_vec(),
            output: output.map(str::to_string),
        }
    }

    #[tokio::test]
    async fn prepends_to_scripts_and_styles_only() {
        let config = Configuration::from_value(json!({
            "project": { "name": "shop", "version": "1.2.0" },
            "entry": { "app": "src/app.js" }
        }))
        .unwrap();
        let options = json!({ "banner": "[project] v[version]" });
        let ctx = PluginContext {
            config: &config,
            options: &options,
            root: Path::new("/p"),
            out_dir: Path::new("/p/build"),
            mode: "production",
            name: "banner",
        };

        let mut files = vec![
            file("src/app.js", None),
            file("src/x.scss", Some("css/[name].css")),
            file("src/logo.png", None),
        ];
        BannerPlugin.after_transform(&ctx, &mut files).await.unwrap();

        assert_eq!(files[0].content, b"/*! shop v1.2.0 */\nx");
        assert_eq!(files[1].content, b"/*! shop v1.2.0 */\nx");
        assert_eq!(files[2].content, b"x");
    }
}
