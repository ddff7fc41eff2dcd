//! `html` plugin: render the application page.
//!
//! Links every emitted stylesheet before `</head>` and every entry script
//! before `</body>`, with URLs under `output.public_path`.

use std::path::PathBuf;

use anyhow::Context;
use async_trait::async_trait;
use serde::Deserialize;

use super::{insert_before_close, parse_options};
use crate::emit::EmitPlan;
use crate::registry::{Plugin, PluginContext};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct HtmlOptions {
    /// Page template relative to the project root
    #[serde(default)]
    template: Option<PathBuf>,
    #[serde(default = "default_filename")]
    filename: String,
    #[serde(default)]
    title: Option<String>,
}

fn default_filename() -> String {
    "index.html".to_string()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlPlugin;

#[async_trait]
impl Plugin for HtmlPlugin {
    async fn before_emit(&self, ctx: &PluginContext<'_>, plan: &mut EmitPlan) -> anyhow::Result<()> {
        let options: HtmlOptions = parse_options(ctx.name, ctx.options)?;

        let mut page = match &options.template {
            Some(template) => {
                let path = ctx.root.join(template);
                tokio::fs::read_to_string(&path)
                    .await
                    .with_context(|| format!("failed to read template {}", path.display()))?
            }
            None => default_page(
                options
                    .title
                    .as_deref()
                    .or(ctx.config.project.name.as_deref())
                    .unwrap_or("App"),
            ),
        };

        let links: String = plan
            .with_extension("css")
            .map(|css| format!("<link href=\"{}\" rel=\"stylesheet\">", ctx.config.public_url(&css.output)))
            .collect();
        let scripts: String = plan
            .outputs()
            .iter()
            .filter(|planned| planned.entry.is_some() && planned.extension() == Some("js"))
            .map(|js| format!("<script src=\"{}\"></script>", ctx.config.public_url(&js.output)))
            .collect();

        page = insert_before_close(&page, "</head>", &links);
        page = insert_before_close(&page, "</body>", &scripts);

        plan.add_artifact(ctx.name, options.filename, page.into_bytes())?;
        Ok(())
    }
}

fn default_page(title: &str) -> String {
    format!(
        "<!DOCTYPE html>\n<html>\n<head>\n<meta charset=\"utf-8\">\n<title>{title}</title>\n</head>\n<body>\n<div id=\"app\"></div>\n</body>\n</html>\n"
    )
}
