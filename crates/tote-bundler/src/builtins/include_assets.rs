//! `include-assets` plugin: add extra tags to the emitted page.
//!
//! Typical use is a prebuilt vendor bundle copied next to the output:
//!
//! ```toml
//! [[profiles.production.plugins]]
//! name = "include-assets"
//! options = { assets = ["vendor/vendor.dll.js"], append = false }
//! ```
//!
//! Stylesheets go into `<head>`, everything else into `<body>`. With
//! `append = false` the tags are placed before the page's own tags.

use async_trait::async_trait;
use serde::Deserialize;

use super::{insert_after_open, insert_before_close, parse_options};
use crate::emit::EmitPlan;
use crate::registry::{Plugin, PluginContext};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct IncludeAssetsOptions {
    assets: Vec<String>,
    /// URL prefix for the assets; defaults to `output.public_path`
    #[serde(default)]
    public_path: Option<String>,
    #[serde(default = "default_append")]
    append: bool,
    /// Page to modify, relative to the output directory
    #[serde(default = "default_html")]
    html: String,
}

fn default_append() -> bool {
    true
}

fn default_html() -> String {
    "index.html".to_string()
}

#[derive(Debug, Clone, Copy, Default)]
pub struct IncludeAssetsPlugin;

#[async_trait]
impl Plugin for IncludeAssetsPlugin {
    async fn before_emit(&self, ctx: &PluginContext<'_>, plan: &mut EmitPlan) -> anyhow::Result<()> {
        let options: IncludeAssetsOptions = parse_options(ctx.name, ctx.options)?;

        let url = |asset: &str| match &options.public_path {
            Some(prefix) if prefix.is_empty() || prefix.ends_with('/') => format!("{prefix}{asset}"),
            Some(prefix) => format!("{prefix}/{asset}"),
            None => ctx.config.public_url(asset),
        };

        let mut links = String::new();
        let mut scripts = String::new();
        for asset in &options.assets {
            if asset.ends_with(".css") {
                links.push_str(&format!("<link href=\"{}\" rel=\"stylesheet\">", url(asset)));
            } else {
                scripts.push_str(&format!("<script src=\"{}\"></script>", url(asset)));
            }
        }

        let page = plan.find_mut(&options.html).ok_or_else(|| {
            anyhow::anyhow!(
                "no page `{}` is being emitted; list the html plugin before {}",
                options.html,
                ctx.name
            )
        })?;
        let mut html = String::from_utf8_lossy(page.content()).into_owned();

        if options.append {
            html = insert_before_close(&html, "</head>", &links);
            html = insert_before_close(&html, "</body>", &scripts);
        } else {
            html = insert_after_open(&html, "<head", &links);
            html = insert_after_open(&html, "<body", &scripts);
        }

        page.set_content(html.into_bytes());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{Value, json};
    use std::path::Path;
    use tote_config::Configuration;

    async fn run(plan: &mut EmitPlan, options: Value) -> anyhow::Result<()> {
        let config = Configuration::from_value(json!({
            "entry": { "app": "src/app.js" },
            "output": { "public_path": "/static/" }
        }))
        .unwrap();
        let ctx = PluginContext {
            config: &config,
            options: &options,
            root: Path::new("/p"),
            out_dir: Path::new("/p/build"),
            mode: "production",
            name: "include-assets",
        };
        IncludeAssetsPlugin.before_emit(&ctx, plan).await
    }

    fn page() -> EmitPlan {
        let mut plan = EmitPlan::default();
        plan.add_artifact(
            "html",
            "index.html",
            b"<html><head></head><body><script src=\"/static/app.js\"></script></body></html>".to_vec(),
        )
        .unwrap();
        plan
    }

    fn html(plan: &EmitPlan) -> String {
        String::from_utf8(plan.find("index.html").unwrap().content().to_vec()).unwrap()
    }

    #[tokio::test]
    async fn prepends_vendor_script() {
        let mut plan = page();
        run(&mut plan, json!({ "assets": ["vendor/vendor.dll.js"], "append": false })).await.unwrap();
        assert!(html(&plan).contains(
            "<body><script src=\"/static/vendor/vendor.dll.js\"></script><script src=\"/static/app.js\">"
        ));
    }

    #[tokio::test]
    async fn appends_with_custom_public_path() {
        let mut plan = page();
        run(&mut plan, json!({ "assets": ["theme.css", "late.js"], "public_path": "//cdn" }))
            .await
            .unwrap();
        let html = html(&plan);
        assert!(html.contains("<link href=\"//cdn/theme.css\" rel=\"stylesheet\"></head>"));
        assert!(html.contains("<script src=\"//cdn/late.js\"></script></body>"));
    }

    #[tokio::test]
    async fn missing_page_is_an_error() {
        let mut plan = EmitPlan::default();
        assert!(run(&mut plan, json!({ "assets": ["a.js"] })).await.is_err());
    }
}
