//! The effective build configuration.
//!
//! A [`Configuration`] is constructed once per build (base + mode overlay, see
//! [`crate::overlay`]) and is immutable afterwards. Every component receives it
//! by reference.

use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ConfigError, Result as ConfigResult};
use crate::rule::{PluginRef, Rule};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Configuration {
    #[serde(default)]
    pub project: ProjectInfo,

    /// Logical entry name -> source path, relative to the project root
    #[serde(default)]
    pub entry: IndexMap<String, PathBuf>,

    #[serde(default)]
    pub output: OutputOptions,

    #[serde(default)]
    pub resolve: ResolveOptions,

    #[serde(default)]
    pub rules: Vec<Rule>,

    #[serde(default)]
    pub plugins: Vec<PluginRef>,

    #[serde(default)]
    pub settings: BuildSettings,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProjectInfo {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputOptions {
    /// Output directory; `[version]` and `[project]` expand from `project`
    #[serde(default = "default_out_dir")]
    pub dir: PathBuf,

    /// Filename template for entry points
    #[serde(default = "default_entry_template")]
    pub path: String,

    /// Filename template for every other emitted file
    #[serde(default = "default_asset_template")]
    pub assets: String,

    /// URL prefix under which the output directory is served
    #[serde(default = "default_public_path")]
    pub public_path: String,
}

impl Default for OutputOptions {
    fn default() -> Self {
        Self {
            dir: default_out_dir(),
            path: default_entry_template(),
            assets: default_asset_template(),
            public_path: default_public_path(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ResolveOptions {
    /// Extensions tried, in order, when a relative import omits one
    #[serde(default = "default_extensions")]
    pub extensions: Vec<String>,
}

impl Default for ResolveOptions {
    fn default() -> Self {
        Self {
            extensions: default_extensions(),
        }
    }
}

impl ResolveOptions {
    /// Extensions with a guaranteed leading dot (`json` -> `.json`).
    pub fn normalized_extensions(&self) -> Vec<String> {
        self.extensions
            .iter()
            .filter(|ext| !ext.is_empty())
            .map(|ext| {
                if ext.starts_with('.') {
                    ext.clone()
                } else {
                    format!(".{ext}")
                }
            })
            .collect()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BuildSettings {
    /// Upper bound on concurrently running transform chains (default: CPU count)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    #[serde(default)]
    pub discovery: DiscoveryMode,
}

/// How source files are enumerated from the entry points.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DiscoveryMode {
    /// Follow relative module references starting at the entries
    #[default]
    Graph,
    /// Take every file below the entries' directories
    Walk,
}

impl Configuration {
    /// Create from serde_json::Value (for programmatic config)
    ///
    /// # Example
    ///
    /// ```
    /// use tote_config::Configuration;
    /// use serde_json::json;
    /// use std::path::PathBuf;
    ///
    /// let config = Configuration::from_value(json!({
    ///     "entry": { "app": "src/app.js" },
    ///     "output": { "path": "js/[name].js" }
    /// }))
    /// .unwrap();
    ///
    /// assert_eq!(config.entry["app"], PathBuf::from("src/app.js"));
    /// assert_eq!(config.output.path, "js/[name].js");
    /// ```
    pub fn from_value(value: Value) -> ConfigResult<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Convert to serde_json::Value
    pub fn to_value(&self) -> ConfigResult<Value> {
        serde_json::to_value(self).map_err(|e| ConfigError::InvalidValue {
            field: "config".to_string(),
            hint: Some(e.to_string()),
        })
    }

    /// Expand `[version]` and `[project]` in the output directory and public path.
    ///
    /// Runs after overlays are merged so that a profile can change either the
    /// templates or the project metadata.
    pub fn expand_project_tokens(mut self) -> Self {
        let version = self.project.version.clone().unwrap_or_default();
        let project = self.project.name.clone().unwrap_or_default();
        let expand = |input: &str| input.replace("[version]", &version).replace("[project]", &project);

        let dir = expand(&self.output.dir.to_string_lossy());
        self.output.dir = PathBuf::from(dir);
        self.output.public_path = expand(&self.output.public_path);
        self
    }

    /// Public URL for an output path relative to the output directory.
    pub fn public_url(&self, output: &str) -> String {
        let prefix = &self.output.public_path;
        if prefix.is_empty() {
            return output.to_string();
        }
        if prefix.ends_with('/') {
            format!("{prefix}{output}")
        } else {
            format!("{prefix}/{output}")
        }
    }
}

fn default_out_dir() -> PathBuf {
    PathBuf::from("build")
}

fn default_entry_template() -> String {
    "[name].[ext]".to_string()
}

fn default_asset_template() -> String {
    "[path][name].[ext]".to_string()
}

fn default_public_path() -> String {
    "/".to_string()
}

fn default_extensions() -> Vec<String> {
    vec![".js".to_string(), ".json".to_string()]
}
