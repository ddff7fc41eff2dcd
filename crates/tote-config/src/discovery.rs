//! File-based config discovery for CLI use
//!
//! Handles finding and loading tote configuration files from the filesystem.
//! A config file holds the base [`Configuration`] plus named overlays under
//! `[profiles.<mode>]` and an optional `[upload]` table.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use figment::{
    Figment,
    providers::{Env, Format, Json, Toml},
};
use serde_json::Value;

use crate::config::Configuration;
use crate::error::{ConfigError, Result};
use crate::overlay::{merge_all, Overlay};
use crate::rule::PluginRef;

/// Environment variables with this prefix override config keys (`TOTE_OUTPUT__DIR`).
pub const ENV_PREFIX: &str = "TOTE_";

/// Top-level config tables an environment variable may address.
const ENV_TABLES: &[&str] = &[
    "project", "entry", "output", "resolve", "settings", "rules", "plugins", "profiles", "upload",
];

/// The only mode in which `--upload` appends the upload plugin.
pub const UPLOAD_MODE: &str = "production";

/// `TOTE_<TABLE>__<KEY>` variables only; unrelated `TOTE_*` names (`TOTE_TOKEN`) are skipped.
fn env_overrides() -> Env {
    Env::prefixed(ENV_PREFIX)
        .filter(|key| {
            let table = key.as_str().split("__").next().unwrap_or_default();
            key.as_str().contains("__") && ENV_TABLES.iter().any(|t| t.eq_ignore_ascii_case(table))
        })
        .split("__")
}

/// A loaded config file: base configuration plus its mode overlays.
#[derive(Debug, Clone, Default)]
pub struct ConfigFile {
    /// File the configuration was read from, if any
    pub source: Option<PathBuf>,
    pub base: Configuration,
    pub profiles: BTreeMap<String, Overlay>,
    /// Options for the upload plugin, opaque to the core
    pub upload: Option<Value>,
}

impl ConfigFile {
    /// Split a raw config object into base, profiles and upload options.
    ///
    /// # Example
    ///
    /// ```
    /// use tote_config::ConfigFile;
    /// use serde_json::json;
    ///
    /// let file = ConfigFile::from_value(json!({
    ///     "entry": { "app": "src/app.js" },
    ///     "profiles": { "production": { "output": { "public_path": "//cdn/" } } }
    /// }))
    /// .unwrap();
    ///
    /// let config = file.materialize("production", false).unwrap();
    /// assert_eq!(config.output.public_path, "//cdn/");
    /// ```
    pub fn from_value(value: Value) -> Result<Self> {
        let Value::Object(mut map) = value else {
            return Err(ConfigError::InvalidValue {
                field: "config".to_string(),
                hint: Some("The configuration must be a table".to_string()),
            });
        };

        let profiles = match map.remove("profiles") {
            None | Some(Value::Null) => BTreeMap::new(),
            Some(Value::Object(profiles)) => profiles
                .into_iter()
                .map(|(mode, value)| Overlay::from_value(&mode, value).map(|o| (mode, o)))
                .collect::<Result<_>>()?,
            Some(_) => {
                return Err(ConfigError::InvalidValue {
                    field: "profiles".to_string(),
                    hint: Some("Expected a table of `[profiles.<mode>]` overlays".to_string()),
                });
            }
        };

        let upload = map.remove("upload").filter(|v| !v.is_null());
        let base = Configuration::from_value(Value::Object(map))?;

        Ok(Self {
            source: None,
            base,
            profiles,
            upload,
        })
    }

    /// Parse a `tote.toml` document (no environment overrides).
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let toml_val: toml::Value = toml::from_str(content).map_err(|e| ConfigError::InvalidValue {
            field: "toml".to_string(),
            hint: Some(format!("Invalid TOML syntax: {}", e)),
        })?;

        let value = serde_json::to_value(toml_val).map_err(|e| ConfigError::InvalidValue {
            field: "toml".to_string(),
            hint: Some(format!("TOML to JSON conversion failed: {}", e)),
        })?;

        Self::from_value(value)
    }

    pub fn profile(&self, mode: &str) -> Option<&Overlay> {
        self.profiles.get(mode)
    }

    /// Overlays to apply for `mode`, in merge order.
    ///
    /// The mode's profile comes first (absent profiles contribute nothing); with
    /// `upload` in [`UPLOAD_MODE`], an overlay appending the `upload` plugin follows.
    pub fn overlays(&self, mode: &str, upload: bool) -> Result<Vec<Overlay>> {
        let mut overlays = Vec::new();

        match self.profile(mode) {
            Some(overlay) => overlays.push(overlay.clone()),
            None => tracing::debug!(mode, "no profile for mode, using base configuration"),
        }

        if upload {
            if mode == UPLOAD_MODE {
                let options = self.upload.clone().ok_or(ConfigError::MissingUploadTarget)?;
                overlays.push(Overlay::with_plugins([
                    PluginRef::new("upload").with_options(options)
                ]));
            } else {
                tracing::warn!(mode, "--upload is only honoured in {UPLOAD_MODE} mode");
            }
        }

        Ok(overlays)
    }

    /// Merge the base with the overlays for `mode`.
    pub fn materialize(&self, mode: &str, upload: bool) -> Result<Configuration> {
        let overlays = self.overlays(mode, upload)?;
        merge_all(&self.base, &overlays)
    }
}

/// File-based configuration discovery
///
/// Searches for tote configuration files in conventional locations and loads them.
/// Library users can build a [`Configuration`] directly instead.
///
/// # Example
///
/// ```no_run
/// use tote_config::ConfigDiscovery;
///
/// let file = ConfigDiscovery::new(".").load().unwrap();
/// let config = file.materialize("production", false).unwrap();
/// ```
pub struct ConfigDiscovery {
    root: PathBuf,
}

impl ConfigDiscovery {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    /// Find a config file in the root directory
    ///
    /// Searches in this order:
    /// 1. TOML config: tote.toml
    /// 2. package.json (tote field)
    pub fn find(&self) -> Option<PathBuf> {
        let toml_path = self.root.join("tote.toml");
        if toml_path.exists() {
            return Some(toml_path);
        }

        let pkg_path = self.root.join("package.json");
        if read_package_json(&pkg_path)
            .is_some_and(|parsed| parsed.get("tote").is_some_and(|v| !v.is_null()))
        {
            return Some(pkg_path);
        }

        None
    }

    /// Load config from the discovered file
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotFound` if no config file is found.
    pub fn load(&self) -> Result<ConfigFile> {
        let path = self.find().ok_or_else(|| ConfigError::NotFound {
            root: self.root.clone(),
        })?;
        self.load_from(&path)
    }

    /// Load config from a specific file path
    pub fn load_from(&self, path: &Path) -> Result<ConfigFile> {
        if !path.is_file() {
            return Err(ConfigError::NotFound {
                root: path.to_path_buf(),
            });
        }

        let figment = if path.file_name() == Some(std::ffi::OsStr::new("package.json")) {
            Figment::from(Json::file(path)).focus("tote")
        } else if path.extension().is_some_and(|ext| ext == "json") {
            Figment::from(Json::file(path))
        } else {
            Figment::from(Toml::file(path))
        };

        let value: Value = figment
            .merge(env_overrides())
            .extract()
            .map_err(|e| ConfigError::Parse {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;

        let mut file = ConfigFile::from_value(value)?;
        file.source = Some(path.to_path_buf());
        self.fill_project_from_package(&mut file.base);
        tracing::debug!(path = %path.display(), profiles = file.profiles.len(), "loaded configuration");
        Ok(file)
    }

    /// `project.name` / `project.version` default to package.json's fields.
    fn fill_project_from_package(&self, config: &mut Configuration) {
        if config.project.name.is_some() && config.project.version.is_some() {
            return;
        }
        let Some(pkg) = read_package_json(&self.root.join("package.json")) else {
            return;
        };
        let field = |key: &str| pkg.get(key).and_then(Value::as_str).map(str::to_string);
        if config.project.name.is_none() {
            config.project.name = field("name");
        }
        if config.project.version.is_none() {
            config.project.version = field("version");
        }
    }
}

fn read_package_json(path: &Path) -> Option<Value> {
    let content = fs::read_to_string(path).ok()?;
    serde_json::from_str(&content).ok()
}

/// Discover and load config from the current directory (convenience function)
pub fn discover() -> Result<ConfigFile> {
    let root = std::env::current_dir()?;
    ConfigDiscovery::new(&root).load()
}
