//! Mode overlays and the configuration merger.
//!
//! An [`Overlay`] is a partial [`Configuration`] keyed by mode name
//! (`[profiles.production]`). Merging never mutates its inputs:
//!
//! - scalar fields present in the overlay replace the base value
//! - list fields (`rules`, `plugins`, `resolve.extensions`) are appended after the base list
//! - `entry` is merged by key, overlay wins
//! - keys the schema does not know are rejected with [`ConfigError::UnknownOverlayKey`]

use std::collections::BTreeMap;
use std::path::PathBuf;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::{Configuration, DiscoveryMode};
use crate::error::{ConfigError, Result};
use crate::rule::{PluginRef, Rule};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Overlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project: Option<ProjectOverlay>,

    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub entry: IndexMap<String, PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<OutputOverlay>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub resolve: Option<ResolveOverlay>,

    /// Appended after the base rules
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub rules: Vec<Rule>,

    /// Appended after the base plugins
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginRef>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settings: Option<SettingsOverlay>,

    /// Keys outside the schema, kept so [`merge`] can reject them
    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectOverlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct OutputOverlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dir: Option<PathBuf>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub assets: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_path: Option<String>,

    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResolveOverlay {
    /// Appended after the base extensions
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extensions: Vec<String>,

    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SettingsOverlay {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jobs: Option<usize>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub discovery: Option<DiscoveryMode>,

    #[serde(flatten)]
    pub unknown: BTreeMap<String, Value>,
}

impl Overlay {
    /// Parse an overlay from a JSON value (one `[profiles.<mode>]` table).
    pub fn from_value(mode: &str, value: Value) -> Result<Self> {
        serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
            field: format!("profiles.{mode}"),
            hint: Some(e.to_string()),
        })
    }

    /// Overlay that only appends plugins.
    pub fn with_plugins(plugins: impl IntoIterator<Item = PluginRef>) -> Self {
        Self {
            plugins: plugins.into_iter().collect(),
            ..Self::default()
        }
    }

    /// First key, in `section.key` form, that the schema does not know.
    fn first_unknown_key(&self) -> Option<String> {
        fn nested(section: &str, unknown: &BTreeMap<String, Value>) -> Option<String> {
            unknown.keys().next().map(|key| format!("{section}.{key}"))
        }

        self.unknown
            .keys()
            .next()
            .cloned()
            .or_else(|| self.project.as_ref().and_then(|p| nested("project", &p.unknown)))
            .or_else(|| self.output.as_ref().and_then(|o| nested("output", &o.unknown)))
            .or_else(|| self.resolve.as_ref().and_then(|r| nested("resolve", &r.unknown)))
            .or_else(|| self.settings.as_ref().and_then(|s| nested("settings", &s.unknown)))
    }
}

/// Combine a base configuration with one overlay into a new configuration.
///
/// # Example
///
/// ```
/// use tote_config::{merge, Configuration, Overlay, PluginRef};
///
/// let base = Configuration::default();
/// let overlay = Overlay::with_plugins([PluginRef::new("banner")]);
///
/// let merged = merge(&base, &overlay).unwrap();
/// assert_eq!(merged.plugins.len(), base.plugins.len() + 1);
/// assert_eq!(merge(&base, &Overlay::default()).unwrap(), base);
/// ```
pub fn merge(base: &Configuration, overlay: &Overlay) -> Result<Configuration> {
    if let Some(key) = overlay.first_unknown_key() {
        return Err(ConfigError::UnknownOverlayKey { key });
    }

    let mut merged = base.clone();

    if let Some(project) = &overlay.project {
        replace(&mut merged.project.name, project.name.as_ref().map(|v| Some(v.clone())));
        replace(&mut merged.project.version, project.version.as_ref().map(|v| Some(v.clone())));
    }

    // IndexMap::insert keeps the position of an existing key
    for (name, path) in &overlay.entry {
        merged.entry.insert(name.clone(), path.clone());
    }

    if let Some(output) = &overlay.output {
        replace(&mut merged.output.dir, output.dir.clone());
        replace(&mut merged.output.path, output.path.clone());
        replace(&mut merged.output.assets, output.assets.clone());
        replace(&mut merged.output.public_path, output.public_path.clone());
    }

    if let Some(resolve) = &overlay.resolve {
        merged
            .resolve
            .extensions
            .extend(resolve.extensions.iter().cloned());
    }

    merged.rules.extend(overlay.rules.iter().cloned());
    merged.plugins.extend(overlay.plugins.iter().cloned());

    if let Some(settings) = &overlay.settings {
        replace(&mut merged.settings.jobs, settings.jobs.map(Some));
        replace(&mut merged.settings.discovery, settings.discovery);
    }

    Ok(merged)
}

/// Fold several overlays onto `base`, left to right.
pub fn merge_all<'a>(
    base: &Configuration,
    overlays: impl IntoIterator<Item = &'a Overlay>,
) -> Result<Configuration> {
    overlays
        .into_iter()
        .try_fold(base.clone(), |acc, overlay| merge(&acc, overlay))
}

fn replace<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}
