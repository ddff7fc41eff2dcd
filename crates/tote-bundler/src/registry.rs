//! Collaborator traits and the name registry.
//!
//! Stages and plugins are referenced by name in the configuration. The
//! [`Registry`] maps those names to implementations and is checked against the
//! configuration before any file is touched, so a typo fails the build with
//! [`Error::UnknownCollaborator`] instead of halfway through emission.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use rustc_hash::FxHashMap;
use serde_json::Value;
use tote_config::Configuration;

use crate::chain::TransformedFile;
use crate::emit::EmitPlan;
use crate::emit::manifest::Manifest;
use crate::error::{CollaboratorKind, Error, Result};

/// Input for a single transform stage.
#[derive(Debug)]
pub struct TransformRequest<'a> {
    /// Source path relative to the project root
    pub path: &'a Path,
    /// Absolute project root
    pub root: &'a Path,
    /// Output of the previous stage (or the file's bytes for the first stage)
    pub content: Vec<u8>,
    /// Stage options exactly as configured
    pub options: &'a Value,
}

/// One named transform step applied to a single file's content.
#[async_trait]
pub trait Transform: Send + Sync {
    async fn transform(&self, request: TransformRequest<'_>) -> anyhow::Result<Vec<u8>>;
}

/// What a plugin hook can see of the build.
#[derive(Debug, Clone, Copy)]
pub struct PluginContext<'a> {
    pub config: &'a Configuration,
    /// This plugin's options exactly as configured
    pub options: &'a Value,
    pub root: &'a Path,
    pub out_dir: &'a Path,
    pub mode: &'a str,
    /// Name the plugin was registered under
    pub name: &'a str,
}

/// Whole-build lifecycle hooks. Every hook defaults to a no-op.
#[async_trait]
pub trait Plugin: Send + Sync {
    /// Runs before entry points are walked.
    async fn before_discover(&self, _ctx: &PluginContext<'_>) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs once every transform chain has finished; may rewrite file contents.
    async fn after_transform(
        &self,
        _ctx: &PluginContext<'_>,
        _files: &mut [TransformedFile],
    ) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after output paths are planned and before anything is written; may add artifacts.
    async fn before_emit(&self, _ctx: &PluginContext<'_>, _plan: &mut EmitPlan) -> anyhow::Result<()> {
        Ok(())
    }

    /// Runs after every output is on disk, before the manifest is published.
    async fn after_emit(&self, _ctx: &PluginContext<'_>, _manifest: &Manifest) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Name -> implementation tables for stages and plugins.
#[derive(Clone, Default)]
pub struct Registry {
    transforms: FxHashMap<String, Arc<dyn Transform>>,
    plugins: FxHashMap<String, Arc<dyn Plugin>>,
}

impl Registry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the built-in stages and plugins.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        crate::builtins::register_builtins(&mut registry);
        registry
    }

    /// Register a stage, replacing any previous stage with the same name.
    pub fn register_transform(&mut self, name: impl Into<String>, transform: impl Transform + 'static) {
        self.transforms.insert(name.into(), Arc::new(transform));
    }

    pub fn with_transform(mut self, name: impl Into<String>, transform: impl Transform + 'static) -> Self {
        self.register_transform(name, transform);
        self
    }

    /// Register a plugin, replacing any previous plugin with the same name.
    pub fn register_plugin(&mut self, name: impl Into<String>, plugin: impl Plugin + 'static) {
        self.plugins.insert(name.into(), Arc::new(plugin));
    }

    pub fn with_plugin(mut self, name: impl Into<String>, plugin: impl Plugin + 'static) -> Self {
        self.register_plugin(name, plugin);
        self
    }

    pub fn transform(&self, name: &str) -> Result<Arc<dyn Transform>> {
        self.transforms
            .get(name)
            .cloned()
            .ok_or_else(|| unknown(CollaboratorKind::Stage, name))
    }

    pub fn plugin(&self, name: &str) -> Result<Arc<dyn Plugin>> {
        self.plugins
            .get(name)
            .cloned()
            .ok_or_else(|| unknown(CollaboratorKind::Plugin, name))
    }

    /// Check that every stage and plugin named by `config` is registered.
    pub fn check(&self, config: &Configuration) -> Result<()> {
        for stage in config.rules.iter().flat_map(|rule| &rule.stages) {
            if !self.transforms.contains_key(&stage.name) {
                return Err(unknown(CollaboratorKind::Stage, &stage.name));
            }
        }
        for plugin in &config.plugins {
            if !self.plugins.contains_key(&plugin.name) {
                return Err(unknown(CollaboratorKind::Plugin, &plugin.name));
            }
        }
        Ok(())
    }

    /// Registered stage names, sorted.
    pub fn transform_names(&self) -> Vec<&str> {
        sorted_keys(&self.transforms)
    }

    /// Registered plugin names, sorted.
    pub fn plugin_names(&self) -> Vec<&str> {
        sorted_keys(&self.plugins)
    }
}

impl fmt::Debug for Registry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registry")
            .field("transforms", &self.transform_names())
            .field("plugins", &self.plugin_names())
            .finish()
    }
}

fn sorted_keys<V>(map: &FxHashMap<String, V>) -> Vec<&str> {
    let mut names: Vec<&str> = map.keys().map(String::as_str).collect();
    names.sort_unstable();
    names
}

fn unknown(kind: CollaboratorKind, name: &str) -> Error {
    Error::UnknownCollaborator {
        kind,
        name: name.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    struct Upper;

    #[async_trait]
    impl Transform for Upper {
        async fn transform(&self, request: TransformRequest<'_>) -> anyhow::Result<Vec<u8>> {
            Ok(request.content.to_ascii_uppercase())
        }
    }

    fn config(stages: &[&str], plugins: &[&str]) -> Configuration {
        Configuration::from_value(json!({
            "entry": { "app": "src/app.js" },
            "rules": [{ "test": "\\.js$", "use": stages }],
            "plugins": plugins,
        }))
        .unwrap()
    }

    #[test]
    fn builtins_are_registered() {
        let registry = Registry::with_builtins();
        assert!(registry.transform_names().contains(&"command"));
        assert!(registry.plugin_names().contains(&"banner"));
    }

    #[test]
    fn check_accepts_registered_names() {
        let registry = Registry::with_builtins().with_transform("upper", Upper);
        registry.check(&config(&["upper", "identity"], &["clean"])).unwrap();
    }

    #[test]
    fn check_rejects_unknown_stage() {
        let registry = Registry::with_builtins();
        match registry.check(&config(&["identity", "sass-compile"], &[])) {
            Err(Error::UnknownCollaborator { kind, name }) => {
                assert_eq!(kind, CollaboratorKind::Stage);
                assert_eq!(name, "sass-compile");
            }
            other => panic!("expected UnknownCollaborator, got {other:?}"),
        }
    }

    #[test]
    fn check_rejects_unknown_plugin() {
        let registry = Registry::with_builtins();
        let err = registry.check(&config(&[], &["vue-loader"])).unwrap_err();
        assert!(matches!(
            err,
            Error::UnknownCollaborator { kind: CollaboratorKind::Plugin, .. }
        ));
    }
}
