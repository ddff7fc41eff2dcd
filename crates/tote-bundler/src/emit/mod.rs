//! Artifact emission.
//!
//! Emission happens in three steps so that nothing reaches the disk before the
//! whole layout is known:
//!
//! 1. [`Emitter::plan`] renders an output path for every transformed file
//! 2. plugins may add artifacts to the [`EmitPlan`] and collisions are checked
//! 3. [`EmitPlan::write`] writes everything atomically and returns the [`Manifest`]

pub mod manifest;
pub mod writer;

use std::path::Path;

use rustc_hash::FxHashMap;
use tote_config::Configuration;
use tote_config::template::{TemplateValues, render};

use crate::chain::TransformedFile;
use crate::discover::SourceFile;
use crate::error::{Error, Result};
use crate::hash::{content_hash, short_hash};
use crate::paths::{contained, parent_dir_slash, to_slash};

use manifest::{FAILURE_MARKER, MANIFEST_FILE, Manifest, ManifestEntry};

const RESERVED_MANIFEST_OWNER: &str = "tote:manifest.json";
const RESERVED_MARKER_OWNER: &str = "tote:BUILD_FAILED";

/// One file the build is about to write.
#[derive(Debug, Clone, PartialEq)]
pub struct PlannedOutput {
    /// Manifest key: the source path, or `<plugin>:<output>` for plugin artifacts
    pub source: String,
    /// Path relative to the output directory, `/`-separated
    pub output: String,
    /// Logical entry name, for entry points
    pub entry: Option<String>,
    content: Vec<u8>,
    hash: String,
}

impl PlannedOutput {
    fn new(source: String, output: String, entry: Option<String>, content: Vec<u8>) -> Self {
        let hash = content_hash(&content);
        Self {
            source,
            output,
            entry,
            content,
            hash,
        }
    }

    pub fn content(&self) -> &[u8] {
        &self.content
    }

    /// Replace the bytes to emit; the hash follows.
    pub fn set_content(&mut self, content: Vec<u8>) {
        self.hash = content_hash(&content);
        self.content = content;
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// Output extension without the dot.
    pub fn extension(&self) -> Option<&str> {
        Path::new(&self.output).extension().and_then(|ext| ext.to_str())
    }
}

/// Everything a build will write, in emission order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EmitPlan {
    outputs: Vec<PlannedOutput>,
}

impl EmitPlan {
    pub fn outputs(&self) -> &[PlannedOutput] {
        &self.outputs
    }

    pub fn find(&self, output: &str) -> Option<&PlannedOutput> {
        self.outputs.iter().find(|planned| planned.output == output)
    }

    pub fn find_mut(&mut self, output: &str) -> Option<&mut PlannedOutput> {
        self.outputs.iter_mut().find(|planned| planned.output == output)
    }

    /// Planned outputs whose extension is `ext` (no dot).
    pub fn with_extension<'a>(&'a self, ext: &'a str) -> impl Iterator<Item = &'a PlannedOutput> + 'a {
        self.outputs.iter().filter(move |planned| planned.extension() == Some(ext))
    }

    /// Add a file that has no discovered source, recorded as `<plugin>:<output>`.
    pub fn add_artifact(&mut self, plugin: &str, output: impl Into<String>, content: Vec<u8>) -> Result<()> {
        let output = normalize_output(&output.into())?;
        let source = format!("{plugin}:{output}");
        self.outputs.push(PlannedOutput::new(source, output, None, content));
        Ok(())
    }

    /// Fail on the first output path claimed by two sources.
    ///
    /// `manifest.json` and `BUILD_FAILED` at the top of the output directory
    /// belong to the build itself.
    pub fn check_collisions(&self) -> Result<()> {
        let reserved = [
            (MANIFEST_FILE, RESERVED_MANIFEST_OWNER),
            (FAILURE_MARKER, RESERVED_MARKER_OWNER),
        ];
        let mut claimed: FxHashMap<&str, &str> = reserved.into_iter().collect();
        for planned in &self.outputs {
            if let Some(first) = claimed.insert(planned.output.as_str(), planned.source.as_str()) {
                return Err(Error::EmitCollision {
                    first: first.to_string(),
                    second: planned.source.clone(),
                    resolved: planned.output.clone(),
                });
            }
        }
        Ok(())
    }

    /// Write every planned output below `out_dir`, all or nothing.
    pub fn write(&self, out_dir: &Path) -> Result<Manifest> {
        self.check_collisions()?;

        let mut operations = Vec::with_capacity(self.outputs.len());
        for planned in &self.outputs {
            let target = writer::validate_output_path(out_dir, &planned.output)?;
            operations.push((target, planned.content()));
        }
        writer::write_files_atomic(&operations)?;

        let mut manifest = Manifest::new();
        for planned in &self.outputs {
            manifest.insert(
                planned.source.clone(),
                ManifestEntry {
                    output_path: planned.output.clone(),
                    hash: planned.hash.clone(),
                    size: planned.content.len() as u64,
                },
            );
        }

        tracing::debug!(files = self.outputs.len(), out_dir = %out_dir.display(), "outputs written");
        Ok(manifest)
    }
}

/// Turns transformed files into an [`EmitPlan`].
#[derive(Debug, Clone, Copy, Default)]
pub struct Emitter;

impl Emitter {
    pub fn plan(files: Vec<TransformedFile>, config: &Configuration) -> Result<EmitPlan> {
        let mut outputs = Vec::with_capacity(files.len());
        for file in files {
            let hash = content_hash(&file.content);
            let output = output_path_for(config, &file.source, file.output.as_deref(), &hash)?;
            outputs.push(PlannedOutput {
                source: to_slash(&file.source.path),
                output,
                entry: file.source.entry.clone(),
                content: file.content,
                hash,
            });
        }
        Ok(EmitPlan { outputs })
    }
}

/// Output path of `source` for content hashing to `hash`.
///
/// Template precedence: the matching rule's `output`, then `output.path` for
/// entries, then `output.assets`.
pub fn output_path_for(
    config: &Configuration,
    source: &SourceFile,
    rule_output: Option<&str>,
    hash: &str,
) -> Result<String> {
    let template = rule_output.unwrap_or(if source.is_entry() {
        config.output.path.as_str()
    } else {
        config.output.assets.as_str()
    });

    let path = &source.path;
    let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or_default();
    let ext = path.extension().and_then(|s| s.to_str()).unwrap_or_default();
    let dir = parent_dir_slash(path);
    let values = TemplateValues {
        name: source.entry.as_deref().unwrap_or(stem),
        ext,
        hash: short_hash(hash),
        path: &dir,
    };

    normalize_output(&render(template, &values))
}

fn normalize_output(output: &str) -> Result<String> {
    contained(Path::new(output))
        .map(|path| to_slash(&path))
        .filter(|path| !path.is_empty())
        .ok_or_else(|| Error::InvalidOutputPath(format!("`{output}` escapes the output directory")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn config() -> Configuration {
        Configuration::from_value(json!({
            "entry": { "app": "src/main.js" },
            "output": { "path": "js/[name].[hash].js" }
        }))
        .unwrap()
    }

    fn transformed(path: &str, entry: Option<&str>, output: Option<&str>, content: &[u8]) -> TransformedFile {
        TransformedFile {
            source: SourceFile {
                path: path.into(),
                entry: entry.map(str::to_string),
            },
            content: content.to_vec(),
            output: output.map(str::to_string),
        }
    }

    #[test]
    fn template_precedence() {
        let config = config();
        let hash = content_hash(b"x");

        let entry = SourceFile::entry("app", "src/main.js");
        let asset = SourceFile::new("src/img/logo.png");
        let styled = SourceFile::new("src/styles/x.scss");

        assert_eq!(
            output_path_for(&config, &entry, None, &hash).unwrap(),
            format!("js/app.{}.js", &hash[..8])
        );
        assert_eq!(output_path_for(&config, &asset, None, &hash).unwrap(), "src/img/logo.png");
        assert_eq!(
            output_path_for(&config, &styled, Some("css/[name].css"), &hash).unwrap(),
            "css/x.css"
        );
    }

    #[test]
    fn escaping_template_is_rejected() {
        let config = config();
        let source = SourceFile::new("src/a.js");
        let result = output_path_for(&config, &source, Some("../../[name].js"), "00");
        assert!(matches!(result, Err(Error::InvalidOutputPath(_))));
    }

    #[test]
    fn collision_names_both_sources() {
        let files = vec![
            transformed("src/a/x.scss", None, Some("css/[name].css"), b"a"),
            transformed("src/b/x.scss", None, Some("css/[name].css"), b"b"),
        ];
        let plan = Emitter::plan(files, &config()).unwrap();
        match plan.check_collisions() {
            Err(Error::EmitCollision { first, second, resolved }) => {
                assert_eq!(first, "src/a/x.scss");
                assert_eq!(second, "src/b/x.scss");
                assert_eq!(resolved, "css/x.css");
            }
            other => panic!("expected EmitCollision, got {other:?}"),
        }
    }

    #[test]
    fn reserved_names_collide() {
        let mut plan = EmitPlan::default();
        plan.add_artifact("copy", "manifest.json", b"{}".to_vec()).unwrap();
        match plan.check_collisions() {
            Err(Error::EmitCollision { first, second, resolved }) => {
                assert_eq!(first, "tote:manifest.json");
                assert_eq!(second, "copy:manifest.json");
                assert_eq!(resolved, "manifest.json");
            }
            other => panic!("expected EmitCollision, got {other:?}"),
        }

        let mut nested = EmitPlan::default();
        nested.add_artifact("copy", "pwa/manifest.json", b"{}".to_vec()).unwrap();
        nested.check_collisions().unwrap();
    }

    #[test]
    fn artifacts_are_keyed_by_plugin() {
        let mut plan = EmitPlan::default();
        plan.add_artifact("html", "./index.html", b"<html></html>".to_vec()).unwrap();
        let page = plan.find("index.html").unwrap();
        assert_eq!(page.source, "html:index.html");
        assert_eq!(page.hash(), content_hash(b"<html></html>"));
    }

    #[test]
    fn set_content_rehashes() {
        let mut plan = EmitPlan::default();
        plan.add_artifact("copy", "a.txt", b"one".to_vec()).unwrap();
        let planned = plan.find_mut("a.txt").unwrap();
        planned.set_content(b"two".to_vec());
        assert_eq!(planned.hash(), content_hash(b"two"));
    }
}
