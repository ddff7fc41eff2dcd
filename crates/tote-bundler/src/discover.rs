//! Source discovery from entry points.
//!
//! Two strategies ship with the crate:
//!
//! - [`ModuleGraph`] follows relative references (`import`, `require`,
//!   `@import`, `url()`, `src`/`href`) breadth-first from the entries. Bare
//!   package specifiers are left to the transform stages.
//! - [`DirectoryWalk`] takes every visible file below the entries' directories.
//!
//! Both return entries first, in configuration order, and never yield a file twice.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use once_cell::sync::Lazy;
use path_clean::PathClean;
use regex::Regex;
use rustc_hash::FxHashSet;
use tote_config::{Configuration, DiscoveryMode};
use walkdir::WalkDir;

use crate::error::{Error, Result};
use crate::paths::contained;

/// A discovered source file.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct SourceFile {
    /// Path relative to the project root
    pub path: PathBuf,
    /// Logical entry name, for entry points
    pub entry: Option<String>,
}

impl SourceFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entry: None,
        }
    }

    pub fn entry(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            entry: Some(name.into()),
        }
    }

    pub fn is_entry(&self) -> bool {
        self.entry.is_some()
    }
}

/// Enumerates the files a build processes.
#[async_trait]
pub trait Discoverer: Send + Sync {
    async fn discover(&self, root: &Path, config: &Configuration) -> Result<Vec<SourceFile>>;
}

/// Built-in discoverer for a configured mode.
pub fn discoverer_for(mode: DiscoveryMode) -> Arc<dyn Discoverer> {
    match mode {
        DiscoveryMode::Graph => Arc::new(ModuleGraph),
        DiscoveryMode::Walk => Arc::new(DirectoryWalk),
    }
}

/// Entry points as source files, checked to exist inside the root.
pub fn entry_files(root: &Path, config: &Configuration) -> Result<Vec<SourceFile>> {
    let mut files = Vec::with_capacity(config.entry.len());
    let mut seen = FxHashSet::default();

    for (name, path) in &config.entry {
        let relative = contained(path).ok_or_else(|| Error::Discovery {
            file: path.clone(),
            message: format!("entry `{name}` is outside the project root"),
        })?;
        if !root.join(&relative).is_file() {
            return Err(Error::Discovery {
                file: relative,
                message: format!("entry `{name}` does not exist"),
            });
        }
        if seen.insert(relative.clone()) {
            files.push(SourceFile::entry(name, relative));
        }
    }

    Ok(files)
}

/// Follows relative module references from the entries.
#[derive(Debug, Clone, Copy, Default)]
pub struct ModuleGraph;

#[async_trait]
impl Discoverer for ModuleGraph {
    async fn discover(&self, root: &Path, config: &Configuration) -> Result<Vec<SourceFile>> {
        let extensions = config.resolve.normalized_extensions();
        let mut files = entry_files(root, config)?;
        let mut seen: FxHashSet<PathBuf> = files.iter().map(|f| f.path.clone()).collect();
        let mut queue: VecDeque<PathBuf> = files.iter().map(|f| f.path.clone()).collect();

        while let Some(current) = queue.pop_front() {
            let Some(syntax) = Syntax::of(&current) else {
                continue;
            };

            let bytes = tokio::fs::read(root.join(&current)).await.map_err(|e| Error::Discovery {
                file: current.clone(),
                message: format!("cannot read: {e}"),
            })?;
            let source = String::from_utf8_lossy(&bytes);

            for specifier in syntax.references(&source) {
                let Some(specifier) = local_specifier(&specifier, syntax) else {
                    continue;
                };
                let resolved = resolve_reference(root, &current, specifier, &extensions)?;
                if seen.insert(resolved.clone()) {
                    tracing::trace!(from = %current.display(), to = %resolved.display(), "discovered");
                    queue.push_back(resolved.clone());
                    files.push(SourceFile::new(resolved));
                }
            }
        }

        tracing::debug!(files = files.len(), "module graph discovered");
        Ok(files)
    }
}

/// Every visible file below the entries' directories.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectoryWalk;

#[async_trait]
impl Discoverer for DirectoryWalk {
    async fn discover(&self, root: &Path, config: &Configuration) -> Result<Vec<SourceFile>> {
        let entries = entry_files(root, config)?;
        let root = root.to_path_buf();
        let out_dir = root.join(&config.output.dir).clean();
        let mut dirs: Vec<PathBuf> = Vec::new();
        for entry in &entries {
            let dir = entry.path.parent().map(Path::to_path_buf).unwrap_or_default();
            if !dirs.iter().any(|known| dir.starts_with(known)) {
                dirs.retain(|known| !known.starts_with(&dir));
                dirs.push(dir);
            }
        }

        let walked = tokio::task::spawn_blocking(move || walk(&root, &dirs, &out_dir))
            .await
            .map_err(|e| Error::Io(std::io::Error::other(format!("directory walk failed: {e}"))))??;

        let mut seen: FxHashSet<PathBuf> = entries.iter().map(|f| f.path.clone()).collect();
        let mut files = entries;
        files.extend(
            walked
                .into_iter()
                .filter(|path| seen.insert(path.clone()))
                .map(SourceFile::new),
        );

        tracing::debug!(files = files.len(), "directory walk discovered");
        Ok(files)
    }
}

fn walk(root: &Path, dirs: &[PathBuf], out_dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for dir in dirs {
        let walker = WalkDir::new(root.join(dir))
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|entry| {
                let name = entry.file_name().to_string_lossy();
                let hidden = entry.depth() > 0 && name.starts_with('.');
                !hidden && name != "node_modules" && entry.path() != out_dir
            });

        for entry in walker {
            let entry = entry.map_err(|e| Error::Discovery {
                file: dir.clone(),
                message: e.to_string(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if let Ok(relative) = entry.path().strip_prefix(root) {
                files.push(relative.to_path_buf());
            }
        }
    }
    Ok(files)
}

/// Reference syntax of a scanned file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Syntax {
    Script,
    Style,
    Markup,
    /// Single-file components carry all three
    Component,
}

static SCRIPT_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:\bfrom\s*|\bimport\s*\(?\s*|\brequire\s*\(\s*)['"]([^'"\r\n]+)['"]"#)
        .expect("valid script reference pattern")
});

static STYLE_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"(?:@import\s+(?:url\(\s*)?|\burl\(\s*)['"]?([^'"\s)]+)"#)
        .expect("valid style reference pattern")
});

static MARKUP_REFERENCE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r#"\b(?:src|href)\s*=\s*['"]([^'"]+)['"]"#)
        .expect("valid markup reference pattern")
});

impl Syntax {
    fn of(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "js" | "mjs" | "cjs" | "jsx" | "ts" | "tsx" => Some(Syntax::Script),
            "css" | "scss" | "sass" | "less" => Some(Syntax::Style),
            "html" | "htm" => Some(Syntax::Markup),
            "vue" | "svelte" => Some(Syntax::Component),
            _ => None,
        }
    }

    fn patterns(self) -> Vec<&'static Regex> {
        match self {
            Syntax::Script => vec![&*SCRIPT_REFERENCE],
            Syntax::Style => vec![&*STYLE_REFERENCE],
            Syntax::Markup => vec![&*MARKUP_REFERENCE],
            Syntax::Component => vec![&*SCRIPT_REFERENCE, &*STYLE_REFERENCE, &*MARKUP_REFERENCE],
        }
    }

    fn references(self, source: &str) -> Vec<String> {
        self.patterns()
            .into_iter()
            .flat_map(|pattern| pattern.captures_iter(source))
            .filter_map(|caps| caps.get(1).map(|m| m.as_str().trim().to_string()))
            .collect()
    }
}

/// The local part of a specifier, or `None` if it is not a project file.
fn local_specifier(specifier: &str, syntax: Syntax) -> Option<&str> {
    // Preprocessor expressions (`$var`, `@var`, `#{...}`, `var(--x)`) resolve at compile time
    if specifier.starts_with(['$', '@']) || specifier.starts_with("var(") || specifier.contains("#{") {
        return None;
    }

    let specifier = specifier.split(['?', '#']).next().unwrap_or_default();
    if specifier.is_empty()
        || specifier.starts_with('/')
        || specifier.starts_with('~')
        || specifier.starts_with("data:")
        || specifier.contains(':')
    {
        return None;
    }

    let explicit = specifier.starts_with("./") || specifier.starts_with("../");
    match syntax {
        // Bare specifiers in scripts name packages
        Syntax::Script | Syntax::Component => explicit.then_some(specifier),
        Syntax::Style | Syntax::Markup => Some(specifier),
    }
}

/// Resolve `specifier` relative to `from`: as written, then with each
/// extension appended, then as a directory `index` file. Stylesheets also try
/// their own extension and the `_name` partial form.
fn resolve_reference(root: &Path, from: &Path, specifier: &str, extensions: &[String]) -> Result<PathBuf> {
    let base = from.parent().unwrap_or(Path::new(""));
    let candidate = contained(&base.join(specifier)).ok_or_else(|| Error::Discovery {
        file: from.to_path_buf(),
        message: format!("`{specifier}` escapes the project root"),
    })?;

    if root.join(&candidate).is_file() {
        return Ok(candidate);
    }

    let mut extensions = extensions.to_vec();
    let mut stems = vec![candidate.clone()];
    if Syntax::of(from) == Some(Syntax::Style) {
        if let Some(own) = from.extension().and_then(|ext| ext.to_str()) {
            let own = format!(".{own}");
            if !extensions.contains(&own) {
                extensions.push(own);
            }
        }
        if let Some(name) = candidate.file_name().and_then(|name| name.to_str()) {
            stems.push(candidate.with_file_name(format!("_{name}")));
        }
    }

    let with_extension = stems.iter().flat_map(|stem| {
        extensions.iter().map(move |ext| {
            let mut name = stem.clone().into_os_string();
            name.push(ext);
            PathBuf::from(name)
        })
    });
    let index = extensions.iter().map(|ext| candidate.join(format!("index{ext}")));

    with_extension
        .chain(index)
        .find(|path| root.join(path).is_file())
        .ok_or_else(|| Error::Discovery {
            file: from.to_path_buf(),
            message: format!("cannot resolve `{specifier}`"),
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn script_references_cover_import_forms() {
        let source = r#"
            import Vue from 'vue';
            import App from "./App.vue";
            import './styles/site.scss';
            export { x } from '../lib/x';
            const lazy = () => import('./lazy');
            const cfg = require("./config.json");
        "#;
        let refs = Syntax::Script.references(source);
        assert_eq!(
            refs,
            vec!["vue", "./App.vue", "./styles/site.scss", "../lib/x", "./lazy", "./config.json"]
        );
    }

    #[test]
    fn style_references_cover_import_and_url() {
        let source = r#"
            @import "variables";
            @import url('./fonts.css');
            .logo { background: url(../img/logo.png?v=2); }
            .data { background: url("data:image/png;base64,AAAA"); }
        "#;
        let refs = Syntax::Style.references(source);
        assert!(refs.contains(&"variables".to_string()));
        assert!(refs.contains(&"./fonts.css".to_string()));
        assert!(refs.contains(&"../img/logo.png?v=2".to_string()));
    }

    #[test]
    fn preprocessor_expressions_are_not_files() {
        let source = r##"
            .a { background: url($base + '/x.png'); }
            .b { background: url(@img-root); }
            .c { background: url("#{$cdn}/y.png"); }
            .d { background: url(var(--hero)); }
            .e { background: url(./real.png); }
        "##;
        let locals: Vec<String> = Syntax::Style
            .references(source)
            .iter()
            .filter_map(|specifier| local_specifier(specifier, Syntax::Style).map(str::to_string))
            .collect();
        assert_eq!(locals, vec!["./real.png".to_string()]);

        for specifier in ["$base", "@img-root", "#{$cdn}/y.png", "img/#{$name}.png", "var(--hero)"] {
            assert_eq!(local_specifier(specifier, Syntax::Style), None, "{specifier}");
        }
    }

    #[test]
    fn bare_script_specifiers_are_packages() {
        assert_eq!(local_specifier("vue", Syntax::Script), None);
        assert_eq!(local_specifier("./App.vue", Syntax::Script), Some("./App.vue"));
        assert_eq!(local_specifier("variables", Syntax::Style), Some("variables"));
    }

    #[test]
    fn external_specifiers_are_skipped() {
        for specifier in ["https://cdn/x.js", "//cdn/x.js", "/abs.png", "#frag", "data:x", "~pkg/a.scss"] {
            assert_eq!(local_specifier(specifier, Syntax::Style), None, "{specifier}");
        }
        assert_eq!(local_specifier("../img/a.png?v=2#x", Syntax::Style), Some("../img/a.png"));
    }
}
