//! Path helpers shared by discovery, matching and emission.
//!
//! Inside the pipeline every source path is relative to the project root and
//! compared component-wise; `/`-separated strings only appear at the edges
//! (rule patterns, templates, manifest keys).

use std::io;
use std::path::{Component, Path, PathBuf};

use path_clean::PathClean;

/// Render a path with `/` separators regardless of platform.
pub fn to_slash(path: &Path) -> String {
    path.components()
        .filter_map(|component| match component {
            Component::Normal(part) => Some(part.to_string_lossy().into_owned()),
            Component::ParentDir => Some("..".to_string()),
            _ => None,
        })
        .collect::<Vec<_>>()
        .join("/")
}

/// Resolve `path` against the current directory and clean it.
pub fn absolutize(path: &Path) -> io::Result<PathBuf> {
    if path.is_absolute() {
        Ok(path.clean())
    } else {
        Ok(std::env::current_dir()?.join(path).clean())
    }
}

/// Clean a path that must stay below its base (no leading `..`, not absolute).
///
/// Returns `None` if the cleaned path escapes.
pub fn contained(path: &Path) -> Option<PathBuf> {
    let cleaned = path.clean();
    if cleaned.is_absolute() || cleaned.starts_with("..") {
        return None;
    }
    Some(cleaned)
}

/// `dir/` for a file's parent directory, empty for files at the root.
pub fn parent_dir_slash(path: &Path) -> String {
    match path.parent().map(to_slash) {
        Some(dir) if !dir.is_empty() => format!("{dir}/"),
        _ => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slash_form_drops_curdir() {
        assert_eq!(to_slash(Path::new("./src/styles/x.scss")), "src/styles/x.scss");
    }

    #[test]
    fn contained_rejects_escapes() {
        assert_eq!(contained(Path::new("./src/../lib/a.js")), Some(PathBuf::from("lib/a.js")));
        assert_eq!(contained(Path::new("src/../../etc/passwd")), None);
        assert_eq!(contained(Path::new("/etc/passwd")), None);
    }

    #[test]
    fn parent_dir_is_slash_terminated() {
        assert_eq!(parent_dir_slash(Path::new("src/styles/x.scss")), "src/styles/");
        assert_eq!(parent_dir_slash(Path::new("README.md")), "");
    }
}
