//! Atomic file writing for build output.
//!
//! - **Path validation**: output paths are cleaned and must stay inside the output directory
//! - **Two-phase writes**: every file goes to a `.tote-tmp` sibling first, then all are renamed
//! - **Rollback**: if any write fails, every temporary written so far is removed
//!
//! `rename()` is atomic on the same filesystem, so a reader sees either the
//! previous file or the complete new one.

use std::fs;
use std::path::{Path, PathBuf};

use path_clean::PathClean;

use crate::error::{Error, Result};

const TEMP_SUFFIX: &str = ".tote-tmp";

/// Join `relative` onto `out_dir`, rejecting anything that escapes it.
///
/// Catches `../../etc/passwd`, absolute paths, `css/../../x` and embedded NUL bytes.
pub fn validate_output_path(out_dir: &Path, relative: &str) -> Result<PathBuf> {
    if relative.contains('\0') {
        return Err(Error::InvalidOutputPath(format!("`{}` contains a NUL byte", relative.escape_default())));
    }

    let cleaned = Path::new(relative).clean();
    if cleaned.is_absolute() {
        return Err(Error::InvalidOutputPath(format!("`{relative}` is absolute")));
    }

    let target = out_dir.join(&cleaned).clean();
    if target == out_dir || !target.starts_with(out_dir) {
        return Err(Error::InvalidOutputPath(format!(
            "`{relative}` resolves to {}, outside {}",
            target.display(),
            out_dir.display()
        )));
    }

    Ok(target)
}

/// Temporary sibling used while `target` is being written.
pub fn temp_path_for(target: &Path) -> PathBuf {
    let mut name = target.as_os_str().to_os_string();
    name.push(TEMP_SUFFIX);
    PathBuf::from(name)
}

/// Write every `(path, content)` pair or none of them.
pub fn write_files_atomic(operations: &[(PathBuf, &[u8])]) -> Result<()> {
    let mut temp_files = Vec::with_capacity(operations.len());

    // Phase 1: Write to temporary files
    for (target_path, content) in operations {
        if let Some(parent) = target_path.parent() {
            fs::create_dir_all(parent).map_err(|cause| {
                cleanup_temp_files(&temp_files);
                Error::Emit {
                    path: parent.to_path_buf(),
                    cause,
                }
            })?;
        }

        let temp_path = temp_path_for(target_path);
        fs::write(&temp_path, content).map_err(|cause| {
            cleanup_temp_files(&temp_files);
            // The failed write may have left a partial file behind
            let _ = fs::remove_file(&temp_path);
            Error::Emit {
                path: target_path.clone(),
                cause,
            }
        })?;

        temp_files.push((temp_path, target_path.clone()));
    }

    // Phase 2: Rename temp files to final names
    for (temp_path, target_path) in &temp_files {
        fs::rename(temp_path, target_path).map_err(|cause| {
            cleanup_temp_files(&temp_files);
            Error::Emit {
                path: target_path.clone(),
                cause,
            }
        })?;
    }

    Ok(())
}

/// Write a single file through a temporary sibling.
pub fn write_atomic(target: &Path, content: &[u8]) -> Result<()> {
    write_files_atomic(&[(target.to_path_buf(), content)])
}

/// Best-effort cleanup; we're already in an error state.
fn cleanup_temp_files(temp_files: &[(PathBuf, PathBuf)]) {
    for (temp_path, _) in temp_files {
        if temp_path.exists() {
            if let Err(e) = fs::remove_file(temp_path) {
                tracing::warn!(
                    path = %temp_path.display(),
                    error = %e,
                    "failed to clean up temporary file"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_paths_inside_the_output_dir() {
        let out = Path::new("/srv/shop/build");
        for (relative, expected) in [
            ("index.html", "/srv/shop/build/index.html"),
            ("css/site.css", "/srv/shop/build/css/site.css"),
            ("./js/app.js", "/srv/shop/build/js/app.js"),
            ("img/../img/logo.png", "/srv/shop/build/img/logo.png"),
        ] {
            assert_eq!(validate_output_path(out, relative).unwrap(), Path::new(expected));
        }
    }

    #[test]
    fn rejects_escaping_paths() {
        let out = Path::new("/srv/shop/build");
        for relative in ["../manifest.json", "css/../../../etc/passwd", "/etc/passwd", "a\0b.js", ".", ""] {
            assert!(
                matches!(validate_output_path(out, relative), Err(Error::InvalidOutputPath(_))),
                "{relative:?} should be rejected"
            );
        }
    }

    #[test]
    fn temp_path_keeps_the_extension() {
        assert_eq!(
            temp_path_for(Path::new("/out/app.js")),
            PathBuf::from("/out/app.js.tote-tmp")
        );
    }

    #[test]
    fn batch_creates_parent_directories() {
        let dir = tempfile::TempDir::new().unwrap();
        let css = dir.path().join("css/site.css");
        let js = dir.path().join("js/vendor/lib.js");
        write_files_atomic(&[(css.clone(), &b"body{}"[..]), (js.clone(), &b"x()"[..])]).unwrap();

        assert_eq!(fs::read(&css).unwrap(), b"body{}");
        assert_eq!(fs::read(&js).unwrap(), b"x()");
        assert!(!temp_path_for(&css).exists());
    }

    #[test]
    fn failed_batch_leaves_no_temporaries() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("blocked");
        fs::write(&blocker, b"file, not a directory").unwrap();

        let ok = dir.path().join("a.js");
        let bad = blocker.join("b.js");
        let result = write_files_atomic(&[(ok.clone(), &b"a"[..]), (bad, &b"b"[..])]);

        assert!(matches!(result, Err(Error::Emit { .. })));
        assert!(!ok.exists());
        assert!(!temp_path_for(&ok).exists());
    }
}
