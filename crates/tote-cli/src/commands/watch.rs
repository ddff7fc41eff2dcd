//! `tote build --watch`: rebuild whenever a project file changes.
//!
//! Changes under the output and upload directories, `node_modules` and hidden paths are
//! ignored. Bursts of events are debounced into one rebuild, and a rebuild
//! only starts after the previous one finished.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use parking_lot::RwLock;
use tokio::sync::mpsc;

use tote_config::PluginRef;

use super::Session;
use crate::error::{CliError, Result, cli_error_to_miette};
use crate::ui;

const DEBOUNCE: Duration = Duration::from_millis(150);
const IGNORED_DIRS: &[&str] = &["node_modules"];

/// Recursive watcher on the project root.
pub struct FileWatcher {
    _watcher: RecommendedWatcher,
    ignored: Arc<RwLock<Vec<PathBuf>>>,
}

impl FileWatcher {
    /// Start watching `root`; relevant changed paths arrive on the receiver.
    pub fn new(root: &Path) -> Result<(Self, mpsc::Receiver<PathBuf>)> {
        let root = root.canonicalize()?;
        let ignored = Arc::new(RwLock::new(Vec::new()));
        let (tx, rx) = mpsc::channel(256);

        let filter_root = root.clone();
        let filter_ignored = Arc::clone(&ignored);
        let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| {
            let event = match res {
                Ok(event) => event,
                Err(e) => {
                    tracing::warn!(error = %e, "watch error");
                    return;
                }
            };
            if !matches!(
                event.kind,
                EventKind::Create(_) | EventKind::Modify(_) | EventKind::Remove(_)
            ) {
                return;
            }
            let ignored = filter_ignored.read();
            for path in event.paths {
                if should_ignore(&path, &filter_root, &ignored) {
                    continue;
                }
                // A full channel already holds a pending rebuild.
                let _ = tx.try_send(path);
            }
        })?;
        watcher.watch(&root, RecursiveMode::Recursive)?;

        Ok((
            Self {
                _watcher: watcher,
                ignored,
            },
            rx,
        ))
    }

    /// Replace the ignored directories (the output directory may move between builds).
    pub fn set_ignored(&self, dirs: Vec<PathBuf>) {
        *self.ignored.write() = dirs;
    }
}

fn should_ignore(path: &Path, root: &Path, ignored: &[PathBuf]) -> bool {
    let Ok(relative) = path.strip_prefix(root) else {
        return true;
    };
    if ignored.iter().any(|dir| path.starts_with(dir)) {
        return true;
    }
    relative.components().any(|component| {
        let name = component.as_os_str().to_string_lossy();
        (name.starts_with('.') && name != "." && name != "..") || IGNORED_DIRS.contains(&name.as_ref())
    })
}

/// Build, then rebuild on every relevant change until Ctrl-C.
pub async fn run(session: Session, quiet: bool) -> Result<()> {
    let (watcher, mut changes) = FileWatcher::new(session.root())?;

    rebuild(&session, &watcher, quiet).await;
    ui::info(&format!("Watching {} for changes (Ctrl-C to stop)", session.root().display()));

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => {
                ui::info("Stopping watch mode");
                return Ok(());
            }
            change = changes.recv() => {
                let Some(path) = change else {
                    return Ok(());
                };
                tokio::time::sleep(DEBOUNCE).await;
                let mut pending = 1;
                while changes.try_recv().is_ok() {
                    pending += 1;
                }
                tracing::debug!(path = %path.display(), pending, "change detected");
                rebuild(&session, &watcher, quiet).await;
            }
        }
    }
}

async fn rebuild(session: &Session, watcher: &FileWatcher, quiet: bool) {
    match session.resolve() {
        Ok(resolved) => {
            let mut outputs = vec![resolved.out_dir.clone()];
            outputs.extend(upload_dir(&resolved.root, &resolved.config.plugins));
            watcher.set_ignored(ignored_dirs(&outputs));
        }
        Err(error) => {
            print_failure(error);
            return;
        }
    }

    match session.build().await {
        Ok(report) if !quiet => ui::success(&format!(
            "Rebuilt {} files in {}",
            report.manifest.len(),
            ui::format_duration(report.duration)
        )),
        Ok(_) => {}
        Err(error) => print_failure(error),
    }
}

/// Where the `upload` plugin copies files, when it is enabled.
fn upload_dir(root: &Path, plugins: &[PluginRef]) -> Option<PathBuf> {
    let options = &plugins.iter().find(|plugin| plugin.name == "upload")?.options;
    let target = root.join(options.get("target")?.as_str()?);
    match options.get("server_dir").and_then(|dir| dir.as_str()) {
        Some(dir) => Some(target.join(dir)),
        None => Some(target),
    }
}

/// Every written directory, plus its canonical form so it matches watcher paths.
fn ignored_dirs(outputs: &[PathBuf]) -> Vec<PathBuf> {
    let mut dirs = Vec::with_capacity(outputs.len() * 2);
    for dir in outputs {
        dirs.push(dir.clone());
        match dir.canonicalize() {
            Ok(canonical) if canonical != *dir => dirs.push(canonical),
            _ => {}
        }
    }
    dirs
}

fn print_failure(error: CliError) {
    ui::error("Build failed; waiting for changes");
    eprintln!("{:?}", cli_error_to_miette(error));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_output_node_modules_and_hidden() {
        let root = PathBuf::from("/project");
        let ignored = vec![PathBuf::from("/project/build")];

        assert!(should_ignore(Path::new("/project/build/app.js"), &root, &ignored));
        assert!(should_ignore(Path::new("/project/node_modules/x/index.js"), &root, &ignored));
        assert!(should_ignore(Path::new("/project/.git/HEAD"), &root, &ignored));
        assert!(should_ignore(Path::new("/elsewhere/a.js"), &root, &ignored));
        assert!(!should_ignore(Path::new("/project/src/app.js"), &root, &ignored));
        assert!(!should_ignore(Path::new("/project/tote.toml"), &root, &ignored));
    }

    #[test]
    fn output_dir_is_ignored_in_both_forms() {
        let dir = tempfile::TempDir::new().unwrap();
        let dirs = ignored_dirs(&[dir.path().to_path_buf()]);
        assert_eq!(dirs[0], dir.path());
        assert!(dirs.iter().any(|d| *d == dir.path().canonicalize().unwrap()));
    }

    #[test]
    fn upload_destination_is_ignored() {
        let root = PathBuf::from("/project");
        let upload = PluginRef::new("upload")
            .with_options(serde_json::json!({ "target": "deploy", "server_dir": "shop" }));
        let plugins = vec![PluginRef::new("clean"), upload];

        let dest = upload_dir(&root, &plugins).unwrap();
        assert_eq!(dest, PathBuf::from("/project/deploy/shop"));

        let ignored = ignored_dirs(&[root.join("build"), dest]);
        assert!(should_ignore(Path::new("/project/deploy/shop/app.js"), &root, &ignored));
        assert!(!should_ignore(Path::new("/project/deploy/readme.txt"), &root, &ignored));
        assert!(!should_ignore(Path::new("/project/src/app.js"), &root, &ignored));
    }

    #[test]
    fn no_upload_plugin_means_no_upload_dir() {
        let root = PathBuf::from("/project");
        assert_eq!(upload_dir(&root, &[PluginRef::new("clean")]), None);
        let missing_target = PluginRef::new("upload").with_options(serde_json::json!({}));
        assert_eq!(upload_dir(&root, &[missing_target]), None);
    }
}
