//! Config file watcher.

use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};

use super::{ConfigError, ConfigStore};

/// Quiet period after the first event before the file is re-read. Editors
/// tend to write a file in several steps.
const DEBOUNCE: Duration = Duration::from_millis(100);

/// Handle to a running config watcher.
pub struct ConfigWatcherHandle {
    /// The watcher itself (keep alive to continue watching).
    _watcher: RecommendedWatcher,
    /// Sender to signal shutdown.
    shutdown_tx: tokio::sync::oneshot::Sender<()>,
}

impl ConfigWatcherHandle {
    /// Stop the watcher.
    pub fn stop(self) {
        let _ = self.shutdown_tx.send(());
    }
}

/// Reconcile `store` against `path` whenever the file changes.
///
/// The parent directory is watched rather than the file, so editors that
/// save by writing a new file and renaming it over the old one are still
/// picked up. Reloads run one at a time on the blocking pool; a file that
/// fails to load is logged and the live config is kept.
///
/// Must be called from within a tokio runtime.
pub fn watch(store: Arc<ConfigStore>, path: impl Into<PathBuf>) -> Result<ConfigWatcherHandle, ConfigError> {
    let path = path.into();
    let file_name: OsString = path
        .file_name()
        .map(|name| name.to_os_string())
        .ok_or_else(|| ConfigError::Read {
            path: path.clone(),
            source: std::io::Error::new(std::io::ErrorKind::InvalidInput, "config path has no file name"),
        })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };

    let (tx, mut rx) = tokio::sync::mpsc::channel::<()>(16);

    let mut watcher = RecommendedWatcher::new(
        move |result: Result<Event, notify::Error>| match result {
            Ok(event) => {
                if !matches!(event.kind, EventKind::Create(_) | EventKind::Modify(_)) {
                    return;
                }
                let ours = event
                    .paths
                    .iter()
                    .any(|p| p.file_name() == Some(file_name.as_os_str()));
                if ours {
                    // A full channel already has a reload queued.
                    let _ = tx.try_send(());
                }
            }
            Err(e) => tracing::warn!(error = %e, "config watcher error"),
        },
        notify::Config::default(),
    )?;
    watcher.watch(&dir, RecursiveMode::NonRecursive)?;
    tracing::info!(path = %path.display(), "Watching config file");

    let (shutdown_tx, mut shutdown_rx) = tokio::sync::oneshot::channel();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = &mut shutdown_rx => {
                    tracing::info!("config watcher shutting down");
                    break;
                }
                received = rx.recv() => {
                    if received.is_none() {
                        break;
                    }
                    tokio::time::sleep(DEBOUNCE).await;
                    while rx.try_recv().is_ok() {}

                    reload(&store, &path).await;
                }
            }
        }
    });

    Ok(ConfigWatcherHandle {
        _watcher: watcher,
        shutdown_tx,
    })
}

async fn reload(store: &Arc<ConfigStore>, path: &Path) {
    let store = Arc::clone(store);
    let target = path.to_path_buf();
    match tokio::task::spawn_blocking(move || store.reload_from(&target)).await {
        Ok(Ok(changes)) => tracing::debug!(changes = changes.len(), "Config reconciled"),
        Ok(Err(e)) => tracing::warn!(path = %path.display(), error = %e, "Error reloading config"),
        Err(e) => tracing::warn!(error = %e, "config reload task failed"),
    }
}
