//! Re-indexes the song library when videos show up in the watched folders.
//!
//! File events arrive on the watcher's own thread and are forwarded to a
//! Tokio task that waits for the folders to go quiet before rescanning, so a
//! long copy or a batch of downloads costs a single scan.

use std::{
    path::{Path, PathBuf},
    sync::{Arc, Weak},
    time::Duration,
};

use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::{sync::mpsc, time::timeout};
use tracing::{debug, info, warn};

use crate::{
    dao::library::{SongLibrary, is_song_file},
    services::settings_service,
    state::{AppState, SharedState},
};

/// Quiet period after the last file event before the library is rescanned.
pub const WATCH_DEBOUNCE: Duration = Duration::from_secs(1);

/// Running folder watcher. Dropping it stops watching.
pub struct SongWatcher {
    _watcher: RecommendedWatcher,
    roots: Vec<PathBuf>,
}

impl SongWatcher {
    /// Watch the existing folders among `roots`, rescanning after `debounce` of quiet.
    ///
    /// Returns `None` when no folder can be watched.
    pub fn start(state: &SharedState, roots: Vec<PathBuf>, debounce: Duration) -> Option<Self> {
        let roots: Vec<PathBuf> = roots.into_iter().filter(|root| root.is_dir()).collect();
        if roots.is_empty() {
            warn!("no song folder to watch; song watching disabled");
            return None;
        }

        let (tx, rx) = mpsc::unbounded_channel();
        let library = state.library().clone();
        let handler = move |result: notify::Result<Event>| match result {
            Ok(event) => {
                if matches!(event.kind, EventKind::Access(_)) {
                    return;
                }
                for path in event.paths {
                    if needs_rescan(&path, &library) {
                        let _ = tx.send(path);
                    }
                }
            }
            Err(err) => warn!(error = %err, "song folder watch error"),
        };

        let mut watcher = match notify::recommended_watcher(handler) {
            Ok(watcher) => watcher,
            Err(err) => {
                warn!(error = %err, "failed to create song folder watcher");
                return None;
            }
        };
        for root in &roots {
            if let Err(err) = watcher.watch(root, RecursiveMode::Recursive) {
                warn!(path = %root.display(), error = %err, "failed to watch song folder");
            }
        }

        tokio::spawn(rescan_when_quiet(Arc::downgrade(state), rx, debounce));
        info!(roots = ?roots, "watching song folders");
        Some(Self {
            _watcher: watcher,
            roots,
        })
    }

    /// Folders being watched.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }
}

/// Stop the current watcher and watch the folders of the current settings.
pub async fn restart(state: &SharedState) {
    let roots = state.settings().read().await.song_roots(state.paths());
    state.set_song_watcher(None);
    state.set_song_watcher(SongWatcher::start(state, roots, WATCH_DEBOUNCE));
}

/// Stop watching.
pub fn stop(state: &SharedState) {
    if state.set_song_watcher(None) {
        info!("song folder watching stopped");
    }
}

/// A visible song file that is not indexed yet.
fn needs_rescan(path: &Path, library: &SongLibrary) -> bool {
    let hidden = path
        .file_name()
        .is_some_and(|name| name.to_string_lossy().starts_with('.'));
    !hidden && is_song_file(path) && !library.contains_path(path)
}

async fn rescan_when_quiet(
    state: Weak<AppState>,
    mut events: mpsc::UnboundedReceiver<PathBuf>,
    quiet: Duration,
) {
    while let Some(path) = events.recv().await {
        debug!(path = %path.display(), "song file event");
        loop {
            match timeout(quiet, events.recv()).await {
                Ok(Some(path)) => debug!(path = %path.display(), "song file event"),
                // Watcher dropped.
                Ok(None) => return,
                Err(_) => break,
            }
        }

        let Some(state) = state.upgrade() else {
            return;
        };
        let songs = settings_service::rescan(&state).await;
        info!(songs, "song library re-indexed after folder change");
    }
    debug!("song watcher task stopped");
}
