//! Shared application state: the serialized karaoke session, the song
//! library, connected sockets and the shutdown signal.

mod clients;
mod commands;
/// Session model, instance identity and defaults.
pub mod karaoke;
mod persistence;
mod queue;
mod serializer;
/// Idle and karaoke playback transitions.
pub mod state_machine;

use std::sync::{Arc, Mutex, PoisonError};

use tokio::sync::{RwLock, watch};

use crate::{
    config::{DataPaths, Settings},
    dao::{instance_lock::InstanceLock, library::SongLibrary, state_store::JsonFileStore},
    services::{playback_service::AdvanceGate, song_watcher::SongWatcher},
    state::karaoke::InstanceIdentity,
};

pub use self::clients::{ClientKind, ClientRegistry};
pub use self::serializer::KaraokeState;

/// Handle to the application state shared by every route and task.
pub type SharedState = Arc<AppState>;

/// Central application state shared by the three servers.
pub struct AppState {
    karaoke: KaraokeState,
    library: Arc<SongLibrary>,
    clients: ClientRegistry,
    advance: AdvanceGate,
    settings: RwLock<Settings>,
    paths: DataPaths,
    shutdown: watch::Sender<bool>,
    song_watcher: Mutex<Option<SongWatcher>>,
}

impl AppState {
    /// Build the state backed by the files under `paths`.
    ///
    /// Spawns the serializer tasks, so it must run inside a Tokio runtime.
    pub fn new(paths: DataPaths, settings: Settings) -> SharedState {
        let identity = InstanceIdentity::generate();
        let store = Arc::new(JsonFileStore::new(paths.state_file()));
        let lock = InstanceLock::new(paths.lock_file(), identity.instance_id.clone());
        let karaoke = KaraokeState::spawn(identity, store, lock);
        let library = Arc::new(SongLibrary::new(paths.song_index()));
        Self::with_parts(paths, settings, karaoke, library)
    }

    /// Assemble the state from already built parts.
    pub fn with_parts(
        paths: DataPaths,
        settings: Settings,
        karaoke: KaraokeState,
        library: Arc<SongLibrary>,
    ) -> SharedState {
        let (shutdown, _rx) = watch::channel(false);
        Arc::new(Self {
            karaoke,
            library,
            clients: ClientRegistry::new(),
            advance: AdvanceGate::default(),
            settings: RwLock::new(settings),
            paths,
            shutdown,
            song_watcher: Mutex::new(None),
        })
    }

    /// Serialized karaoke session.
    pub fn karaoke(&self) -> &KaraokeState {
        &self.karaoke
    }

    /// Indexed songs.
    pub fn library(&self) -> &Arc<SongLibrary> {
        &self.library
    }

    /// Registry of sockets on the karaoke and remote servers.
    pub fn clients(&self) -> &ClientRegistry {
        &self.clients
    }

    /// Guard that keeps "play next" from running twice at once.
    pub fn advance_gate(&self) -> &AdvanceGate {
        &self.advance
    }

    /// Current persisted settings.
    pub fn settings(&self) -> &RwLock<Settings> {
        &self.settings
    }

    /// On-disk layout of the data directory.
    pub fn paths(&self) -> &DataPaths {
        &self.paths
    }

    /// Install `watcher` in place of the running one, dropping it. Returns
    /// whether a watcher was running before.
    pub fn set_song_watcher(&self, watcher: Option<SongWatcher>) -> bool {
        let previous = std::mem::replace(
            &mut *self
                .song_watcher
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            watcher,
        );
        previous.is_some()
    }

    /// Whether the song folders are being watched.
    pub fn is_watching_songs(&self) -> bool {
        self.song_watcher
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Ask every server to stop accepting work.
    pub fn request_shutdown(&self) {
        self.shutdown.send_replace(true);
    }

    /// Resolve once a shutdown has been requested.
    pub async fn shutdown_requested(&self) {
        let mut rx = self.shutdown.subscribe();
        let _ = rx.wait_for(|requested| *requested).await;
    }
}
