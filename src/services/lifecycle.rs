//! Startup and teardown of the karaoke host around the serving phase.

use tracing::{info, warn};

use crate::{
    error::StartupError,
    services::{
        settings_service::{self, apply_settings},
        song_watcher,
    },
    state::SharedState,
};

/// Take the instance lock, restore the saved session, build the song library
/// and start watching the song folders.
///
/// Fails only when another instance holds the lock; every other problem is
/// logged and the host starts with what it has.
pub async fn bootstrap(state: &SharedState) -> Result<(), StartupError> {
    let karaoke = state.karaoke();
    if !karaoke.check_single_instance().await {
        return Err(StartupError::AlreadyRunning(state.paths().lock_file()));
    }

    karaoke.load_state().await;
    // The settings file wins over whatever configuration the snapshot carried.
    let settings = settings_service::current(state).await;
    apply_settings(karaoke, &settings).await;

    let additional = state.paths().additional_songs();
    if let Err(err) = tokio::fs::create_dir_all(&additional).await {
        warn!(path = %additional.display(), error = %err, "failed to create additional songs folder");
    }

    if let Err(err) = state.library().load_cache().await {
        warn!(error = %err, "failed to load song index cache");
    }
    let songs = settings_service::rescan(state).await;
    song_watcher::restart(state).await;

    info!(
        instance_id = %karaoke.instance_id(),
        songs,
        queued = karaoke.code_queue().len(),
        "karaoke host ready"
    );
    Ok(())
}

/// Stop watching, close every socket, flush the session to disk and release the lock.
pub async fn shutdown(state: &SharedState) {
    song_watcher::stop(state);
    state.clients().close_all();
    state.karaoke().shutdown().await;
}
