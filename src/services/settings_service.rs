use tracing::info;
use validator::Validate;

use crate::{
    config::{Settings, SettingsUpdate},
    error::ServiceError,
    services::{broadcast::broadcast_state, song_watcher},
    state::{KaraokeState, SharedState},
};

/// Settings currently in effect.
pub async fn current(state: &SharedState) -> Settings {
    state.settings().read().await.clone()
}

/// Merge `update` into the current settings, persist them and push them to the session.
///
/// A changed search path triggers a library rescan and moves the folder
/// watcher. Port changes only take effect after a restart.
pub async fn update(state: &SharedState, update: SettingsUpdate) -> Result<Settings, ServiceError> {
    let mut guard = state.settings().write().await;
    let next = update.merge_into(&guard);
    next.validate()?;
    next.save(state.paths().config_file()).await?;

    let search_path_changed = next.search_path != guard.search_path;
    if next.lan_port != guard.lan_port || next.remote_port != guard.remote_port {
        info!(
            karaoke_port = next.lan_port,
            remote_port = next.remote_port,
            "port change saved; restart to apply"
        );
    }
    *guard = next.clone();
    drop(guard);

    apply_settings(state.karaoke(), &next).await;
    if search_path_changed {
        rescan(state).await;
        song_watcher::restart(state).await;
    }
    broadcast_state(state, None);
    Ok(next)
}

/// Copy every setting into the karaoke session.
pub async fn apply_settings(karaoke: &KaraokeState, settings: &Settings) {
    karaoke
        .set_idle_background_path(settings.background_path.clone())
        .await;
    karaoke.set_idle_mode(settings.idle_mode).await;
    karaoke
        .set_idle_video_files(settings.idle_video_files.clone())
        .await;
    karaoke.set_looping_music_enabled(settings.looping_music).await;
    karaoke
        .set_looping_music_files(settings.music_files.clone())
        .await;
    karaoke.set_custom_font_path(settings.custom_font.clone()).await;
    karaoke.set_announce_keys(settings.announce_keys).await;
    karaoke.set_view_mode(settings.view_mode).await;
    karaoke.set_window_size(settings.window_size).await;
    karaoke.set_karaoke_port(settings.lan_port).await;
    karaoke.set_remote_port(settings.remote_port).await;
    karaoke.set_search_path(settings.search_path.clone()).await;
}

/// Rebuild the song library from the configured folders. Returns the song count.
pub async fn rescan(state: &SharedState) -> usize {
    let roots = state.settings().read().await.song_roots(state.paths());
    state.library().scan(roots).await
}
