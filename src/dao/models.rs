//! Records persisted to disk.

use serde::{Deserialize, Serialize};

use crate::state::{
    karaoke::{
        HistoryEntry, IdleMode, InstanceIdentity, KaraokeSession, Song, ViewMode, WindowSize,
    },
    state_machine::PlaybackState,
};

/// On-disk snapshot of the karaoke session (`karaoke-state.json`).
///
/// Every field has a default so older or partial files still load.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase", default)]
pub struct PersistedState {
    /// Digits typed when the snapshot was taken.
    pub current_code: String,
    /// Queued codes, head first.
    pub code_queue: Vec<String>,
    /// Played songs, oldest first.
    pub queue_history: Vec<HistoryEntry>,
    /// Playback mode; reset to idle on load.
    pub state: PlaybackState,
    /// Song that was playing, if any.
    pub current_song: Option<Song>,
    /// Idle background image.
    pub idle_background_path: String,
    /// Idle background kind.
    pub idle_mode: IdleMode,
    /// Idle videos.
    pub idle_video_files: Vec<String>,
    /// Idle music toggle.
    pub looping_music_enabled: bool,
    /// Idle music tracks.
    pub looping_music_files: Vec<String>,
    /// Display font.
    pub custom_font_path: String,
    /// Digit announcements toggle.
    pub announce_keys: bool,
    /// Window style.
    pub view_mode: ViewMode,
    /// Windowed-mode size.
    pub window_size: WindowSize,
    /// Karaoke server port.
    pub karaoke_port: u16,
    /// Remote server port.
    pub remote_port: u16,
    /// Song search folder.
    pub search_path: String,
    /// Epoch milliseconds of the write.
    pub last_update: u64,
    /// Instance that wrote the file; empty for files written by older versions.
    pub instance_id: String,
    /// Pairing signature of the writer.
    pub current_signature: String,
}

impl Default for PersistedState {
    fn default() -> Self {
        Self::capture(
            &KaraokeSession::default(),
            &InstanceIdentity {
                instance_id: String::new(),
                signature: String::new(),
            },
            0,
        )
    }
}

impl PersistedState {
    /// Snapshot `session` as written by `identity` at `now` (epoch millis).
    pub fn capture(session: &KaraokeSession, identity: &InstanceIdentity, now: u64) -> Self {
        Self {
            current_code: session.current_code.clone(),
            code_queue: session.queue.to_vec(),
            queue_history: session.history.to_vec(),
            state: session.playback.state(),
            current_song: session.playback.current_song().cloned(),
            idle_background_path: session.idle.background_path.clone(),
            idle_mode: session.idle.mode,
            idle_video_files: session.idle.video_files.clone(),
            looping_music_enabled: session.idle.looping_music_enabled,
            looping_music_files: session.idle.looping_music_files.clone(),
            custom_font_path: session.idle.custom_font_path.clone(),
            announce_keys: session.idle.announce_keys,
            view_mode: session.presentation.view_mode,
            window_size: session.presentation.window_size,
            karaoke_port: session.network.karaoke_port,
            remote_port: session.network.remote_port,
            search_path: session.network.search_path.clone(),
            last_update: now,
            instance_id: identity.instance_id.clone(),
            current_signature: identity.signature.clone(),
        }
    }
}

/// Contents of the single-instance lock file (`karaoke.lock`).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct LockRecord {
    /// Owner of the lock.
    pub instance_id: String,
    /// Epoch milliseconds of the last heartbeat.
    pub timestamp: u64,
    /// Process id of the owner, for diagnostics.
    pub pid: u32,
}
