use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{
    dto::format_epoch_millis,
    state::{
        karaoke::{HistoryEntry, IdleMode, Song},
        state_machine::PlaybackState,
    },
};

/// Messages pushed to karaoke display and remote control sockets.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ServerMessage {
    /// Full view of the session, sent after every state change.
    State(StatePayload),
    /// A song stopped playing.
    SongEnd(SongEndPayload),
    /// Playback command for the karaoke display.
    PlaybackControl(PlaybackControlPayload),
    /// Result of a library search.
    SongList(SongListPayload),
    /// Answer to a client heartbeat.
    Pong,
}

/// Session view shared by the display and the remotes.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatePayload {
    /// Typed code, left-padded with zeros to six digits.
    pub code: String,
    /// `Title - Artist` of the current or typed song, or a prompt.
    pub status: String,
    pub queue: Vec<String>,
    pub queue_history: Vec<HistoryEntrySummary>,
    /// Key that triggered this update (`0`-`9`, `delete`, `enter`), if any.
    pub last_digit: Option<String>,
    pub announce_keys: bool,
    pub background_type: IdleMode,
    pub state: PlaybackState,
    pub song_id: Option<String>,
}

/// Song as exposed to clients.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, ToSchema)]
pub struct SongSummary {
    pub id: String,
    pub title: String,
    pub artist: String,
    pub path: String,
}

impl From<Song> for SongSummary {
    fn from(song: Song) -> Self {
        Self {
            id: song.id,
            title: song.title,
            artist: song.artist,
            path: song.path,
        }
    }
}

/// Played song with its start time.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct HistoryEntrySummary {
    pub code: String,
    pub song: SongSummary,
    /// Epoch milliseconds.
    pub timestamp: u64,
    /// RFC 3339 rendering of `timestamp`.
    pub played_at: String,
}

impl From<HistoryEntry> for HistoryEntrySummary {
    fn from(entry: HistoryEntry) -> Self {
        Self {
            played_at: format_epoch_millis(entry.timestamp),
            code: entry.code,
            song: entry.song.into(),
            timestamp: entry.timestamp,
        }
    }
}

/// Why a song stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum SongEndReason {
    Skip,
    Natural,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SongEndPayload {
    pub reason: SongEndReason,
    pub song_id: String,
    pub title: String,
    pub artist: String,
}

/// Playback commands understood by the karaoke display.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub enum PlaybackAction {
    Pause,
    Resume,
    /// Restart the current song.
    Prev,
    SeekForward,
    SeekBackward,
    SetVolume,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlaybackControlPayload {
    pub action: PlaybackAction,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<f64>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SongListPayload {
    pub songs: Vec<SongSummary>,
}

/// Messages accepted from sockets.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum ClientMessage {
    /// Heartbeat; answered with [`ServerMessage::Pong`].
    Ping,
    #[serde(other)]
    Unknown,
}
