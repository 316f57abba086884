//! Karaoke session model and the identity of the running instance.

use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::{
    queue::{CodeQueue, QueueHistory},
    state_machine::Playback,
};

/// Maximum number of digits a remote can type for a song code.
pub const MAX_CODE_LENGTH: usize = 6;
/// Default port for the karaoke display server.
pub const DEFAULT_KARAOKE_PORT: u16 = 4545;
/// Default port for the remote control server.
pub const DEFAULT_REMOTE_PORT: u16 = 4646;

/// A playable song resolved from the library.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Song {
    /// Six-digit identifier (e.g. `000042`).
    pub id: String,
    /// Display title.
    pub title: String,
    /// Display artist, `Unknown` when it could not be derived.
    pub artist: String,
    /// Absolute path of the video file.
    pub path: String,
}

/// One song that was played, kept for the history view and the "previous" action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    /// Code the song was queued under.
    pub code: String,
    /// Song snapshot taken when playback started.
    pub song: Song,
    /// Epoch milliseconds when playback started.
    pub timestamp: u64,
}

/// What the idle screen shows in the background.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum IdleMode {
    /// A still background image.
    #[default]
    Image,
    /// Looping background videos.
    Video,
}

/// How the karaoke window is presented.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum ViewMode {
    /// Exclusive fullscreen.
    #[default]
    Fullscreen,
    /// Undecorated window covering the screen.
    Borderless,
    /// Regular window of [`WindowSize`].
    Windowed,
}

/// Window dimensions used when the view mode is not fullscreen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct WindowSize {
    /// Width in pixels.
    pub width: u32,
    /// Height in pixels.
    pub height: u32,
}

impl Default for WindowSize {
    fn default() -> Self {
        Self {
            width: 1920,
            height: 1080,
        }
    }
}

/// Identity of the running process, used to tell our persisted state from a foreign one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstanceIdentity {
    /// `<epoch millis>-<random base36>`.
    pub instance_id: String,
    /// Pairing signature embedded into remote QR payloads.
    pub signature: String,
}

impl InstanceIdentity {
    /// Generate a fresh identity for this process.
    pub fn generate() -> Self {
        let suffix: String = (0..6)
            .map(|_| char::from_digit(rand::random_range(0..36), 36).unwrap_or('0'))
            .collect();
        let instance_id = format!("{}-{suffix}", now_millis());
        let signature = format!("KaraokeHost-sig={instance_id}-{}", now_millis());
        Self {
            instance_id,
            signature,
        }
    }
}

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or_default()
}

/// Idle-screen settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdleScreen {
    /// Background image path.
    pub background_path: String,
    /// Image or video background.
    pub mode: IdleMode,
    /// Videos looped in video mode.
    pub video_files: Vec<String>,
    /// Whether music plays while idle.
    pub looping_music_enabled: bool,
    /// Music tracks played while idle.
    pub looping_music_files: Vec<String>,
    /// Font used by the display; empty means the built-in one.
    pub custom_font_path: String,
    /// Announce typed digits on the display.
    pub announce_keys: bool,
}

/// Presentation settings for the karaoke window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Presentation {
    /// Window style.
    pub view_mode: ViewMode,
    /// Size used outside fullscreen.
    pub window_size: WindowSize,
}

/// Network and library settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Network {
    /// Port of the karaoke display server.
    pub karaoke_port: u16,
    /// Port of the remote control server.
    pub remote_port: u16,
    /// Folder scanned for songs.
    pub search_path: String,
}

impl Default for Network {
    fn default() -> Self {
        Self {
            karaoke_port: DEFAULT_KARAOKE_PORT,
            remote_port: DEFAULT_REMOTE_PORT,
            search_path: String::new(),
        }
    }
}

/// The single mutable aggregate. Only the serializer task holds a mutable one;
/// everybody else reads published immutable copies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KaraokeSession {
    /// Digits typed so far, at most [`MAX_CODE_LENGTH`].
    pub current_code: String,
    /// Codes waiting to be played, in order.
    pub queue: CodeQueue,
    /// Songs played, newest last.
    pub history: QueueHistory,
    /// Idle, or the song being sung.
    pub playback: Playback,
    /// Idle-screen settings.
    pub idle: IdleScreen,
    /// Window settings.
    pub presentation: Presentation,
    /// Ports and search path.
    pub network: Network,
    /// Whether a karaoke display currently holds the viewer lock.
    pub viewer_lock_held: bool,
}

impl Default for KaraokeSession {
    fn default() -> Self {
        Self {
            current_code: String::new(),
            queue: CodeQueue::default(),
            history: QueueHistory::default(),
            playback: Playback::Idle,
            idle: IdleScreen {
                announce_keys: true,
                ..IdleScreen::default()
            },
            presentation: Presentation::default(),
            network: Network::default(),
            viewer_lock_held: false,
        }
    }
}

/// Whether `code` is a valid (possibly partial) typed code.
pub fn is_valid_partial_code(code: &str) -> bool {
    code.len() <= MAX_CODE_LENGTH && code.chars().all(|c| c.is_ascii_digit())
}
