use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::state::karaoke::Song;

/// High-level mode exposed to clients.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum PlaybackState {
    /// Nothing is playing; the idle screen is shown.
    #[default]
    Idle,
    /// A song is playing on the karaoke display.
    Karaoke,
}

/// Playback phase together with the data that only exists while playing.
///
/// Carrying the song inside the `Karaoke` variant makes "karaoke iff a current
/// song exists" impossible to violate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Playback {
    /// Nothing is playing.
    #[default]
    Idle,
    /// A song is on the display.
    Karaoke {
        /// Code the song was dequeued under.
        code: String,
        /// Song currently playing.
        song: Song,
    },
}

/// Outcome of a requested transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// The state changed.
    Entered,
    /// The guard matched; nothing changed.
    Unchanged,
}

impl Playback {
    /// Visible state for this phase.
    pub fn state(&self) -> PlaybackState {
        match self {
            Playback::Idle => PlaybackState::Idle,
            Playback::Karaoke { .. } => PlaybackState::Karaoke,
        }
    }

    /// Song currently playing, if any.
    pub fn current_song(&self) -> Option<&Song> {
        match self {
            Playback::Idle => None,
            Playback::Karaoke { song, .. } => Some(song),
        }
    }

    /// Code of the song currently playing, if any.
    pub fn current_code(&self) -> Option<&str> {
        match self {
            Playback::Idle => None,
            Playback::Karaoke { code, .. } => Some(code),
        }
    }

    /// Return to the idle screen; no-op when already idle.
    pub fn enter_idle(&mut self) -> Transition {
        match self {
            Playback::Idle => Transition::Unchanged,
            Playback::Karaoke { .. } => {
                *self = Playback::Idle;
                Transition::Entered
            }
        }
    }

    /// Start playing `song`; no-op when that code is already playing.
    pub fn enter_karaoke(&mut self, code: &str, song: &Song) -> Transition {
        if self.current_code() == Some(code) {
            return Transition::Unchanged;
        }
        *self = Playback::Karaoke {
            code: code.to_owned(),
            song: song.clone(),
        };
        Transition::Entered
    }
}
