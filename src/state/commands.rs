//! Mutations accepted by the operation serializer and the pure function applying them.

use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use crate::{
    dao::models::PersistedState,
    state::{
        karaoke::{
            HistoryEntry, IdleMode, KaraokeSession, MAX_CODE_LENGTH, Song, ViewMode, WindowSize,
            is_valid_partial_code,
        },
        queue::{CodeQueue, QueueHistory, QueuePush},
        state_machine::{Playback, Transition},
    },
};

/// A single mutation of the karaoke session.
#[derive(Debug, Clone)]
pub enum Operation {
    AddToQueue(String),
    RemoveFromQueue(String),
    ClearQueue,
    ShiftQueue,
    SetCurrentCode(String),
    AppendDigit(char),
    DeleteDigit,
    SetIdleBackgroundPath(String),
    SetIdleMode(IdleMode),
    SetIdleVideoFiles(Vec<String>),
    SetLoopingMusicEnabled(bool),
    SetLoopingMusicFiles(Vec<String>),
    SetCustomFontPath(String),
    SetAnnounceKeys(bool),
    SetViewMode(ViewMode),
    SetWindowSize(WindowSize),
    SetKaraokePort(u16),
    SetRemotePort(u16),
    SetSearchPath(String),
    EnterIdle,
    EnterKaraoke { code: String, song: Song },
    Reset,
    AcquireViewer,
    ReleaseViewer,
    TakePreviousCode,
    Hydrate(Box<PersistedState>),
}

impl Operation {
    /// Short name used in logs.
    pub fn name(&self) -> &'static str {
        match self {
            Operation::AddToQueue(_) => "add_to_queue",
            Operation::RemoveFromQueue(_) => "remove_from_queue",
            Operation::ClearQueue => "clear_queue",
            Operation::ShiftQueue => "shift_queue",
            Operation::SetCurrentCode(_) => "set_current_code",
            Operation::AppendDigit(_) => "append_digit",
            Operation::DeleteDigit => "delete_digit",
            Operation::SetIdleBackgroundPath(_) => "set_idle_background_path",
            Operation::SetIdleMode(_) => "set_idle_mode",
            Operation::SetIdleVideoFiles(_) => "set_idle_video_files",
            Operation::SetLoopingMusicEnabled(_) => "set_looping_music_enabled",
            Operation::SetLoopingMusicFiles(_) => "set_looping_music_files",
            Operation::SetCustomFontPath(_) => "set_custom_font_path",
            Operation::SetAnnounceKeys(_) => "set_announce_keys",
            Operation::SetViewMode(_) => "set_view_mode",
            Operation::SetWindowSize(_) => "set_window_size",
            Operation::SetKaraokePort(_) => "set_karaoke_port",
            Operation::SetRemotePort(_) => "set_remote_port",
            Operation::SetSearchPath(_) => "set_search_path",
            Operation::EnterIdle => "enter_idle",
            Operation::EnterKaraoke { .. } => "enter_karaoke",
            Operation::Reset => "reset",
            Operation::AcquireViewer => "acquire_viewer",
            Operation::ReleaseViewer => "release_viewer",
            Operation::TakePreviousCode => "take_previous_code",
            Operation::Hydrate(_) => "hydrate",
        }
    }
}

/// Value produced by applying an [`Operation`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Unit,
    Code(Option<String>),
    Flag(bool),
}

/// Completion handle matching the result kind the caller waits for.
#[derive(Debug)]
pub enum Reply {
    Unit(oneshot::Sender<()>),
    Code(oneshot::Sender<Option<String>>),
    Flag(oneshot::Sender<bool>),
}

impl Reply {
    /// Resolve the caller's future. A kind mismatch is a programming error: it is
    /// logged and the sender is dropped, so the caller falls back to a default.
    pub fn complete(self, operation: &'static str, outcome: Outcome) {
        match (self, outcome) {
            (Reply::Unit(tx), Outcome::Unit) => {
                let _ = tx.send(());
            }
            (Reply::Code(tx), Outcome::Code(code)) => {
                let _ = tx.send(code);
            }
            (Reply::Flag(tx), Outcome::Flag(flag)) => {
                let _ = tx.send(flag);
            }
            (reply, outcome) => {
                error!(
                    operation,
                    expected = reply.kind(),
                    ?outcome,
                    "command completed with a mismatched result kind"
                );
            }
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Reply::Unit(_) => "unit",
            Reply::Code(_) => "code",
            Reply::Flag(_) => "flag",
        }
    }
}

/// Apply `operation` to `session`. `now` is the epoch-millisecond clock used for history entries.
///
/// Never panics; guard violations are no-ops.
pub fn apply(session: &mut KaraokeSession, operation: Operation, now: u64) -> Outcome {
    match operation {
        Operation::AddToQueue(code) => {
            match session.queue.push(&code) {
                QueuePush::Queued => info!(code = %code, queued = session.queue.len(), "queued code"),
                QueuePush::Empty => debug!("ignored empty code"),
                QueuePush::DuplicateTail => debug!(code = %code, "ignored duplicate of queue tail"),
            }
            Outcome::Unit
        }
        Operation::RemoveFromQueue(code) => {
            if session.queue.remove(&code) {
                info!(code = %code, "removed code from queue");
            }
            Outcome::Unit
        }
        Operation::ClearQueue => {
            session.queue.clear();
            info!("cleared queue");
            Outcome::Unit
        }
        Operation::ShiftQueue => Outcome::Code(session.queue.shift()),
        Operation::SetCurrentCode(code) => {
            if is_valid_partial_code(&code) {
                session.current_code = code;
            } else {
                warn!(code = %code, "rejected invalid code");
            }
            Outcome::Unit
        }
        Operation::AppendDigit(digit) => {
            if !digit.is_ascii_digit() || session.current_code.len() >= MAX_CODE_LENGTH {
                return Outcome::Code(None);
            }
            session.current_code.push(digit);
            Outcome::Code(Some(session.current_code.clone()))
        }
        Operation::DeleteDigit => {
            session.current_code.pop();
            Outcome::Code(Some(session.current_code.clone()))
        }
        Operation::SetIdleBackgroundPath(path) => {
            session.idle.background_path = path;
            Outcome::Unit
        }
        Operation::SetIdleMode(mode) => {
            session.idle.mode = mode;
            Outcome::Unit
        }
        Operation::SetIdleVideoFiles(files) => {
            session.idle.video_files = files;
            Outcome::Unit
        }
        Operation::SetLoopingMusicEnabled(enabled) => {
            session.idle.looping_music_enabled = enabled;
            Outcome::Unit
        }
        Operation::SetLoopingMusicFiles(files) => {
            session.idle.looping_music_files = files;
            Outcome::Unit
        }
        Operation::SetCustomFontPath(path) => {
            session.idle.custom_font_path = path;
            Outcome::Unit
        }
        Operation::SetAnnounceKeys(enabled) => {
            session.idle.announce_keys = enabled;
            Outcome::Unit
        }
        Operation::SetViewMode(mode) => {
            session.presentation.view_mode = mode;
            Outcome::Unit
        }
        Operation::SetWindowSize(size) => {
            session.presentation.window_size = size;
            Outcome::Unit
        }
        Operation::SetKaraokePort(port) => {
            session.network.karaoke_port = port;
            Outcome::Unit
        }
        Operation::SetRemotePort(port) => {
            session.network.remote_port = port;
            Outcome::Unit
        }
        Operation::SetSearchPath(path) => {
            session.network.search_path = path;
            Outcome::Unit
        }
        Operation::EnterIdle => {
            if session.playback.enter_idle() == Transition::Entered {
                info!("entered idle");
            }
            Outcome::Unit
        }
        Operation::EnterKaraoke { code, song } => {
            if session.playback.enter_karaoke(&code, &song) == Transition::Entered {
                info!(code = %code, title = %song.title, artist = %song.artist, "entered karaoke");
                if !code.is_empty() {
                    session.history.push(HistoryEntry {
                        code,
                        song,
                        timestamp: now,
                    });
                }
            }
            Outcome::Unit
        }
        Operation::Reset => {
            session.current_code.clear();
            session.queue.clear();
            session.playback = Playback::Idle;
            info!("reset session");
            Outcome::Unit
        }
        Operation::AcquireViewer => {
            let acquired = !session.viewer_lock_held;
            session.viewer_lock_held = true;
            Outcome::Flag(acquired)
        }
        Operation::ReleaseViewer => {
            session.viewer_lock_held = false;
            Outcome::Unit
        }
        Operation::TakePreviousCode => {
            let current = session.playback.current_code().map(str::to_owned);
            Outcome::Code(session.history.pop_previous(current.as_deref()))
        }
        Operation::Hydrate(persisted) => {
            hydrate(session, *persisted);
            Outcome::Unit
        }
    }
}

/// Restore queue, history and configuration. Playback always restarts idle with
/// a free viewer lock and an empty typed code.
fn hydrate(session: &mut KaraokeSession, persisted: PersistedState) {
    session.current_code.clear();
    session.queue = CodeQueue::from_codes(persisted.code_queue);
    session.history = QueueHistory::from_entries(persisted.queue_history);
    session.playback = Playback::Idle;
    session.viewer_lock_held = false;

    session.idle.background_path = persisted.idle_background_path;
    session.idle.mode = persisted.idle_mode;
    session.idle.video_files = persisted.idle_video_files;
    session.idle.looping_music_enabled = persisted.looping_music_enabled;
    session.idle.looping_music_files = persisted.looping_music_files;
    session.idle.custom_font_path = persisted.custom_font_path;
    session.idle.announce_keys = persisted.announce_keys;
    session.presentation.view_mode = persisted.view_mode;
    session.presentation.window_size = persisted.window_size;
    session.network.karaoke_port = persisted.karaoke_port;
    session.network.remote_port = persisted.remote_port;
    session.network.search_path = persisted.search_path;
}
