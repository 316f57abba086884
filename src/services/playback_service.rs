//! Playback flow driven by the action API: code entry, queue advance and
//! transport commands.

use std::sync::atomic::{AtomicBool, Ordering};

use tracing::{debug, info, warn};
use validator::Validate;

use crate::{
    dao::library::SongLookup,
    dto::{
        action::{AckResponse, ActionRequest, ActionResponse},
        events::{PlaybackAction, ServerMessage, SongEndReason, SongListPayload},
    },
    error::ServiceError,
    services::broadcast::{
        broadcast_playback_control, broadcast_song_end, broadcast_state, pad_code, state_payload,
    },
    state::{KaraokeState, SharedState, karaoke::Song, state_machine::PlaybackState},
};

/// Allows a single queue advance at a time.
#[derive(Debug, Default)]
pub struct AdvanceGate {
    running: AtomicBool,
}

/// Releases the [`AdvanceGate`] when dropped.
pub struct AdvanceGuard<'a> {
    gate: &'a AdvanceGate,
}

impl AdvanceGate {
    /// Claim the gate, or `None` when an advance is already running.
    pub fn try_enter(&self) -> Option<AdvanceGuard<'_>> {
        self.running
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()
            .map(|_| AdvanceGuard { gate: self })
    }
}

impl Drop for AdvanceGuard<'_> {
    fn drop(&mut self) {
        self.gate.running.store(false, Ordering::Release);
    }
}

/// Result of [`play_next`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Advance {
    /// A queued song started.
    Playing {
        /// Code that was dequeued.
        code: String,
        /// Song now on the display.
        song: Song,
    },
    /// The queue ran dry and playback went idle.
    Idle,
    /// Another advance was in flight; nothing was done.
    AlreadyAdvancing,
}

/// Pop queued codes until one resolves to a song and play it; go idle when
/// the queue is exhausted.
pub async fn play_next(
    karaoke: &KaraokeState,
    songs: &dyn SongLookup,
    gate: &AdvanceGate,
) -> Advance {
    let Some(_guard) = gate.try_enter() else {
        debug!("advance already in progress");
        return Advance::AlreadyAdvancing;
    };

    loop {
        let Some(code) = karaoke.shift_next_code().await else {
            karaoke.enter_idle().await;
            info!("queue empty, back to idle");
            return Advance::Idle;
        };

        match songs.resolve(&code) {
            Some(song) => {
                info!(code = %code, title = %song.title, "playing next song");
                karaoke.enter_karaoke(code.clone(), song.clone()).await;
                return Advance::Playing { code, song };
            }
            None => warn!(code = %code, "queued code no longer matches a song, skipping"),
        }
    }
}

/// [`play_next`] on the shared state.
pub async fn advance(state: &SharedState) -> Advance {
    play_next(state.karaoke(), state.library().as_ref(), state.advance_gate()).await
}

/// Dispatch one action from a remote or display.
pub async fn handle_action(
    state: &SharedState,
    request: ActionRequest,
) -> Result<ActionResponse, ServiceError> {
    request.validate()?;

    let karaoke = state.karaoke();
    let mut last_digit = None;

    match request {
        ActionRequest::Digit { digit } => {
            let Some(key) = digit.chars().next() else {
                return Err(ServiceError::InvalidInput("digit is required".into()));
            };
            if karaoke.append_digit(key).await.is_some() {
                last_digit = Some(digit);
            }
        }
        ActionRequest::Delete => {
            karaoke.delete_digit().await;
            last_digit = Some("delete".to_owned());
        }
        ActionRequest::Enter => enter_code(state).await,
        ActionRequest::Skip => end_current_song(state, SongEndReason::Skip).await,
        ActionRequest::Ended => end_current_song(state, SongEndReason::Natural).await,
        ActionRequest::Previous => play_previous(state).await,
        ActionRequest::Search { query } => {
            let songs = state
                .library()
                .search(&query)
                .into_iter()
                .map(Into::into)
                .collect();
            return Ok(ActionResponse::Message(ServerMessage::SongList(
                SongListPayload { songs },
            )));
        }
        ActionRequest::GetState => {
            return Ok(ActionResponse::Message(ServerMessage::State(state_payload(
                state, None,
            ))));
        }
        ActionRequest::Pause => return Ok(control(state, PlaybackAction::Pause, None)),
        ActionRequest::Resume => return Ok(control(state, PlaybackAction::Resume, None)),
        ActionRequest::SeekForward => {
            return Ok(control(state, PlaybackAction::SeekForward, None));
        }
        ActionRequest::SeekBackward => {
            return Ok(control(state, PlaybackAction::SeekBackward, None));
        }
        ActionRequest::SetVolume { value } => {
            return Ok(control(state, PlaybackAction::SetVolume, Some(value)));
        }
        ActionRequest::Unknown => return Err(ServiceError::InvalidInput("invalid action".into())),
    }

    broadcast_state(state, last_digit);
    Ok(ActionResponse::Ack(AckResponse::ok()))
}

async fn enter_code(state: &SharedState) {
    let karaoke = state.karaoke();
    let padded = pad_code(&karaoke.current_code());
    let Some(id) = state.library().resolve_code(&padded) else {
        debug!(code = %padded, "entered code matches no song");
        return;
    };

    let session = karaoke.snapshot();
    let replays_current = session
        .playback
        .current_song()
        .is_some_and(|song| song.id == id)
        && session.queue.is_empty();
    if replays_current {
        debug!(code = %id, "song is already playing, not queued again");
    } else {
        karaoke.queue_code(id.clone()).await;
        info!(code = %id, "queued code");
    }

    karaoke.set_current_code("").await;
    broadcast_state(state, Some("enter".to_owned()));

    if karaoke.playback_state() == PlaybackState::Idle && !karaoke.code_queue().is_empty() {
        advance(state).await;
    }
}

async fn end_current_song(state: &SharedState, reason: SongEndReason) {
    let Some(song) = state.karaoke().current_song() else {
        debug!(?reason, "no song playing");
        return;
    };
    info!(song_id = %song.id, ?reason, "song ended");
    broadcast_song_end(state, &song, reason);
    advance(state).await;
}

async fn play_previous(state: &SharedState) {
    let karaoke = state.karaoke();
    let Some(code) = karaoke.take_previous_code().await else {
        // Nothing earlier in the history: restart the current song instead.
        broadcast_playback_control(state, PlaybackAction::Prev, None);
        return;
    };
    match state.library().resolve(&code) {
        Some(song) => {
            info!(code = %code, "replaying previous song");
            karaoke.enter_karaoke(code, song).await;
        }
        None => warn!(code = %code, "previous code no longer matches a song"),
    }
}

fn control(state: &SharedState, action: PlaybackAction, value: Option<f64>) -> ActionResponse {
    debug!(?action, ?value, "forwarding playback control");
    broadcast_playback_control(state, action, value);
    ActionResponse::Ack(AckResponse::ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{ClientKind, testing::app_state};
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    async fn press(state: &SharedState, request: ActionRequest) -> ActionResponse {
        handle_action(state, request).await.unwrap()
    }

    async fn type_code(state: &SharedState, code: &str) {
        for digit in code.chars() {
            press(state, ActionRequest::Digit { digit: digit.to_string() }).await;
        }
        press(state, ActionRequest::Enter).await;
    }

    fn drain_types(rx: &mut mpsc::UnboundedReceiver<Message>) -> Vec<String> {
        let mut types = Vec::new();
        while let Ok(Message::Text(text)) = rx.try_recv() {
            let value: serde_json::Value = serde_json::from_str(text.as_str()).unwrap();
            types.push(value["type"].as_str().unwrap().to_owned());
        }
        types
    }

    #[tokio::test]
    async fn play_next_starts_the_queue_head() {
        let (state, _dir) = app_state(&["000001"]);
        state.karaoke().queue_code("000001").await;

        let outcome = advance(&state).await;

        assert!(matches!(outcome, Advance::Playing { ref code, .. } if code == "000001"));
        assert_eq!(state.karaoke().playback_state(), PlaybackState::Karaoke);
        assert_eq!(state.karaoke().current_song().unwrap().id, "000001");
    }

    #[tokio::test]
    async fn play_next_skips_unresolvable_codes() {
        let (state, _dir) = app_state(&["000002"]);
        state.karaoke().queue_code("999999").await;
        state.karaoke().queue_code("000002").await;

        let outcome = advance(&state).await;

        assert!(matches!(outcome, Advance::Playing { ref code, .. } if code == "000002"));
        assert!(state.karaoke().code_queue().is_empty());
    }

    #[tokio::test]
    async fn play_next_on_empty_queue_goes_idle() {
        let (state, _dir) = app_state(&["000001"]);
        state.karaoke().enter_karaoke("000001", crate::state::testing::song("000001")).await;

        assert_eq!(advance(&state).await, Advance::Idle);
        assert_eq!(state.karaoke().playback_state(), PlaybackState::Idle);
        assert!(state.karaoke().current_song().is_none());
    }

    #[tokio::test]
    async fn concurrent_advance_is_a_no_op() {
        let (state, _dir) = app_state(&["000001"]);
        state.karaoke().queue_code("000001").await;

        let guard = state.advance_gate().try_enter().unwrap();
        assert_eq!(advance(&state).await, Advance::AlreadyAdvancing);
        assert_eq!(state.karaoke().code_queue(), vec!["000001"]);
        drop(guard);

        assert!(matches!(advance(&state).await, Advance::Playing { .. }));
    }

    #[tokio::test]
    async fn entering_a_code_while_idle_starts_playback() {
        let (state, _dir) = app_state(&["000001"]);

        type_code(&state, "1").await;

        assert_eq!(state.karaoke().current_code(), "");
        assert_eq!(state.karaoke().playback_state(), PlaybackState::Karaoke);
        assert_eq!(state.karaoke().current_song().unwrap().id, "000001");
        assert!(state.karaoke().code_queue().is_empty());
    }

    #[tokio::test]
    async fn entering_a_code_while_playing_queues_it() {
        let (state, _dir) = app_state(&["000001", "000002"]);
        type_code(&state, "1").await;
        type_code(&state, "2").await;

        assert_eq!(state.karaoke().current_song().unwrap().id, "000001");
        assert_eq!(state.karaoke().code_queue(), vec!["000002"]);
    }

    #[tokio::test]
    async fn entering_the_playing_song_with_empty_queue_is_ignored() {
        let (state, _dir) = app_state(&["000001"]);
        type_code(&state, "1").await;
        type_code(&state, "1").await;

        assert!(state.karaoke().code_queue().is_empty());
    }

    #[tokio::test]
    async fn unknown_code_is_kept_for_correction() {
        let (state, _dir) = app_state(&["000001"]);
        type_code(&state, "7").await;

        assert_eq!(state.karaoke().current_code(), "7");
        assert_eq!(state.karaoke().playback_state(), PlaybackState::Idle);
    }

    #[tokio::test]
    async fn seventh_digit_is_rejected() {
        let (state, _dir) = app_state(&[]);
        for _ in 0..7 {
            press(&state, ActionRequest::Digit { digit: "1".into() }).await;
        }
        assert_eq!(state.karaoke().current_code(), "111111");

        press(&state, ActionRequest::Delete).await;
        assert_eq!(state.karaoke().current_code(), "11111");
    }

    #[tokio::test]
    async fn skip_announces_song_end_and_advances() {
        let (state, _dir) = app_state(&["000001", "000002"]);
        type_code(&state, "1").await;
        type_code(&state, "2").await;

        let (tx, mut rx) = mpsc::unbounded_channel();
        state.clients().register(ClientKind::Remote, tx);

        press(&state, ActionRequest::Skip).await;

        assert_eq!(state.karaoke().current_song().unwrap().id, "000002");
        assert_eq!(drain_types(&mut rx), vec!["songEnd", "state"]);
    }

    #[tokio::test]
    async fn ended_without_a_song_only_broadcasts_state() {
        let (state, _dir) = app_state(&[]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.clients().register(ClientKind::Karaoke, tx);

        press(&state, ActionRequest::Ended).await;

        assert_eq!(drain_types(&mut rx), vec!["state"]);
    }

    #[tokio::test]
    async fn previous_replays_the_song_before_the_current_one() {
        let (state, _dir) = app_state(&["000001", "000002"]);
        type_code(&state, "1").await;
        type_code(&state, "2").await;
        press(&state, ActionRequest::Skip).await;
        assert_eq!(state.karaoke().current_song().unwrap().id, "000002");

        press(&state, ActionRequest::Previous).await;

        assert_eq!(state.karaoke().current_song().unwrap().id, "000001");
    }

    #[tokio::test]
    async fn previous_without_history_restarts_on_the_display() {
        let (state, _dir) = app_state(&[]);
        let (tx, mut rx) = mpsc::unbounded_channel();
        state.clients().register(ClientKind::Karaoke, tx);

        press(&state, ActionRequest::Previous).await;

        assert_eq!(drain_types(&mut rx), vec!["playbackControl", "state"]);
    }

    #[tokio::test]
    async fn search_returns_a_song_list() {
        let (state, _dir) = app_state(&["000001", "000002"]);

        let response = press(&state, ActionRequest::Search { query: "artist 000002".into() }).await;

        let value = serde_json::to_value(&response).unwrap();
        assert_eq!(value["type"], "songList");
        assert_eq!(value["songs"].as_array().unwrap().len(), 1);
        assert_eq!(value["songs"][0]["id"], "000002");
    }

    #[tokio::test]
    async fn get_state_returns_the_payload() {
        let (state, _dir) = app_state(&[]);
        let value = serde_json::to_value(press(&state, ActionRequest::GetState).await).unwrap();
        assert_eq!(value["type"], "state");
        assert_eq!(value["code"], "000000");
    }

    #[tokio::test]
    async fn invalid_requests_are_rejected() {
        let (state, _dir) = app_state(&[]);
        assert!(matches!(
            handle_action(&state, ActionRequest::Unknown).await,
            Err(ServiceError::InvalidInput(_))
        ));
        assert!(matches!(
            handle_action(&state, ActionRequest::Digit { digit: "x".into() }).await,
            Err(ServiceError::InvalidInput(_))
        ));
    }
}
