use serde::Serialize;
use tracing::{debug, warn};

use crate::{
    dto::events::{
        PlaybackAction, PlaybackControlPayload, ServerMessage, SongEndPayload, SongEndReason,
        StatePayload,
    },
    state::{
        ClientKind, SharedState,
        karaoke::{MAX_CODE_LENGTH, Song},
    },
};

const STATUS_SELECT_SONG: &str = "Select A Song";
const STATUS_NO_SONG: &str = "No song found";

/// Left-pad a typed code with zeros to the full code length.
pub fn pad_code(code: &str) -> String {
    format!("{code:0>width$}", width = MAX_CODE_LENGTH)
}

/// Build the state payload from the latest session snapshot.
pub fn state_payload(state: &SharedState, last_digit: Option<String>) -> StatePayload {
    let session = state.karaoke().snapshot();
    let code = pad_code(&session.current_code);
    let current = session.playback.current_song();

    let status = match current {
        Some(song) => describe(song),
        None if !session.current_code.is_empty() => state
            .library()
            .get(&code)
            .map(|song| describe(&song))
            .unwrap_or_else(|| STATUS_NO_SONG.into()),
        None => STATUS_SELECT_SONG.into(),
    };

    StatePayload {
        code,
        status,
        queue: session.queue.to_vec(),
        queue_history: session
            .history
            .to_vec()
            .into_iter()
            .map(Into::into)
            .collect(),
        last_digit,
        announce_keys: session.idle.announce_keys,
        background_type: session.idle.mode,
        state: session.playback.state(),
        song_id: current.map(|song| song.id.clone()),
    }
}

/// Push the current state to every display and remote.
pub fn broadcast_state(state: &SharedState, last_digit: Option<String>) {
    let message = ServerMessage::State(state_payload(state, last_digit));
    send_to_clients(state, |_| true, &message);
}

/// Tell every client that `song` stopped.
pub fn broadcast_song_end(state: &SharedState, song: &Song, reason: SongEndReason) {
    let message = ServerMessage::SongEnd(SongEndPayload {
        reason,
        song_id: song.id.clone(),
        title: song.title.clone(),
        artist: song.artist.clone(),
    });
    send_to_clients(state, |_| true, &message);
}

/// Forward a playback command to the karaoke display only.
pub fn broadcast_playback_control(state: &SharedState, action: PlaybackAction, value: Option<f64>) {
    let message = ServerMessage::PlaybackControl(PlaybackControlPayload { action, value });
    send_to_clients(state, |kind| kind == ClientKind::Karaoke, &message);
}

fn describe(song: &Song) -> String {
    format!("{} - {}", song.title, song.artist)
}

fn send_to_clients(
    state: &SharedState,
    filter: impl Fn(ClientKind) -> bool,
    payload: &impl Serialize,
) {
    match serde_json::to_string(payload) {
        Ok(text) => {
            let delivered = state.clients().broadcast(filter, text.into());
            debug!(delivered, "broadcast sent");
        }
        Err(err) => warn!(error = %err, "failed to serialize broadcast payload"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::{
        state_machine::PlaybackState,
        testing::{app_state, song},
    };
    use axum::extract::ws::Message;
    use tokio::sync::mpsc;

    #[test]
    fn codes_are_padded_to_six_digits() {
        assert_eq!(pad_code(""), "000000");
        assert_eq!(pad_code("42"), "000042");
        assert_eq!(pad_code("123456"), "123456");
    }

    #[tokio::test]
    async fn status_prompts_when_nothing_is_typed() {
        let (state, _dir) = app_state(&["000001"]);
        let payload = state_payload(&state, None);
        assert_eq!(payload.code, "000000");
        assert_eq!(payload.status, STATUS_SELECT_SONG);
        assert_eq!(payload.state, PlaybackState::Idle);
        assert!(payload.song_id.is_none());
    }

    #[tokio::test]
    async fn status_describes_typed_or_missing_song() {
        let (state, _dir) = app_state(&["000001"]);

        state.karaoke().set_current_code("1").await;
        assert_eq!(state_payload(&state, None).status, "Title 000001 - Artist 000001");

        state.karaoke().set_current_code("9").await;
        assert_eq!(state_payload(&state, None).status, STATUS_NO_SONG);
    }

    #[tokio::test]
    async fn status_prefers_the_playing_song() {
        let (state, _dir) = app_state(&["000001", "000002"]);
        state.karaoke().enter_karaoke("000002", song("000002")).await;
        state.karaoke().set_current_code("1").await;

        let payload = state_payload(&state, Some("1".into()));
        assert_eq!(payload.status, "Title 000002 - Artist 000002");
        assert_eq!(payload.song_id.as_deref(), Some("000002"));
        assert_eq!(payload.last_digit.as_deref(), Some("1"));
    }

    #[tokio::test]
    async fn playback_control_skips_remotes() {
        let (state, _dir) = app_state(&[]);
        let (karaoke_tx, mut karaoke_rx) = mpsc::unbounded_channel();
        let (remote_tx, mut remote_rx) = mpsc::unbounded_channel();
        state.clients().register(ClientKind::Karaoke, karaoke_tx);
        state.clients().register(ClientKind::Remote, remote_tx);

        broadcast_playback_control(&state, PlaybackAction::Pause, None);

        match karaoke_rx.try_recv() {
            Ok(Message::Text(text)) => {
                assert_eq!(text.as_str(), r#"{"type":"playbackControl","action":"pause"}"#)
            }
            other => panic!("unexpected message: {other:?}"),
        }
        assert!(remote_rx.try_recv().is_err());
    }
}
