use axum::{
    Json,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use validator::{Validate, ValidationErrors};

use crate::dto::{
    events::ServerMessage,
    validation::{validate_digit, validate_volume},
};

/// Command sent by the remote control (and by the display when a song ends).
#[derive(Debug, Clone, Deserialize, ToSchema)]
#[serde(tag = "action", rename_all = "camelCase")]
pub enum ActionRequest {
    /// Type one digit of a song code.
    Digit { digit: String },
    /// Erase the last typed digit.
    Delete,
    /// Queue the typed code.
    Enter,
    /// Stop the current song and play the next one.
    Skip,
    /// The current song finished on its own.
    Ended,
    /// Play the song before the current one again.
    Previous,
    /// Search the library by title or artist.
    Search {
        #[serde(default)]
        query: String,
    },
    /// Return the current state payload.
    GetState,
    Pause,
    Resume,
    SeekForward,
    SeekBackward,
    SetVolume { value: f64 },
    #[serde(other)]
    Unknown,
}

impl Validate for ActionRequest {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        match self {
            ActionRequest::Digit { digit } => {
                if let Err(e) = validate_digit(digit) {
                    errors.add("digit", e);
                }
            }
            ActionRequest::SetVolume { value } => {
                if let Err(e) = validate_volume(*value) {
                    errors.add("value", e);
                }
            }
            _ => {}
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }
}

/// Plain acknowledgement.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct AckResponse {
    pub ok: bool,
}

impl AckResponse {
    pub fn ok() -> Self {
        Self { ok: true }
    }
}

/// Reply to `POST /action`: an acknowledgement, or a message for read actions.
#[derive(Debug, Clone, Serialize, ToSchema)]
#[serde(untagged)]
pub enum ActionResponse {
    Ack(AckResponse),
    Message(ServerMessage),
}

impl IntoResponse for ActionResponse {
    fn into_response(self) -> Response {
        Json(self).into_response()
    }
}
