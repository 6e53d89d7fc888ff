use roomvox_worker::WorkerError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum VoiceError {
    #[error("LiveKit API error: {0}")]
    LiveKit(#[from] livekit_api::access_token::AccessTokenError),

    #[error("Room service error: {0}")]
    RoomService(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Media error: {0}")]
    Media(String),
}

impl VoiceError {
    /// Maps a failure while joining `room` onto the worker's error type.
    pub fn into_connect_error(self, room: &str) -> WorkerError {
        WorkerError::Connect {
            room: room.to_string(),
            reason: self.to_string(),
        }
    }
}
