use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ChatSyncError {
    #[error("Chat error: {0}")]
    ChatError(String),

    #[error("Channel unavailable: {0}")]
    ChannelUnavailable(String),

    #[error("Protocol error: {0}")]
    ProtocolError(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

// Errors cross into the UI layer as plain strings.
impl Serialize for ChatSyncError {
    fn serialize<S>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

pub type Result<T> = std::result::Result<T, ChatSyncError>;
