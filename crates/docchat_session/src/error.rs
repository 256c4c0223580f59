//! Error types for the chat session controller.

use thiserror::Error;

/// Result type for chat operations
pub type ChatResult<T> = Result<T, ChatError>;

/// Chat session errors.
///
/// Every variant except `Io`, `Serialization` and `Config` is recovered by the
/// conversation controller: it lands in the error slot and the user may retry.
#[derive(Error, Debug)]
pub enum ChatError {
    #[error("Type a question or attach a document first")]
    EmptyInput,

    #[error("Attach a document to start the conversation")]
    MissingAttachment,

    #[error("No active session. Attach a document to start a new chat")]
    MissingSession,

    #[error("Unsupported attachment: {name} (accepted: {allowed})")]
    UnsupportedAttachment { name: String, allowed: String },

    #[error("{0}")]
    UploadFailed(String),

    #[error("{0}")]
    ChatRequestFailed(String),

    /// The conversation was reset while a request was in flight.
    #[error("Response belongs to a conversation that was reset")]
    Stale,

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl ChatError {
    /// Whether the error came back from the document-chat server
    pub fn is_request_failure(&self) -> bool {
        matches!(self, Self::UploadFailed(_) | Self::ChatRequestFailed(_))
    }
}
