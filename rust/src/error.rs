//! Error types for the engine's I/O seams.

/// Error type for REST, push-channel and local-store operations.
#[derive(Debug, thiserror::Error)]
pub enum ChatError {
    /// Request could not be sent or the body could not be read
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    /// Server answered with a non-success status
    #[error("{endpoint} returned status {status}")]
    Status {
        /// Endpoint path relative to the API base URL
        endpoint: String,
        /// HTTP status code
        status: u16,
    },
    /// Payload did not match the expected shape
    #[error("Decode error: {0}")]
    Decode(String),
    /// Push channel connect/read/write failure
    #[error("Push transport error: {0}")]
    Transport(String),
    /// Push channel spoke something other than Socket.IO
    #[error("Push protocol error: {0}")]
    Protocol(String),
    /// Local persisted-state failure
    #[error("Storage error: {0}")]
    Storage(String),
    /// Caller-supplied value rejected before any I/O
    #[error("Invalid input: {0}")]
    InvalidInput(String),
}

impl From<serde_json::Error> for ChatError {
    fn from(e: serde_json::Error) -> Self {
        ChatError::Decode(e.to_string())
    }
}

impl From<tokio_tungstenite::tungstenite::Error> for ChatError {
    fn from(e: tokio_tungstenite::tungstenite::Error) -> Self {
        ChatError::Transport(e.to_string())
    }
}

impl From<std::io::Error> for ChatError {
    fn from(e: std::io::Error) -> Self {
        ChatError::Storage(e.to_string())
    }
}

pub type ChatResult<T> = Result<T, ChatError>;
