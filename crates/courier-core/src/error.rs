use thiserror::Error;

#[derive(Debug, Error)]
pub enum CourierError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Agent backend error ({backend}): {reason}")]
    Agent { backend: String, reason: String },

    #[error("Dispatch error ({platform}): {reason}")]
    Dispatch { platform: String, reason: String },

    #[error("Queue closed")]
    QueueClosed,

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

pub type Result<T> = std::result::Result<T, CourierError>;
