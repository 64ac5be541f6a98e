use async_trait::async_trait;

use courier_message::types::{AgentRequest, AgentResponse};

/// Common interface for all agent backends (Dify, Coze).
///
/// `invoke` performs the full HTTP exchange including streaming assembly:
/// callers hand over one [`AgentRequest`] and get back one completed
/// [`AgentResponse`] or an error, nothing in between.
#[async_trait]
pub trait AgentClient: Send + Sync {
    /// Backend name for logging and error messages.
    fn name(&self) -> &str;

    /// Send a request and assemble the streamed reply.
    async fn invoke(&self, req: &AgentRequest) -> Result<AgentResponse, AgentError>;
}

#[derive(Debug, thiserror::Error)]
pub enum AgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Authentication failed: {0}")]
    AuthFailed(String),

    #[error("Stream error: {0}")]
    Stream(String),
}
