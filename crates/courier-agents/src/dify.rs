use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use courier_core::config::{DifyConfig, AGENT_TIMEOUT_SECS};
use courier_message::types::{AgentRequest, AgentResponse};

use crate::assemble::{collect_stream, FrameMode};
use crate::client::{AgentClient, AgentError};
use crate::event::parse_dify_event;
use crate::payload::DifyPayload;

/// Dify chat backend: `POST {api_base}/chat-messages`, SSE response with
/// one event per data line.
pub struct DifyClient {
    cfg: DifyConfig,
    client: reqwest::Client,
}

impl DifyClient {
    pub fn new(cfg: DifyConfig) -> Self {
        Self {
            cfg,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AgentClient for DifyClient {
    fn name(&self) -> &str {
        "dify"
    }

    async fn invoke(&self, req: &AgentRequest) -> Result<AgentResponse, AgentError> {
        if self.cfg.api_key.is_empty() {
            return Err(AgentError::AuthFailed("Dify API key is empty".to_string()));
        }

        let payload = DifyPayload::from_request(req, self.cfg.user_id.as_deref());
        let url = format!("{}/chat-messages", self.cfg.api_base);

        debug!(session = %req.session_id, "sending request to Dify");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.cfg.api_key)
            .timeout(Duration::from_secs(AGENT_TIMEOUT_SECS))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 401 {
            return Err(AgentError::AuthFailed(
                "Dify rejected the API key".to_string(),
            ));
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Dify API error");
            return Err(AgentError::Api {
                status,
                message: text,
            });
        }

        collect_stream(resp, FrameMode::PerLine, parse_dify_event).await
    }
}
