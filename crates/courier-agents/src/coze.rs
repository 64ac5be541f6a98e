use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, warn};

use courier_core::config::{CozeConfig, AGENT_TIMEOUT_SECS};
use courier_message::types::{AgentRequest, AgentResponse};

use crate::assemble::{collect_stream, FrameMode};
use crate::client::{AgentClient, AgentError};
use crate::event::parse_coze_event;
use crate::payload::CozePayload;

/// Coze chat backend: `POST {api_base}/v3/chat`, SSE response with
/// `event:`/`data:` pairs flushed on blank lines.
pub struct CozeClient {
    cfg: CozeConfig,
    client: reqwest::Client,
}

impl CozeClient {
    pub fn new(cfg: CozeConfig) -> Self {
        Self {
            cfg,
            client: reqwest::Client::new(),
        }
    }
}

#[async_trait]
impl AgentClient for CozeClient {
    fn name(&self) -> &str {
        "coze"
    }

    async fn invoke(&self, req: &AgentRequest) -> Result<AgentResponse, AgentError> {
        if self.cfg.api_key.is_empty() {
            return Err(AgentError::AuthFailed("Coze API key is empty".to_string()));
        }

        let payload = CozePayload::from_request(req, &self.cfg.bot_id, self.cfg.user_id.as_deref());
        let url = format!("{}/v3/chat", self.cfg.api_base);

        debug!(session = %req.session_id, bot = %self.cfg.bot_id, "sending request to Coze");

        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.cfg.api_key)
            .header("Accept", "text/event-stream")
            .timeout(Duration::from_secs(AGENT_TIMEOUT_SECS))
            .json(&payload)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 401 {
            return Err(AgentError::AuthFailed(
                "Coze rejected the API key".to_string(),
            ));
        }
        if !resp.status().is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status, body = %text, "Coze API error");
            return Err(AgentError::Api {
                status,
                message: text,
            });
        }

        collect_stream(resp, FrameMode::Batched, parse_coze_event).await
    }
}
