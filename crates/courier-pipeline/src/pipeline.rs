//! Orchestrates one message end to end: dequeue → normalize → convert →
//! invoke agent (with one fallback hop) → convert response → reconcile
//! conversation identity → dispatch to the platform sender.

use std::sync::Arc;

use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use courier_agents::client::AgentClient;
use courier_core::config::PipelineConfig;
use courier_core::error::CourierError;
use courier_core::types::Platform;
use courier_message::chunk::split_long_text;
use courier_message::convert::{is_conversation_uuid, Converter};
use courier_message::queue::MessageQueue;
use courier_message::types::{AgentRequest, AgentResponse, UnifiedMessage, META_CONVERSATION_ID};

use crate::sender::{DispatchError, PlatformSender, SenderRegistry};

pub struct Pipeline {
    converter: Converter,
    primary: Option<Arc<dyn AgentClient>>,
    secondary: Option<Arc<dyn AgentClient>>,
    senders: Arc<SenderRegistry>,
    /// Admission gate for per-message tasks; bounds concurrent outbound
    /// HTTP calls under load.
    workers: Arc<Semaphore>,
    chunk_limit: usize,
}

impl Pipeline {
    /// `primary` is tried first for every message; `secondary` is a
    /// one-shot fallback when the primary errors. Either may be absent.
    pub fn new(
        primary: Option<Arc<dyn AgentClient>>,
        secondary: Option<Arc<dyn AgentClient>>,
        cfg: &PipelineConfig,
    ) -> Self {
        Self {
            converter: Converter::new(),
            primary,
            secondary,
            senders: Arc::new(SenderRegistry::new()),
            workers: Arc::new(Semaphore::new(cfg.max_workers.max(1))),
            chunk_limit: cfg.chunk_limit,
        }
    }

    pub fn register_sender(&self, platform: Platform, sender: Arc<dyn PlatformSender>) {
        self.senders.register(platform, sender);
    }

    /// Consume the queue until cancellation. Each dequeued message runs on
    /// its own task, so handling is parallel and unordered across messages;
    /// in-flight tasks are not cancelled by shutdown; they run out.
    pub async fn run(self: Arc<Self>, mut queue: MessageQueue, cancel: CancellationToken) {
        info!("pipeline started");

        while let Some(msg) = queue.pop(&cancel).await {
            let permit = match Arc::clone(&self.workers).acquire_owned().await {
                Ok(permit) => permit,
                Err(_) => break,
            };

            let pipeline = Arc::clone(&self);
            tokio::spawn(async move {
                pipeline.process_message(msg).await;
                drop(permit);
            });
        }

        info!("pipeline stopped");
    }

    /// Run steps 3–8 for one message. Never propagates an error: every
    /// failure mode either falls back or degrades to a synthesized reply,
    /// and dispatch failures end the message as logged-and-dropped.
    pub async fn process_message(&self, mut msg: UnifiedMessage) {
        let preview: String = msg.content.chars().take(100).collect();
        info!(
            platform = %msg.platform,
            session = %msg.session_id,
            kind = %msg.message_type,
            content = %preview,
            "processing message"
        );

        self.converter.normalize_content(&mut msg);
        let agent_req = self.converter.to_agent_request(&msg);

        let agent_resp = match self.invoke_with_fallback(&agent_req).await {
            Ok(resp) => resp,
            Err(e) => {
                error!(error = %e, "failed to get agent response");
                AgentResponse {
                    content: format!("Failed to process the message: {e}"),
                    ..AgentResponse::default()
                }
            }
        };

        let mut reply = self.converter.from_agent_response(&agent_resp, &msg);
        reconcile_identity(&agent_resp, &mut msg, &mut reply);

        let Some(sender) = self.senders.get(reply.platform) else {
            warn!(platform = %reply.platform, "no sender registered for platform, dropping reply");
            return;
        };

        match self.dispatch(sender.as_ref(), &reply).await {
            Ok(()) => info!(
                platform = %reply.platform,
                session = %reply.session_id,
                "reply dispatched"
            ),
            Err(e) => error!(
                platform = %reply.platform,
                session = %reply.session_id,
                error = %e,
                "failed to dispatch reply"
            ),
        }
    }

    /// Primary first, then one shot at the secondary. No same-backend
    /// retry, no further chain.
    async fn invoke_with_fallback(&self, req: &AgentRequest) -> Result<AgentResponse, CourierError> {
        let mut last_err = CourierError::Config("no agent backend configured".to_string());

        if let Some(primary) = &self.primary {
            match primary.invoke(req).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    error!(backend = primary.name(), error = %e, "primary agent failed");
                    last_err = CourierError::Agent {
                        backend: primary.name().to_string(),
                        reason: e.to_string(),
                    };
                }
            }
        }

        if let Some(secondary) = &self.secondary {
            if self.primary.is_some() {
                info!(backend = secondary.name(), "falling back to secondary agent");
            }
            match secondary.invoke(req).await {
                Ok(resp) => return Ok(resp),
                Err(e) => {
                    error!(backend = secondary.name(), error = %e, "secondary agent failed");
                    last_err = CourierError::Agent {
                        backend: secondary.name().to_string(),
                        reason: e.to_string(),
                    };
                }
            }
        }

        Err(last_err)
    }

    /// WeCom enforces a hard message length ceiling, so text replies go out
    /// as ordered chunks and stop at the first failed send. Everything else
    /// is a single send.
    async fn dispatch(
        &self,
        sender: &dyn PlatformSender,
        reply: &UnifiedMessage,
    ) -> Result<(), DispatchError> {
        match reply.platform {
            Platform::WeCom if reply.is_text() => {
                for chunk in split_long_text(&reply.content, self.chunk_limit) {
                    sender.send_message(&reply.session_id, &chunk).await?;
                }
                Ok(())
            }
            _ => sender.send_message(&reply.session_id, &reply.content).await,
        }
    }
}

/// Step 7: a validated response identifier is saved into both messages'
/// metadata so the next turn on this session can continue the conversation;
/// a foreign-shaped one purges whatever was stored before, so it is never
/// retried.
fn reconcile_identity(
    resp: &AgentResponse,
    msg: &mut UnifiedMessage,
    reply: &mut UnifiedMessage,
) {
    let Some(cid) = resp
        .metadata
        .get(META_CONVERSATION_ID)
        .filter(|cid| !cid.is_empty())
    else {
        return;
    };

    if is_conversation_uuid(cid) {
        msg.metadata
            .insert(META_CONVERSATION_ID.to_string(), cid.clone());
        reply
            .metadata
            .insert(META_CONVERSATION_ID.to_string(), cid.clone());
        debug!(conversation_id = %cid, "saved agent conversation id");
    } else {
        msg.metadata.remove(META_CONVERSATION_ID);
        reply.metadata.remove(META_CONVERSATION_ID);
        debug!(conversation_id = %cid, "purged foreign-shaped conversation id");
    }
}
