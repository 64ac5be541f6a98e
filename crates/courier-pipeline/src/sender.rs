use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

use courier_core::types::Platform;

#[derive(Debug, Error)]
pub enum DispatchError {
    /// The platform rejected or failed to deliver the message.
    #[error("send failed: {0}")]
    SendFailed(String),
}

/// Outbound capability a platform adapter registers with the pipeline.
///
/// `send_message` is invoked once per chunk for length-limited platforms;
/// a failure aborts the remaining chunks of that reply.
#[async_trait]
pub trait PlatformSender: Send + Sync {
    async fn send_message(&self, session_id: &str, content: &str) -> Result<(), DispatchError>;
}

/// Read-mostly sender lookup: many concurrent dispatch reads, rare
/// registration writes at startup.
#[derive(Default)]
pub struct SenderRegistry {
    senders: RwLock<HashMap<Platform, Arc<dyn PlatformSender>>>,
}

impl SenderRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the sender for a platform.
    pub fn register(&self, platform: Platform, sender: Arc<dyn PlatformSender>) {
        info!(platform = %platform, "registering platform sender");
        self.senders
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(platform, sender);
    }

    pub fn get(&self, platform: Platform) -> Option<Arc<dyn PlatformSender>> {
        self.senders
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(&platform)
            .cloned()
    }
}
