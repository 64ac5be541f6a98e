use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use courier_core::types::{MessageType, Platform};

/// Metadata key for an agent-issued conversation identifier.
pub const META_CONVERSATION_ID: &str = "conversation_id";
/// Metadata key for an agent-issued message identifier.
pub const META_MESSAGE_ID: &str = "message_id";
/// Metadata key for a Lark image handle (not-yet-downloaded binary reference).
pub const META_IMAGE_KEY: &str = "image_key";
/// Metadata key for a WeCom media handle (not-yet-downloaded binary reference).
pub const META_MEDIA_ID: &str = "media_id";
/// Metadata key for overflow images on a reply carrying more than one.
pub const META_ADDITIONAL_IMAGES: &str = "additional_images";
/// Metadata key tagging which platform issued a carried media handle.
pub const META_PLATFORM: &str = "platform";

/// Canonical in-memory message: the shape every platform adapter and
/// agent backend is converted to and from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UnifiedMessage {
    /// Originating (and reply) platform.
    pub platform: Platform,

    /// Platform-native conversation handle (Lark chat_id, WeCom user id, …).
    /// Opaque and not guaranteed to be a UUID.
    pub session_id: String,

    /// Platform-native identifier for the sender.
    pub user_id: String,

    /// Message payload. Prose for text messages; a URL, `data:image/...`
    /// URI, or bare base64 blob for image messages.
    pub content: String,

    /// Determines how `content` is interpreted.
    pub message_type: MessageType,

    /// Platform- and agent-specific side channel (`image_key`, `media_id`,
    /// `conversation_id`, …).
    #[serde(default)]
    pub metadata: HashMap<String, String>,

    /// When the platform delivered the message, if known.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<DateTime<Utc>>,
}

impl UnifiedMessage {
    /// Create a text message.
    pub fn text(
        platform: Platform,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        content: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            session_id: session_id.into(),
            user_id: user_id.into(),
            content: content.into(),
            message_type: MessageType::Text,
            metadata: HashMap::new(),
            timestamp: None,
        }
    }

    /// Create an image message. `image_data` is a URL, data URI, or bare base64 blob.
    pub fn image(
        platform: Platform,
        session_id: impl Into<String>,
        user_id: impl Into<String>,
        image_data: impl Into<String>,
    ) -> Self {
        Self {
            platform,
            session_id: session_id.into(),
            user_id: user_id.into(),
            content: image_data.into(),
            message_type: MessageType::Image,
            metadata: HashMap::new(),
            timestamp: None,
        }
    }

    pub fn is_text(&self) -> bool {
        self.message_type == MessageType::Text
    }

    pub fn is_image(&self) -> bool {
        self.message_type == MessageType::Image
    }

    pub fn is_voice(&self) -> bool {
        self.message_type == MessageType::Voice
    }

    /// Whether the message carries image content, either directly or as a
    /// platform media handle waiting to be resolved.
    pub fn has_image(&self) -> bool {
        self.is_image()
            || self.meta(META_IMAGE_KEY).is_some()
            || self.meta(META_MEDIA_ID).is_some()
    }

    /// Image payload or handle: content for image-typed messages, else the
    /// `image_key`/`media_id` metadata entry, else `None`.
    pub fn image_data(&self) -> Option<&str> {
        if self.is_image() {
            return Some(&self.content);
        }
        self.meta(META_IMAGE_KEY).or_else(|| self.meta(META_MEDIA_ID))
    }

    /// Non-empty metadata entry lookup.
    pub fn meta(&self, key: &str) -> Option<&str> {
        self.metadata
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

/// Agent-agnostic request: what either backend's payload builder starts from.
///
/// Built fresh for every inbound message; never retained.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentRequest {
    /// Text query for the agent.
    pub query: String,

    /// Ordered image references: bare base64 payloads or remote URLs.
    #[serde(default)]
    pub image_urls: Vec<String>,

    /// Platform conversation handle, passed through for correlation.
    pub session_id: String,

    /// Platform user identifier.
    pub user_id: String,

    /// Optional system prompt prepended by the backend.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,

    /// Prior turns, each an opaque record in the backend's own message shape.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub contexts: Vec<serde_json::Value>,

    /// Metadata carried forward from the unified message, notably a
    /// previously established agent conversation identifier.
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub metadata: HashMap<String, String>,
}

/// Agent-agnostic response, built once per completed stream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AgentResponse {
    /// Assembled reply text.
    pub content: String,

    /// Image references attached to the reply.
    #[serde(default)]
    pub image_urls: Vec<String>,

    /// Agent-assigned identifiers (`conversation_id`, `message_id`).
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}
