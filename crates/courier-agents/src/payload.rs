//! Typed wire payloads for the two agent backends.
//!
//! The shapes are validated at construction: attachment variants are built
//! through dedicated constructors, and a continuation identifier only ever
//! reaches a backend after passing the validity check for that backend.

use serde::{Deserialize, Serialize};
use tracing::debug;

use courier_message::convert::{is_conversation_uuid, is_inline_image};
use courier_message::types::{AgentRequest, META_CONVERSATION_ID};

/// Dify `POST /chat-messages` request body.
#[derive(Debug, Clone, Serialize)]
pub struct DifyPayload {
    pub query: String,
    pub user: String,
    pub response_mode: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub inputs: serde_json::Map<String, serde_json::Value>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub files: Vec<DifyAttachment>,
}

/// One file entry in a Dify request. Base64 payloads are marked for
/// out-of-band upload (`local_file`); remote URLs are passed as direct
/// references. Raw image bytes never ride inline in the chat payload.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "transfer_method", rename_all = "snake_case")]
pub enum DifyAttachment {
    LocalFile {
        #[serde(rename = "type")]
        kind: &'static str,
        base64_data: String,
    },
    RemoteUrl {
        #[serde(rename = "type")]
        kind: &'static str,
        url: String,
    },
}

impl DifyAttachment {
    pub fn image_upload(base64_data: impl Into<String>) -> Self {
        Self::LocalFile {
            kind: "image",
            base64_data: base64_data.into(),
        }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::RemoteUrl {
            kind: "image",
            url: url.into(),
        }
    }
}

impl DifyPayload {
    /// Build the Dify request for an agent-agnostic request.
    ///
    /// The continuation identifier is included only when a UUID-form value
    /// exists: first the metadata entry saved from an earlier turn, else
    /// the session handle on the off chance it is UUID-shaped. Anything
    /// else is left out so Dify opens a fresh conversation.
    pub fn from_request(req: &AgentRequest, user_override: Option<&str>) -> Self {
        let conversation_id = req
            .metadata
            .get(META_CONVERSATION_ID)
            .filter(|cid| is_conversation_uuid(cid))
            .cloned()
            .or_else(|| {
                is_conversation_uuid(&req.session_id).then(|| req.session_id.clone())
            });

        match &conversation_id {
            Some(cid) => debug!(conversation_id = %cid, "continuing dify conversation"),
            None => debug!("no valid continuation id, dify will open a new conversation"),
        }

        let files = req
            .image_urls
            .iter()
            .map(|image| {
                if is_inline_image(image) {
                    DifyAttachment::image_upload(image.clone())
                } else {
                    DifyAttachment::image_url(image.clone())
                }
            })
            .collect();

        Self {
            query: req.query.clone(),
            user: user_override.unwrap_or(&req.session_id).to_string(),
            response_mode: "streaming",
            conversation_id,
            inputs: serde_json::Map::new(),
            files,
        }
    }
}

/// Coze `POST /v3/chat` request body.
#[derive(Debug, Clone, Serialize)]
pub struct CozePayload {
    pub bot_id: String,
    pub user_id: String,
    pub stream: bool,
    pub auto_save_history: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    pub additional_messages: Vec<CozeMessage>,
}

/// One chat turn in a Coze request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CozeMessage {
    pub role: String,
    pub content: String,
    pub content_type: String,
}

impl CozeMessage {
    /// Plain text user turn.
    pub fn text(content: impl Into<String>) -> Self {
        Self {
            role: "user".to_string(),
            content: content.into(),
            content_type: "text".to_string(),
        }
    }

    /// Multimodal user turn: the content is a JSON-encoded part list.
    pub fn object_string(parts: &[CozeContentPart]) -> Self {
        Self {
            role: "user".to_string(),
            content: serde_json::to_string(parts).unwrap_or_default(),
            content_type: "object_string".to_string(),
        }
    }
}

/// One entry of an `object_string` part list.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CozeContentPart {
    Text {
        text: String,
    },
    Image {
        #[serde(skip_serializing_if = "Option::is_none")]
        url: Option<String>,
        #[serde(skip_serializing_if = "Option::is_none")]
        base64: Option<String>,
        #[serde(skip_serializing_if = "is_false")]
        need_upload: bool,
    },
}

fn is_false(b: &bool) -> bool {
    !*b
}

impl CozeContentPart {
    pub fn text(text: impl Into<String>) -> Self {
        Self::Text { text: text.into() }
    }

    pub fn image_url(url: impl Into<String>) -> Self {
        Self::Image {
            url: Some(url.into()),
            base64: None,
            need_upload: false,
        }
    }

    /// Base64 image part, flagged for the media collaborator to upload
    /// before the request leaves for Coze.
    pub fn image_upload(base64: impl Into<String>) -> Self {
        Self::Image {
            url: None,
            base64: Some(base64.into()),
            need_upload: true,
        }
    }
}

impl CozePayload {
    /// Build the Coze request. Coze correlates turns on the caller's own
    /// handle, so the platform session id rides as `conversation_id`.
    /// Prior turns from `contexts` are prepended ahead of the current one.
    pub fn from_request(req: &AgentRequest, bot_id: &str, user_override: Option<&str>) -> Self {
        let mut messages: Vec<CozeMessage> = req
            .contexts
            .iter()
            .filter_map(|ctx| serde_json::from_value(ctx.clone()).ok())
            .collect();

        if !req.image_urls.is_empty() {
            let mut parts = Vec::new();
            if !req.query.is_empty() {
                parts.push(CozeContentPart::text(&req.query));
            }
            for image in &req.image_urls {
                if is_inline_image(image) {
                    parts.push(CozeContentPart::image_upload(image));
                } else {
                    parts.push(CozeContentPart::image_url(image));
                }
            }
            messages.push(CozeMessage::object_string(&parts));
        } else if !req.query.is_empty() {
            messages.push(CozeMessage::text(&req.query));
        }

        Self {
            bot_id: bot_id.to_string(),
            user_id: user_override.unwrap_or(&req.user_id).to_string(),
            stream: true,
            auto_save_history: true,
            conversation_id: (!req.session_id.is_empty()).then(|| req.session_id.clone()),
            additional_messages: messages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn request(query: &str) -> AgentRequest {
        AgentRequest {
            query: query.to_string(),
            session_id: "oc_92fa1f28".to_string(),
            user_id: "u1".to_string(),
            ..AgentRequest::default()
        }
    }

    #[test]
    fn dify_includes_saved_uuid_conversation_id() {
        let mut req = request("hi");
        req.metadata
            .insert(META_CONVERSATION_ID.to_string(), UUID.to_string());

        let payload = DifyPayload::from_request(&req, None);
        assert_eq!(payload.conversation_id.as_deref(), Some(UUID));
        assert_eq!(payload.response_mode, "streaming");
        assert_eq!(payload.user, "oc_92fa1f28");
    }

    #[test]
    fn dify_omits_foreign_shaped_conversation_id() {
        let mut req = request("hi");
        req.metadata
            .insert(META_CONVERSATION_ID.to_string(), "oc_platform_handle".to_string());

        let payload = DifyPayload::from_request(&req, None);
        assert!(payload.conversation_id.is_none());
    }

    #[test]
    fn dify_falls_back_to_uuid_shaped_session_id() {
        let mut req = request("hi");
        req.session_id = UUID.to_string();

        let payload = DifyPayload::from_request(&req, None);
        assert_eq!(payload.conversation_id.as_deref(), Some(UUID));
    }

    #[test]
    fn dify_classifies_attachments_by_transfer_method() {
        let mut req = request("look");
        req.image_urls = vec![
            "https://cdn.example/a.png".to_string(),
            "QUFB".repeat(40),
        ];

        let payload = DifyPayload::from_request(&req, None);
        let json = serde_json::to_value(&payload).unwrap();
        let files = json["files"].as_array().unwrap();
        assert_eq!(files[0]["transfer_method"], "remote_url");
        assert_eq!(files[0]["url"], "https://cdn.example/a.png");
        assert_eq!(files[1]["transfer_method"], "local_file");
        assert!(files[1]["base64_data"].as_str().unwrap().starts_with("QUFB"));
    }

    #[test]
    fn dify_user_override_wins() {
        let payload = DifyPayload::from_request(&request("hi"), Some("svc-user"));
        assert_eq!(payload.user, "svc-user");
    }

    #[test]
    fn coze_text_turn_is_plain_content() {
        let payload = CozePayload::from_request(&request("hello"), "bot-1", None);
        assert!(payload.stream);
        assert!(payload.auto_save_history);
        assert_eq!(payload.conversation_id.as_deref(), Some("oc_92fa1f28"));
        assert_eq!(payload.additional_messages.len(), 1);
        assert_eq!(payload.additional_messages[0].content_type, "text");
        assert_eq!(payload.additional_messages[0].content, "hello");
    }

    #[test]
    fn coze_image_turn_is_object_string() {
        let mut req = request("what is this");
        req.image_urls = vec!["https://cdn.example/a.png".to_string()];

        let payload = CozePayload::from_request(&req, "bot-1", None);
        let turn = &payload.additional_messages[0];
        assert_eq!(turn.content_type, "object_string");

        let parts: serde_json::Value = serde_json::from_str(&turn.content).unwrap();
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[0]["text"], "what is this");
        assert_eq!(parts[1]["type"], "image");
        assert_eq!(parts[1]["url"], "https://cdn.example/a.png");
    }

    #[test]
    fn coze_base64_image_is_flagged_for_upload() {
        let mut req = request("");
        req.image_urls = vec!["QUFB".repeat(40)];

        let payload = CozePayload::from_request(&req, "bot-1", None);
        let parts: serde_json::Value =
            serde_json::from_str(&payload.additional_messages[0].content).unwrap();
        assert_eq!(parts[0]["need_upload"], true);
        assert!(parts[0]["base64"].as_str().unwrap().starts_with("QUFB"));
    }

    #[test]
    fn coze_contexts_are_prepended() {
        let mut req = request("current");
        req.contexts = vec![serde_json::json!({
            "role": "assistant",
            "content": "earlier reply",
            "content_type": "text",
        })];

        let payload = CozePayload::from_request(&req, "bot-1", None);
        assert_eq!(payload.additional_messages.len(), 2);
        assert_eq!(payload.additional_messages[0].role, "assistant");
        assert_eq!(payload.additional_messages[1].content, "current");
    }
}
