use std::collections::HashMap;

use base64::Engine;
use courier_core::types::MessageType;

use crate::types::{
    AgentRequest, AgentResponse, UnifiedMessage, META_ADDITIONAL_IMAGES, META_CONVERSATION_ID,
    META_IMAGE_KEY, META_MEDIA_ID, META_PLATFORM,
};

/// Image data URI marker.
pub const DATA_URI_PREFIX: &str = "data:image/";
/// Prefix applied to bare base64 image content during normalization.
const DEFAULT_DATA_URI_PREFIX: &str = "data:image/png;base64,";
/// Anything longer than this without a URL scheme is treated as bare base64.
/// A length threshold, not content sniffing; misclassification of very long
/// plain text is accepted.
const BARE_BASE64_MIN_LEN: usize = 100;

/// Strict check for an agent-issued conversation identifier: canonical
/// 8-4-4-4-12 hexadecimal grouped form, case-insensitive. Platform chat
/// handles (e.g. Lark `oc_...`) never match and must be treated as absent.
pub fn is_conversation_uuid(s: &str) -> bool {
    uuid::Uuid::try_parse(s)
        .map(|u| u.as_hyphenated().to_string() == s.to_ascii_lowercase())
        .unwrap_or(false)
}

/// Direction-aware translator between the unified model, the agent
/// request/response shapes, and platform formatting rules.
///
/// Stateless pure logic, freely shared across concurrent tasks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Converter;

impl Converter {
    pub fn new() -> Self {
        Self
    }

    /// Build the agent-agnostic request for an inbound message.
    ///
    /// Metadata is carried forward field-by-field, except that a
    /// `conversation_id` in a shape the agent did not issue is dropped so
    /// the backend starts a fresh conversation instead of erroring.
    pub fn to_agent_request(&self, msg: &UnifiedMessage) -> AgentRequest {
        let mut req = AgentRequest {
            query: msg.content.clone(),
            session_id: msg.session_id.clone(),
            user_id: msg.user_id.clone(),
            ..AgentRequest::default()
        };

        for (k, v) in &msg.metadata {
            if k == META_CONVERSATION_ID && !is_conversation_uuid(v) {
                continue;
            }
            req.metadata.insert(k.clone(), v.clone());
        }

        if msg.message_type == MessageType::Image {
            if is_inline_image(&msg.content) {
                if let Some(image) = extract_base64_image(&msg.content) {
                    req.image_urls.push(image);
                }
            } else if msg.content.starts_with("http") {
                req.image_urls.push(msg.content.clone());
            }

            // A WeCom media handle cannot be resolved here; carry it (tagged
            // with its platform) for the media collaborator to download.
            if let Some(media_id) = msg.meta(META_MEDIA_ID) {
                req.metadata
                    .insert(META_MEDIA_ID.to_string(), media_id.to_string());
                req.metadata
                    .insert(META_PLATFORM.to_string(), msg.platform.as_str().to_string());
            }
        }

        // Lark delivers image content piggybacked on a text event with an
        // image_key: the content itself is the base64 payload.
        if msg.message_type == MessageType::Text
            && msg.meta(META_IMAGE_KEY).is_some()
            && is_inline_image(&msg.content)
        {
            req.image_urls.push(msg.content.clone());
        }

        req
    }

    /// Turn an agent response into the reply message for the originating
    /// session. Text unless images are present; extra images ride along in
    /// `additional_images` metadata, comma-joined.
    pub fn from_agent_response(
        &self,
        resp: &AgentResponse,
        original: &UnifiedMessage,
    ) -> UnifiedMessage {
        let mut msg = UnifiedMessage {
            platform: original.platform,
            session_id: original.session_id.clone(),
            user_id: original.user_id.clone(),
            content: resp.content.clone(),
            message_type: MessageType::Text,
            metadata: resp.metadata.clone(),
            timestamp: None,
        };

        if let Some((first, rest)) = resp.image_urls.split_first() {
            msg.message_type = MessageType::Image;
            msg.content = first.clone();
            if !rest.is_empty() {
                msg.metadata
                    .insert(META_ADDITIONAL_IMAGES.to_string(), rest.join(","));
            }
        }

        msg
    }

    /// Canonicalize content in place.
    ///
    /// Text: trim surrounding whitespace, fold all line-ending variants to
    /// `\n`. Image: bare base64 gets a data-URI prefix so downstream
    /// consumers see a uniform data-URI-or-URL.
    pub fn normalize_content(&self, msg: &mut UnifiedMessage) {
        match msg.message_type {
            MessageType::Text => {
                msg.content = msg
                    .content
                    .trim()
                    .replace("\r\n", "\n")
                    .replace('\r', "\n");
            }
            MessageType::Image => {
                if !msg.content.starts_with("http")
                    && !msg.content.starts_with(DATA_URI_PREFIX)
                    && msg.content.len() > BARE_BASE64_MIN_LEN
                {
                    msg.content = format!("{DEFAULT_DATA_URI_PREFIX}{}", msg.content);
                }
            }
            _ => {}
        }
    }

    /// Merge a burst of messages into one. Text content concatenates in
    /// order; platform/session/user come from the first element; metadata
    /// merges first-seen-wins. Empty input yields `None`, a singleton is
    /// returned unchanged.
    pub fn merge_messages(&self, messages: Vec<UnifiedMessage>) -> Option<UnifiedMessage> {
        if messages.len() <= 1 {
            return messages.into_iter().next();
        }

        let mut content = String::new();
        for msg in &messages {
            if msg.is_text() {
                content.push_str(&msg.content);
            }
        }

        let mut metadata = HashMap::new();
        for msg in &messages {
            for (k, v) in &msg.metadata {
                metadata.entry(k.clone()).or_insert_with(|| v.clone());
            }
        }

        let first = &messages[0];
        Some(UnifiedMessage {
            platform: first.platform,
            session_id: first.session_id.clone(),
            user_id: first.user_id.clone(),
            content,
            message_type: MessageType::Text,
            metadata,
            timestamp: None,
        })
    }
}

/// Whether content is inline image data: a data URI, or a long opaque blob
/// without an http scheme.
pub fn is_inline_image(content: &str) -> bool {
    content.starts_with(DATA_URI_PREFIX)
        || (content.len() > BARE_BASE64_MIN_LEN && !content.starts_with("http"))
}

/// Extract the raw base64 payload from image content, or `None` when the
/// shape is unrecognized (the message then proceeds text-only).
fn extract_base64_image(content: &str) -> Option<String> {
    if let Some(rest) = content.strip_prefix(DATA_URI_PREFIX) {
        return rest.split_once(',').map(|(_, payload)| payload.to_string());
    }

    if content.len() > BARE_BASE64_MIN_LEN
        && base64::engine::general_purpose::STANDARD
            .decode(content)
            .is_ok()
    {
        return Some(content.to_string());
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use courier_core::types::Platform;

    const UUID: &str = "550e8400-e29b-41d4-a716-446655440000";

    fn text_msg(content: &str) -> UnifiedMessage {
        UnifiedMessage::text(Platform::Lark, "s1", "u1", content)
    }

    #[test]
    fn uuid_check_accepts_canonical_form_only() {
        assert!(is_conversation_uuid(UUID));
        assert!(is_conversation_uuid(&UUID.to_uppercase()));

        assert!(!is_conversation_uuid("not-a-uuid"));
        assert!(!is_conversation_uuid("oc_92fa1f28b3c5"));
        // ungrouped and braced forms are not what the backend issues
        assert!(!is_conversation_uuid("550e8400e29b41d4a716446655440000"));
        assert!(!is_conversation_uuid("{550e8400-e29b-41d4-a716-446655440000}"));
        assert!(!is_conversation_uuid(""));
    }

    #[test]
    fn invalid_conversation_id_is_dropped() {
        let mut msg = text_msg("hello");
        msg.metadata
            .insert(META_CONVERSATION_ID.to_string(), "not-a-uuid".to_string());
        msg.metadata.insert("other".to_string(), "kept".to_string());

        let req = Converter::new().to_agent_request(&msg);
        assert!(!req.metadata.contains_key(META_CONVERSATION_ID));
        assert_eq!(req.metadata.get("other").map(String::as_str), Some("kept"));
    }

    #[test]
    fn valid_conversation_id_is_preserved() {
        let mut msg = text_msg("hello");
        msg.metadata
            .insert(META_CONVERSATION_ID.to_string(), UUID.to_string());

        let req = Converter::new().to_agent_request(&msg);
        assert_eq!(
            req.metadata.get(META_CONVERSATION_ID).map(String::as_str),
            Some(UUID)
        );
    }

    #[test]
    fn data_uri_image_yields_bare_payload() {
        let msg = UnifiedMessage::image(Platform::Lark, "s1", "u1", "data:image/png;base64,AAAA");
        let req = Converter::new().to_agent_request(&msg);
        assert_eq!(req.image_urls, vec!["AAAA".to_string()]);
    }

    #[test]
    fn url_image_passes_through() {
        let msg = UnifiedMessage::image(Platform::Lark, "s1", "u1", "https://cdn.example/pic.png");
        let req = Converter::new().to_agent_request(&msg);
        assert_eq!(req.image_urls, vec!["https://cdn.example/pic.png".to_string()]);
    }

    #[test]
    fn bare_base64_image_passes_through() {
        let blob = "QUFB".repeat(40); // valid base64, > 100 chars
        let msg = UnifiedMessage::image(Platform::WeCom, "s1", "u1", blob.clone());
        let req = Converter::new().to_agent_request(&msg);
        assert_eq!(req.image_urls, vec![blob]);
    }

    #[test]
    fn unrecognized_image_shape_yields_no_image() {
        // short and not a URL or data URI: proceeds text-only
        let msg = UnifiedMessage::image(Platform::WeCom, "s1", "u1", "???");
        let req = Converter::new().to_agent_request(&msg);
        assert!(req.image_urls.is_empty());
    }

    #[test]
    fn media_handle_is_carried_with_platform_tag() {
        let mut msg = UnifiedMessage::image(Platform::WeCom, "s1", "u1", "");
        msg.metadata
            .insert(META_MEDIA_ID.to_string(), "3a8f".to_string());

        let req = Converter::new().to_agent_request(&msg);
        assert_eq!(req.metadata.get(META_MEDIA_ID).map(String::as_str), Some("3a8f"));
        assert_eq!(req.metadata.get(META_PLATFORM).map(String::as_str), Some("wecom"));
    }

    #[test]
    fn text_with_image_key_piggybacks_inline_image() {
        let mut msg = text_msg("data:image/jpeg;base64,BBBB");
        msg.metadata
            .insert(META_IMAGE_KEY.to_string(), "img_v3_x".to_string());

        let req = Converter::new().to_agent_request(&msg);
        assert_eq!(req.image_urls, vec!["data:image/jpeg;base64,BBBB".to_string()]);
    }

    #[test]
    fn response_without_images_maps_to_text() {
        let resp = AgentResponse {
            content: "hello".to_string(),
            ..AgentResponse::default()
        };
        let reply = Converter::new().from_agent_response(&resp, &text_msg("hi"));
        assert_eq!(reply.message_type, MessageType::Text);
        assert_eq!(reply.content, "hello");
        assert_eq!(reply.platform, Platform::Lark);
        assert_eq!(reply.session_id, "s1");
    }

    #[test]
    fn response_images_promote_first_and_stash_rest() {
        let resp = AgentResponse {
            content: "see images".to_string(),
            image_urls: vec!["a".to_string(), "b".to_string(), "c".to_string()],
            ..AgentResponse::default()
        };
        let reply = Converter::new().from_agent_response(&resp, &text_msg("hi"));
        assert_eq!(reply.message_type, MessageType::Image);
        assert_eq!(reply.content, "a");
        assert_eq!(
            reply.metadata.get(META_ADDITIONAL_IMAGES).map(String::as_str),
            Some("b,c")
        );
    }

    #[test]
    fn normalize_trims_and_folds_line_endings() {
        let mut msg = text_msg("  hello\r\nworld  ");
        Converter::new().normalize_content(&mut msg);
        assert_eq!(msg.content, "hello\nworld");

        let mut msg = text_msg("a\rb\r\nc");
        Converter::new().normalize_content(&mut msg);
        assert_eq!(msg.content, "a\nb\nc");
    }

    #[test]
    fn normalized_content_flows_into_the_query() {
        let mut msg = text_msg("  hello\r\nworld  ");
        let conv = Converter::new();
        conv.normalize_content(&mut msg);
        let req = conv.to_agent_request(&msg);
        assert_eq!(req.query, "hello\nworld");
        assert_eq!(req.session_id, "s1");
        assert_eq!(req.user_id, "u1");
    }

    #[test]
    fn normalize_prefixes_bare_base64_images() {
        let blob = "QUFB".repeat(40);
        let mut msg = UnifiedMessage::image(Platform::Lark, "s1", "u1", blob.clone());
        Converter::new().normalize_content(&mut msg);
        assert_eq!(msg.content, format!("data:image/png;base64,{blob}"));

        // URLs and data URIs are left alone
        let mut msg = UnifiedMessage::image(Platform::Lark, "s1", "u1", "https://x/y.png");
        Converter::new().normalize_content(&mut msg);
        assert_eq!(msg.content, "https://x/y.png");
    }

    #[test]
    fn merge_empty_and_singleton() {
        let conv = Converter::new();
        assert!(conv.merge_messages(vec![]).is_none());

        let single = text_msg("only");
        let merged = conv.merge_messages(vec![single.clone()]).unwrap();
        assert_eq!(merged.content, "only");
        assert_eq!(merged.session_id, single.session_id);
    }

    #[test]
    fn merge_concatenates_text_in_order_with_first_seen_metadata() {
        let mut m1 = text_msg("Hello, ");
        m1.metadata.insert("k".to_string(), "first".to_string());
        let mut m2 = text_msg("world");
        m2.metadata.insert("k".to_string(), "second".to_string());
        m2.metadata.insert("extra".to_string(), "v".to_string());

        let merged = Converter::new().merge_messages(vec![m1, m2]).unwrap();
        assert_eq!(merged.content, "Hello, world");
        assert_eq!(merged.metadata.get("k").map(String::as_str), Some("first"));
        assert_eq!(merged.metadata.get("extra").map(String::as_str), Some("v"));
    }

    #[test]
    fn merge_skips_non_text_content() {
        let m1 = text_msg("caption: ");
        let img = UnifiedMessage::image(Platform::Lark, "s1", "u1", "https://x/y.png");
        let m3 = text_msg("done");

        let merged = Converter::new().merge_messages(vec![m1, img, m3]).unwrap();
        assert_eq!(merged.content, "caption: done");
        assert_eq!(merged.message_type, MessageType::Text);
    }
}
