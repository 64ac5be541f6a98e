use serde::{Deserialize, Serialize};
use std::fmt;

/// Chat platform a message originated from (and is replied to).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Platform {
    /// Lark / Feishu. Event-subscription (WebSocket) delivery.
    Lark,
    /// WeCom (WeChat Work). Callback-webhook delivery, with a hard message
    /// length ceiling on sends.
    WeCom,
}

impl Platform {
    pub fn as_str(&self) -> &'static str {
        match self {
            Platform::Lark => "lark",
            Platform::WeCom => "wecom",
        }
    }
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Platform {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "lark" => Ok(Platform::Lark),
            "wecom" => Ok(Platform::WeCom),
            other => Err(format!("unknown platform: {}", other)),
        }
    }
}

/// What the `content` field of a message carries.
///
/// Content semantics are fully determined by this tag: a `Text` message
/// carries prose, an `Image` message carries a URL, a `data:image/...`
/// URI, or a bare base64 blob, never prose.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MessageType {
    Text,
    Image,
    Voice,
    File,
    Video,
}

impl MessageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageType::Text => "text",
            MessageType::Image => "image",
            MessageType::Voice => "voice",
            MessageType::File => "file",
            MessageType::Video => "video",
        }
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for MessageType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(MessageType::Text),
            "image" => Ok(MessageType::Image),
            "voice" => Ok(MessageType::Voice),
            "file" => Ok(MessageType::File),
            "video" => Ok(MessageType::Video),
            other => Err(format!("unknown message type: {}", other)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn platform_round_trips() {
        for p in [Platform::Lark, Platform::WeCom] {
            assert_eq!(p.as_str().parse::<Platform>().unwrap(), p);
        }
        assert!("slack".parse::<Platform>().is_err());
    }

    #[test]
    fn message_type_round_trips() {
        for t in [
            MessageType::Text,
            MessageType::Image,
            MessageType::Voice,
            MessageType::File,
            MessageType::Video,
        ] {
            assert_eq!(t.as_str().parse::<MessageType>().unwrap(), t);
        }
        assert!("sticker".parse::<MessageType>().is_err());
    }

    #[test]
    fn serde_uses_lowercase_tags() {
        assert_eq!(
            serde_json::to_string(&Platform::WeCom).unwrap(),
            "\"wecom\""
        );
        assert_eq!(
            serde_json::to_string(&MessageType::Image).unwrap(),
            "\"image\""
        );
    }
}
