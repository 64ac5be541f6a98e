//! Per-backend decoding of one streamed event into the shared shape the
//! assembler folds.

use serde::Deserialize;

/// How a decoded event updates the running reply text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TextUpdate {
    /// Self-sufficient fragment; extend the buffer.
    Append(String),
    /// Full content so far; overwrite the buffer. Folding these as appends
    /// would double-count.
    Replace(String),
}

/// Backend-agnostic view of one streamed event.
#[derive(Debug, Clone, Default)]
pub struct AgentEvent {
    pub text: Option<TextUpdate>,
    pub image_urls: Vec<String>,
    pub conversation_id: Option<String>,
    pub message_id: Option<String>,
}

/// Decode one Dify SSE data frame. Dify streams cumulative deltas: every
/// `answer` fragment appends. Returns `None` on an undecodable frame.
pub fn parse_dify_event(data: &str) -> Option<AgentEvent> {
    let frame: DifyFrame = serde_json::from_str(data).ok()?;

    let mut event = AgentEvent {
        text: frame.answer.map(TextUpdate::Append),
        conversation_id: frame.conversation_id.filter(|v| !v.is_empty()),
        message_id: frame.message_id.filter(|v| !v.is_empty()),
        ..AgentEvent::default()
    };

    for file in frame.files {
        if file.kind.as_deref() == Some("image") {
            if let Some(url) = file.url {
                event.image_urls.push(url);
            }
        }
    }

    Some(event)
}

/// Decode one Coze SSE data frame. A `delta.content` fragment appends; a
/// completed message's top-level `content` replaces the buffer (it carries
/// the full text so far). Returns `None` on an undecodable frame.
pub fn parse_coze_event(data: &str) -> Option<AgentEvent> {
    let frame: CozeFrame = serde_json::from_str(data).ok()?;

    let text = match (frame.delta.and_then(|d| d.content), frame.content) {
        (Some(delta), _) => Some(TextUpdate::Append(delta)),
        (None, Some(full)) => Some(TextUpdate::Replace(full)),
        (None, None) => None,
    };

    Some(AgentEvent {
        text,
        image_urls: Vec::new(),
        conversation_id: frame.conversation_id.filter(|v| !v.is_empty()),
        message_id: frame.message_id.filter(|v| !v.is_empty()),
    })
}

// Wire frames (private — deserialization only)

#[derive(Deserialize)]
struct DifyFrame {
    answer: Option<String>,
    conversation_id: Option<String>,
    message_id: Option<String>,
    #[serde(default)]
    files: Vec<DifyFileRef>,
}

#[derive(Deserialize)]
struct DifyFileRef {
    #[serde(rename = "type")]
    kind: Option<String>,
    url: Option<String>,
}

#[derive(Deserialize)]
struct CozeFrame {
    content: Option<String>,
    delta: Option<CozeDelta>,
    conversation_id: Option<String>,
    message_id: Option<String>,
}

#[derive(Deserialize)]
struct CozeDelta {
    content: Option<String>,
}
