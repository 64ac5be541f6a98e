//! Folds a server-pushed event stream into one completed response.
//!
//! Both backends speak newline-delimited SSE: a `data: `-prefixed frame
//! carries one JSON event or the terminal `[DONE]` sentinel. Dify emits one
//! self-contained event per data line; Coze batches `event:`/`data:` line
//! pairs and signals "flush now" with a blank line.

use futures_util::StreamExt;
use tracing::warn;

use courier_message::types::{AgentResponse, META_CONVERSATION_ID, META_MESSAGE_ID};

use crate::client::AgentError;
use crate::event::{AgentEvent, TextUpdate};

/// Reply substituted when a stream terminates with no text and no images.
/// Callers never receive a response that is empty on both axes.
pub const FALLBACK_REPLY: &str = "Sorry, I was unable to understand the request.";

const DATA_PREFIX: &str = "data: ";
const DONE_SENTINEL: &str = "[DONE]";

/// How data frames are delimited on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameMode {
    /// Every `data:` line is a complete event (Dify).
    PerLine,
    /// A blank line flushes the most recent `data:` line (Coze).
    Batched,
}

/// Accumulator for one in-flight response.
#[derive(Debug, Default)]
pub struct StreamAssembler {
    content: String,
    image_urls: Vec<String>,
    conversation_id: Option<String>,
    message_id: Option<String>,
}

impl StreamAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one decoded event into the running state.
    ///
    /// Append updates extend the buffer, replace updates overwrite it (the
    /// event carried the full content so far). The first non-empty
    /// conversation/message identifier wins; later events never clear it.
    pub fn fold(&mut self, event: AgentEvent) {
        match event.text {
            Some(TextUpdate::Append(fragment)) => self.content.push_str(&fragment),
            Some(TextUpdate::Replace(full)) => self.content = full,
            None => {}
        }

        self.image_urls.extend(event.image_urls);

        if self.conversation_id.is_none() {
            self.conversation_id = event.conversation_id;
        }
        if self.message_id.is_none() {
            self.message_id = event.message_id;
        }
    }

    /// Finish the stream and produce the response, substituting the fixed
    /// fallback reply when nothing accumulated.
    pub fn finish(self) -> AgentResponse {
        let mut resp = AgentResponse {
            content: self.content,
            image_urls: self.image_urls,
            ..AgentResponse::default()
        };

        if resp.content.is_empty() && resp.image_urls.is_empty() {
            resp.content = FALLBACK_REPLY.to_string();
        }

        if let Some(cid) = self.conversation_id {
            resp.metadata.insert(META_CONVERSATION_ID.to_string(), cid);
        }
        if let Some(mid) = self.message_id {
            resp.metadata.insert(META_MESSAGE_ID.to_string(), mid);
        }

        resp
    }
}

/// Drain an SSE response body into one [`AgentResponse`].
///
/// A frame that fails to decode is skipped; a transport failure mid-stream
/// is fatal for the request.
pub async fn collect_stream<P>(
    resp: reqwest::Response,
    mode: FrameMode,
    parse: P,
) -> Result<AgentResponse, AgentError>
where
    P: Fn(&str) -> Option<AgentEvent>,
{
    let mut assembler = StreamAssembler::new();
    let mut line_buf = String::new();
    // Batched mode: the data frame waiting for its blank-line flush.
    let mut pending: Option<String> = None;
    let mut done = false;

    let mut byte_stream = resp.bytes_stream();

    while let Some(chunk) = byte_stream.next().await {
        let chunk = chunk.map_err(AgentError::Http)?;

        let text = match std::str::from_utf8(&chunk) {
            Ok(t) => t,
            Err(_) => continue,
        };

        // frames arrive split across chunks; keep the incomplete tail buffered
        line_buf.push_str(text);
        let lines: Vec<&str> = line_buf.split('\n').collect();
        let (complete, remainder) = lines.split_at(lines.len() - 1);
        let remainder = remainder.first().unwrap_or(&"").to_string();

        for line in complete {
            let line = line.trim();

            if line.is_empty() {
                if mode == FrameMode::Batched {
                    flush(&mut assembler, &mut pending, &parse);
                }
                continue;
            }

            let Some(data) = line.strip_prefix(DATA_PREFIX) else {
                // event-name and comment lines carry no payload
                continue;
            };

            if data == DONE_SENTINEL {
                done = true;
                break;
            }

            match mode {
                FrameMode::PerLine => match parse(data) {
                    Some(event) => assembler.fold(event),
                    None => warn!(frame = %data, "skipping undecodable stream frame"),
                },
                FrameMode::Batched => pending = Some(data.to_string()),
            }
        }

        if done {
            break;
        }
        line_buf = remainder;
    }

    // a stream may end without a trailing blank line
    flush(&mut assembler, &mut pending, &parse);

    Ok(assembler.finish())
}

fn flush<P>(assembler: &mut StreamAssembler, pending: &mut Option<String>, parse: &P)
where
    P: Fn(&str) -> Option<AgentEvent>,
{
    if let Some(data) = pending.take() {
        match parse(&data) {
            Some(event) => assembler.fold(event),
            None => warn!(frame = %data, "skipping undecodable stream frame"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn append(text: &str) -> AgentEvent {
        AgentEvent {
            text: Some(TextUpdate::Append(text.to_string())),
            ..AgentEvent::default()
        }
    }

    #[test]
    fn empty_stream_yields_fallback_reply() {
        let resp = StreamAssembler::new().finish();
        assert_eq!(resp.content, FALLBACK_REPLY);
        assert!(resp.image_urls.is_empty());
    }

    #[test]
    fn images_without_text_suppress_the_fallback() {
        let mut assembler = StreamAssembler::new();
        assembler.fold(AgentEvent {
            image_urls: vec!["https://x/a.png".to_string()],
            ..AgentEvent::default()
        });
        let resp = assembler.finish();
        assert!(resp.content.is_empty());
        assert_eq!(resp.image_urls.len(), 1);
    }

    #[test]
    fn appends_accumulate_in_order() {
        let mut assembler = StreamAssembler::new();
        assembler.fold(append("Hel"));
        assembler.fold(append("lo"));
        assert_eq!(assembler.finish().content, "Hello");
    }

    #[test]
    fn replace_never_double_counts() {
        let mut assembler = StreamAssembler::new();
        assembler.fold(append("Hel"));
        assembler.fold(append("lo"));
        // completed-message frame carries the full content so far
        assembler.fold(AgentEvent {
            text: Some(TextUpdate::Replace("Hello".to_string())),
            ..AgentEvent::default()
        });
        assert_eq!(assembler.finish().content, "Hello");
    }

    #[test]
    fn first_seen_identifier_is_retained() {
        let mut assembler = StreamAssembler::new();
        assembler.fold(AgentEvent {
            conversation_id: Some("c1".to_string()),
            ..AgentEvent::default()
        });
        assembler.fold(AgentEvent {
            conversation_id: Some("c2".to_string()),
            message_id: Some("m1".to_string()),
            ..AgentEvent::default()
        });

        let resp = assembler.finish();
        assert_eq!(resp.metadata.get(META_CONVERSATION_ID).map(String::as_str), Some("c1"));
        assert_eq!(resp.metadata.get(META_MESSAGE_ID).map(String::as_str), Some("m1"));
    }
}
