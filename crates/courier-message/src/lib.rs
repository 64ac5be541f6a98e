pub mod chunk;
pub mod convert;
pub mod queue;
pub mod types;

pub use chunk::{split_long_text, DEFAULT_CHUNK_LIMIT};
pub use convert::{is_conversation_uuid, is_inline_image, Converter};
pub use queue::{MessageQueue, QueueHandle};
pub use types::{AgentRequest, AgentResponse, UnifiedMessage};
