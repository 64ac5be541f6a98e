pub mod assemble;
pub mod client;
pub mod coze;
pub mod dify;
pub mod event;
pub mod payload;

pub use assemble::{StreamAssembler, FALLBACK_REPLY};
pub use client::{AgentClient, AgentError};
pub use coze::CozeClient;
pub use dify::DifyClient;
