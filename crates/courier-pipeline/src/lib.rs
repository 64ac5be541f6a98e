pub mod pipeline;
pub mod sender;

pub use pipeline::Pipeline;
pub use sender::{DispatchError, PlatformSender, SenderRegistry};
