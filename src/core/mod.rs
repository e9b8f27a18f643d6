pub mod relay;
pub mod tool_loop;

pub use crate::domain::model::{BackgroundTask, ChatMessage, RelayRequest, ToolCall};
pub use crate::domain::ports::{InferenceBackend, Tool, ToolExecutor};
pub use crate::utils::error::Result;
pub use relay::{RelayBody, RelayResponse, RelayService, RelaySettings};
pub use tool_loop::{ToolCallingChat, ToolLoopSettings};
