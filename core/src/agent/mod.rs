pub mod history;
pub mod loop_;
pub mod prompt;
pub mod registry;
pub mod transfer;

pub use history::{ChatEntry, History};
pub use loop_::{Agent, AgentBuilder};
pub use prompt::PromptBuilder;
pub use registry::ToolRegistry;
pub use transfer::{TRANSFER_TOOL_NAME, TeamRegistry, TransferTool};
