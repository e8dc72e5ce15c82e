pub mod agent;
pub mod config;
pub mod error;
pub mod providers;
pub mod sandbox;
pub mod tools;
pub mod traits;

pub use agent::{Agent, AgentBuilder, ChatEntry, History, TRANSFER_TOOL_NAME, ToolRegistry};
pub use config::{Config, SandboxConfig};
pub use error::{Error, Result};
pub use providers::{OpenAIProvider, ScriptedProvider, create_provider, provider_from_config};
pub use sandbox::{
    ContextVariables, ExecutionResult, FunctionResult, SandboxOptions, Value, correlate, execute,
    extract,
};
pub use tools::{FnTool, ToolArgs};
pub use traits::*;
