pub mod provider;
pub mod tool;

pub use provider::{Message, Provider, Role};
pub use tool::{Parameter, Tool, ToolSpec, TypeTag};
