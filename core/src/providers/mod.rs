pub mod factory;
pub mod openai;
pub mod scripted;

pub use factory::{create_provider, provider_from_config};
pub use openai::OpenAIProvider;
pub use scripted::ScriptedProvider;
