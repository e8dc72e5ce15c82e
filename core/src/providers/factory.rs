use crate::config::Config;
use crate::error::{Error, Result};
use crate::providers::OpenAIProvider;
use crate::traits::Provider;
use std::sync::Arc;
use std::time::Duration;

pub const PROVIDERS: &[&str] = &["openai", "ollama", "openrouter"];

pub const OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
pub const OLLAMA_BASE_URL: &str = "http://localhost:11434/v1";
pub const OPENROUTER_BASE_URL: &str = "https://openrouter.ai/api/v1";

/// Key stored for local ollama setups; never sent to a hosted provider.
pub const OLLAMA_API_KEY: &str = "ollama";

pub fn create_provider(name: &str, config: &Config) -> Result<Arc<dyn Provider>> {
    let name = name.trim().to_lowercase();
    let (default_base_url, api_key) = match name.as_str() {
        "openai" => (
            OPENAI_BASE_URL,
            resolve_api_key_with_fallback(
                &["OPENAI_API_KEY", "TANDEM_OPENAI_API_KEY"],
                hosted_key(&config.api_key),
            )
            .ok_or_else(|| Error::config("No API key found for openai"))?,
        ),
        "openrouter" => (
            OPENROUTER_BASE_URL,
            resolve_api_key_with_fallback(
                &["OPENROUTER_API_KEY", "TANDEM_OPENROUTER_API_KEY"],
                hosted_key(&config.api_key),
            )
            .ok_or_else(|| Error::config("No API key found for openrouter"))?,
        ),
        "ollama" => (
            OLLAMA_BASE_URL,
            resolve_api_key_with_fallback(&["TANDEM_OLLAMA_API_KEY"], &config.api_key)
                .unwrap_or_else(|| OLLAMA_API_KEY.to_string()),
        ),
        _ => {
            return Err(Error::config(format!(
                "Unknown provider: {name}. Available: {}",
                PROVIDERS.join(", ")
            )));
        }
    };

    let base_url = config
        .base_url
        .clone()
        .unwrap_or_else(|| default_base_url.to_string());

    let provider = OpenAIProvider::new(api_key)
        .with_name(name)
        .with_base_url(base_url)
        .with_temperature(config.temperature)
        .with_timeout(Duration::from_secs(config.request_timeout_secs));
    Ok(Arc::new(provider))
}

pub fn provider_from_config(config: &Config) -> Result<Arc<dyn Provider>> {
    create_provider(&config.provider, config)
}

fn hosted_key(config_key: &str) -> &str {
    if config_key == OLLAMA_API_KEY { "" } else { config_key }
}

fn resolve_api_key_with_fallback(env_vars: &[&str], config_key: &str) -> Option<String> {
    env_vars
        .iter()
        .find_map(|var_name| std::env::var(var_name).ok().filter(|key| !key.is_empty()))
        .or_else(|| (!config_key.is_empty()).then(|| config_key.to_string()))
}
