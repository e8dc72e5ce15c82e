use crate::agent::loop_::DEFAULT_MODEL;
use crate::agent::transfer::DEFAULT_MAX_TRANSFER_DEPTH;
use crate::providers::factory::OLLAMA_API_KEY;
use crate::providers::openai::DEFAULT_TIMEOUT_SECS;
use crate::sandbox::SandboxOptions;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

const TANDEM_DIR: &str = ".tandem";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct SandboxConfig {
    pub restrict_builtins: bool,
    /// Wall-clock limit per execution; 0 disables it.
    pub timeout_ms: u64,
    pub max_call_depth: usize,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        let options = SandboxOptions::default();
        Self {
            restrict_builtins: options.restrict_builtins,
            timeout_ms: options
                .timeout
                .map(|t| u64::try_from(t.as_millis()).unwrap_or(u64::MAX))
                .unwrap_or(0),
            max_call_depth: options.max_call_depth,
        }
    }
}

impl From<&SandboxConfig> for SandboxOptions {
    fn from(config: &SandboxConfig) -> Self {
        Self {
            restrict_builtins: config.restrict_builtins,
            timeout: (config.timeout_ms > 0).then(|| Duration::from_millis(config.timeout_ms)),
            max_call_depth: config.max_call_depth,
            cancel: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    pub provider: String,
    pub api_key: String,
    pub base_url: Option<String>,
    pub model: String,
    pub temperature: Option<f64>,
    pub request_timeout_secs: u64,
    pub system_prompt_path: Option<PathBuf>,
    pub max_transfer_depth: usize,
    #[serde(default)]
    pub sandbox: SandboxConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            provider: "ollama".to_string(),
            api_key: OLLAMA_API_KEY.to_string(),
            base_url: None,
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            request_timeout_secs: DEFAULT_TIMEOUT_SECS,
            system_prompt_path: None,
            max_transfer_depth: DEFAULT_MAX_TRANSFER_DEPTH,
            sandbox: SandboxConfig::default(),
        }
    }
}

pub fn get_tandem_dir() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    PathBuf::from(home).join(TANDEM_DIR)
}

pub fn get_config_path() -> PathBuf {
    get_tandem_dir().join("config.toml")
}

pub fn ensure_tandem_dir() -> Result<PathBuf> {
    let tandem_dir = get_tandem_dir();

    if !tandem_dir.exists() {
        std::fs::create_dir_all(&tandem_dir).with_context(|| {
            format!(
                "Failed to create tandem directory at {}",
                tandem_dir.display()
            )
        })?;
    }

    Ok(tandem_dir)
}

impl Config {
    pub fn load_or_init() -> Result<Self> {
        let mut config = if config_exists() {
            load_config()?
        } else {
            Config::default()
        };
        config.apply_env();
        Ok(config)
    }

    pub fn apply_env(&mut self) {
        self.apply_env_from(|name| std::env::var(name).ok());
    }

    pub fn apply_env_from(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        let get = |name: &str| lookup(name).filter(|value| !value.trim().is_empty());

        if let Some(provider) = get("TANDEM_PROVIDER") {
            self.provider = provider;
        }
        if let Some(model) = get("TANDEM_MODEL") {
            self.model = model;
        }
        if let Some(base_url) = get("TANDEM_BASE_URL") {
            self.base_url = Some(base_url);
        }
        if let Some(api_key) = get("TANDEM_API_KEY") {
            self.api_key = api_key;
        }
        if let Some(path) = get("TANDEM_SYSTEM_PROMPT") {
            self.system_prompt_path = Some(PathBuf::from(path));
        }
    }
}

pub fn load_config() -> Result<Config> {
    let config_path = get_config_path();
    load_config_from(&config_path).map_err(|e| {
        if !config_path.exists() {
            anyhow::anyhow!(
                "Config file not found. Run 'tandem onboard' to set up your configuration."
            )
        } else {
            e
        }
    })
}

pub fn load_config_from(config_path: &Path) -> Result<Config> {
    let content = std::fs::read_to_string(config_path)
        .with_context(|| format!("Failed to read config from {}", config_path.display()))?;

    toml::from_str(&content)
        .with_context(|| format!("Failed to parse config from {}", config_path.display()))
}

pub fn save_config(config: &Config) -> Result<()> {
    ensure_tandem_dir()?;
    save_config_to(config, &get_config_path())
}

pub fn save_config_to(config: &Config, config_path: &Path) -> Result<()> {
    let content =
        toml::to_string_pretty(config).with_context(|| "Failed to serialize config to TOML")?;

    std::fs::write(config_path, content)
        .with_context(|| format!("Failed to write config to {}", config_path.display()))?;

    Ok(())
}

pub fn config_exists() -> bool {
    get_config_path().exists()
}
