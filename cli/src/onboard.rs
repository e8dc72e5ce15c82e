use anyhow::{Context, Result};
use console::style;
use dialoguer::{Input, Select};
use tandem_core::config::{self, Config};
use tandem_core::providers::factory::{OLLAMA_API_KEY, PROVIDERS};

const BANNER: &str = r"
    -------------------------------------
      t a n d e m
      agents that write code, together
    -------------------------------------
";

fn print_step(step: usize, total: usize, title: &str) {
    println!();
    println!(
        "{}",
        style(format!("[{}/{}] {}", step, total, title))
            .cyan()
            .bold()
    );
    println!();
}

fn setup_provider() -> Result<String> {
    let selection = Select::new()
        .with_prompt("Select your provider")
        .items(PROVIDERS)
        .default(PROVIDERS.iter().position(|p| *p == "ollama").unwrap_or(0))
        .interact()
        .context("Failed to select provider")?;

    Ok(PROVIDERS[selection].to_string())
}

fn setup_api_key(provider: &str) -> Result<String> {
    if provider == "ollama" {
        return Ok(OLLAMA_API_KEY.to_string());
    }

    let api_key: String = Input::new()
        .with_prompt(format!("Enter your {provider} API key"))
        .interact_text()
        .context("Failed to read API key")?;

    if api_key.is_empty() {
        return Err(anyhow::anyhow!("API key cannot be empty"));
    }

    Ok(api_key)
}

fn setup_model(provider: &str) -> Result<String> {
    let default = match provider {
        "openai" => "gpt-4o-mini",
        "openrouter" => "qwen/qwen-2.5-coder-32b-instruct",
        _ => tandem_core::agent::loop_::DEFAULT_MODEL,
    };

    Input::new()
        .with_prompt("Model")
        .default(default.to_string())
        .interact_text()
        .context("Failed to read model")
}

fn setup_base_url() -> Result<Option<String>> {
    let base_url: String = Input::new()
        .with_prompt("Base URL (leave empty for the provider default)")
        .allow_empty(true)
        .interact_text()
        .context("Failed to read base URL")?;

    Ok(Some(base_url.trim().to_string()).filter(|url| !url.is_empty()))
}

pub fn run_onboard() -> Result<Config> {
    println!("{}", style(BANNER).cyan().bold());

    println!("  {}", style("Welcome to tandem!").white().bold());
    println!(
        "  {}",
        style("This wizard will point your agents at a model provider.").dim()
    );
    println!();

    print_step(1, 3, "Provider");
    let provider = setup_provider()?;
    let api_key = setup_api_key(&provider)?;

    print_step(2, 3, "Model Selection");
    let model = setup_model(&provider)?;

    print_step(3, 3, "Endpoint");
    let base_url = setup_base_url()?;

    let config = Config {
        provider,
        api_key,
        base_url,
        model,
        ..Default::default()
    };

    println!();
    println!("  {} Configuration complete!", style("✓").green().bold());
    println!(
        "  {} Config saved to {}",
        style("→").green(),
        style(config::get_config_path().display()).cyan()
    );
    println!();
    println!(
        "  {} You can now run: {}",
        style("→").green(),
        style("tandem run").cyan().bold()
    );
    println!();

    Ok(config)
}
