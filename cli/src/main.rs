use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use console::style;
use rustyline::DefaultEditor;
use rustyline::error::ReadlineError;
use std::sync::Arc;
use tandem_core::agent::prompt::functions_schema;
use tandem_core::{Agent, Config, ContextVariables, History, config, providers};
use tracing_subscriber::EnvFilter;

mod demo;
mod onboard;
mod view;

#[derive(Parser)]
#[command(name = "tandem")]
#[command(about = "tandem - agents that answer with code and hand tasks to teammates", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configure the model provider
    Onboard,
    /// Run the apple demo, once or interactively
    Run {
        /// Task to run; omit for an interactive session
        #[arg(short, long)]
        task: Option<String>,
        /// Use one agent with every tool instead of the two-agent team
        #[arg(long)]
        single: bool,
        /// Override the configured provider
        #[arg(long)]
        provider: Option<String>,
        /// Override the configured model
        #[arg(long)]
        model: Option<String>,
    },
    /// Print the functions schema the demo agent is prompted with
    Schema {
        #[arg(long)]
        single: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let command = cli.command.unwrap_or_else(|| {
        if !config::config_exists() {
            Commands::Onboard
        } else {
            Commands::Run {
                task: None,
                single: false,
                provider: None,
                model: None,
            }
        }
    });

    match command {
        Commands::Onboard => {
            let onboard_config = onboard::run_onboard().map_err(|e| {
                eprintln!("❌ Onboarding failed: {}", e);
                anyhow::anyhow!("Onboarding failed: {}", e)
            })?;
            config::save_config(&onboard_config)?;
        }
        Commands::Run {
            task,
            single,
            provider,
            model,
        } => {
            let mut config = Config::load_or_init()?;
            if let Some(provider) = provider {
                config.provider = provider;
            }
            if let Some(model) = model {
                config.model = model;
            }

            let agent = build_agent(&config, single)?;
            match task {
                Some(task) => run_once(&agent, &task)?,
                None => run_interactive(&agent)?,
            }
        }
        Commands::Schema { single } => {
            let config = Config::load_or_init()?;
            let agent = build_agent(&config, single)?;
            println!("{}", functions_schema(&agent.tool_specs()));
        }
    }

    Ok(())
}

fn build_agent(config: &Config, single: bool) -> Result<Agent> {
    let provider = providers::provider_from_config(config)
        .with_context(|| format!("Could not set up provider '{}'", config.provider))?;
    let agent = if single {
        demo::single_agent(config, Arc::clone(&provider))?
    } else {
        demo::team(config, provider)?
    };
    Ok(agent)
}

fn run_once(agent: &Agent, task: &str) -> Result<()> {
    println!("\n🤔 Processing...\n");
    let history = agent.start(task).map_err(|e| {
        eprintln!("❌ Error: {}", e);
        anyhow::anyhow!("Agent turn failed: {}", e)
    })?;
    // Skip the system prompt.
    view::print_entries(history.entries().get(1..).unwrap_or_default());
    Ok(())
}

fn run_interactive(agent: &Agent) -> Result<()> {
    println!("{}", style(format!("🍎 tandem - {}", agent.name())).bold());
    println!("Type your task (Ctrl+D to exit):\n");

    let mut editor = DefaultEditor::new().context("Failed to start line editor")?;
    let context = ContextVariables::new();
    let mut history = History::new();

    loop {
        match editor.readline("> ") {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(input);

                println!("\n🤔 Processing...\n");
                let seen = history.len().max(1);
                match agent.run(input, history.clone(), &context) {
                    Ok(updated) => {
                        view::print_entries(updated.entries().get(seen..).unwrap_or_default());
                        history = updated;
                    }
                    Err(e) => eprintln!("❌ Error: {}", e),
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => continue,
            Err(ReadlineError::Eof) => {
                println!("\n👋 Goodbye!");
                break;
            }
            Err(e) => return Err(e.into()),
        }
    }

    Ok(())
}
