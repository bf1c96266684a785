use anyhow::Result;
use clap::Parser;
use ollamachat_core::constants::defaults;
use ollamachat_core::Settings;
use std::path::PathBuf;
use tracing::warn;

mod app;
mod commands;

#[derive(Parser)]
#[command(name = "ollamachat")]
#[command(about = "OllamaChat - chat with local LLMs from the terminal")]
#[command(version)]
struct Cli {
    /// Run a single prompt in the most recent session and exit
    #[arg(short, long)]
    prompt: Option<String>,

    /// Model used by sessions without their own (saved to preferences)
    #[arg(short, long)]
    model: Option<String>,

    /// LLM provider (ollama, openai, eino)
    #[arg(long)]
    provider: Option<String>,

    /// Base URL of the Ollama server
    #[arg(long)]
    base_url: Option<String>,

    /// Directory holding sessions and preferences
    #[arg(long)]
    storage: Option<PathBuf>,

    /// Path to config.toml
    #[arg(long)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error); RUST_LOG takes precedence
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = cli.config.clone().unwrap_or_else(Settings::config_path);
    let loaded = Settings::load_from(&config_path);

    let log_level = cli
        .log_level
        .clone()
        .or_else(|| loaded.as_ref().ok().map(|s| s.app.log_level.clone()))
        .unwrap_or_else(|| defaults::LOG_LEVEL.to_string());
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let mut settings = loaded.unwrap_or_else(|e| {
        warn!(path = %config_path.display(), error = %e, "Using default settings");
        Settings::default()
    });
    apply_overrides(&mut settings, &cli);
    settings.validate()?;

    let (controller, mut events) = app::connect(&settings).await?;
    if let Some(model) = &cli.model {
        controller.set_default_model(model).await?;
    }

    if let Some(prompt) = cli.prompt {
        app::run_single_prompt(&controller, &mut events, &prompt).await?;
    } else {
        app::run_repl(&controller, &mut events).await?;
    }

    Ok(())
}

fn apply_overrides(settings: &mut Settings, cli: &Cli) {
    if let Some(model) = &cli.model {
        settings.llm.ollama.default_model = model.clone();
    }
    if let Some(provider) = &cli.provider {
        let provider = provider.trim().to_ascii_lowercase();
        if !settings.llm.available_providers.contains(&provider) {
            settings.llm.available_providers.push(provider.clone());
        }
        settings.llm.provider = provider;
    }
    if let Some(base_url) = &cli.base_url {
        settings.llm.ollama.base_url = base_url.clone();
    }
    if let Some(storage) = &cli.storage {
        settings.storage.base_path = Some(storage.clone());
    }
    if let Some(level) = &cli.log_level {
        settings.app.log_level = level.clone();
    }
}
