//! deltacast - stream a chat completion through the transform pipeline
//!
//! Transformed units go to stdout; logs go to stderr.

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Parser;
use futures::StreamExt;
use tokio::io::AsyncWriteExt;
use tracing::info;
use tracing_subscriber::EnvFilter;

use deltacast_core::ai::{ChatMessage, CompletionClient};
use deltacast_core::Config;

/// Environment variable consulted when the config file has no API key
const API_KEY_ENV: &str = "OPENAI_API_KEY";

#[derive(Parser, Debug)]
#[command(name = "deltacast", version, about)]
struct Cli {
    /// Prompt sent as the user message
    prompt: String,

    /// Path to config.toml (defaults to the user config directory)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Model name, overrides the config file
    #[arg(short, long)]
    model: Option<String>,

    /// Optional system message
    #[arg(short, long)]
    system: Option<String>,

    /// Flush threshold in characters, overrides the config file
    #[arg(long)]
    threshold: Option<usize>,

    /// Transform delay in milliseconds, overrides the config file
    #[arg(long)]
    delay_ms: Option<u64>,

    /// Emit the buffered tail when the stream ends
    #[arg(long)]
    flush_remainder: bool,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("deltacast=info,deltacast_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    if let Err(e) = run(cli).await {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;
    if let Some(model) = cli.model {
        config.request.model = model;
    }
    if let Some(threshold) = cli.threshold {
        config.pipeline.flush_threshold = threshold;
    }
    if let Some(delay_ms) = cli.delay_ms {
        config.pipeline.transform_delay_ms = delay_ms;
    }
    if cli.flush_remainder {
        config.pipeline.flush_remainder = true;
    }

    let api_key = match config.api_key.clone() {
        Some(key) => key,
        None => std::env::var(API_KEY_ENV).with_context(|| {
            format!("No API key: set api_key in the config file or {}", API_KEY_ENV)
        })?,
    };

    let client = CompletionClient::new(
        config.client_config(api_key),
        config.transform(),
        config.accumulator_options(),
    )?;

    let mut messages = Vec::new();
    if let Some(system) = cli.system {
        messages.push(ChatMessage::system(system));
    }
    messages.push(ChatMessage::user(cli.prompt));
    let request = config.chat_request(messages);

    let mut stream = match client.stream_chat(&request).await {
        Ok(Some(stream)) => stream,
        Ok(None) => {
            info!("Upstream returned no stream");
            return Ok(());
        }
        Err(e) if e.is_upstream() => {
            bail!("Request to {} failed: {}", client.config().api_url, e)
        }
        Err(e) => return Err(e.into()),
    };

    let mut stdout = tokio::io::stdout();
    let mut units = 0usize;
    while let Some(unit) = stream.next().await {
        let unit = unit.context("Stream terminated with an error")?;
        stdout.write_all(&unit).await?;
        stdout.flush().await?;
        units += 1;
    }
    info!("Stream complete: {} units written", units);
    Ok(())
}

fn load_config(path: Option<&std::path::Path>) -> Result<Config> {
    match path {
        Some(path) => Config::load(path),
        None => match Config::default_path() {
            Some(path) => Config::load(&path),
            None => Ok(Config::default()),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parses_overrides() {
        let cli = Cli::try_parse_from([
            "deltacast",
            "--model",
            "gpt-4o-mini",
            "--threshold",
            "40",
            "--flush-remainder",
            "tell me a story",
        ])
        .unwrap();
        assert_eq!(cli.prompt, "tell me a story");
        assert_eq!(cli.model.as_deref(), Some("gpt-4o-mini"));
        assert_eq!(cli.threshold, Some(40));
        assert!(cli.flush_remainder);
        assert!(cli.config.is_none());
    }

    #[test]
    fn test_cli_requires_prompt() {
        assert!(Cli::try_parse_from(["deltacast"]).is_err());
    }
}
