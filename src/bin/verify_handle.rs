//! One-shot verification of a single Twitter handle, printed to stdout.

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::Parser;

use humanity_verifier::command::CommandHandler;
use humanity_verifier::config::{AppConfig, CONFIG_PATH, Secrets};
use humanity_verifier::reporter::StdoutNotifier;
use humanity_verifier::verifier::Verifier;

#[derive(Parser)]
#[command(name = "verify_handle", about = "Verify one Twitter handle without Discord")]
struct Args {
    /// Twitter handle, with or without the leading '@'
    handle: String,

    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;
    let secrets = Secrets::from_env()?;
    let verifier = Arc::new(Verifier::from_config(&config, &secrets)?);

    let handle = format!("@{}", args.handle.trim_start_matches('@'));
    CommandHandler::new(verifier)
        .handle(&format!("!verify {handle}"), &StdoutNotifier)
        .await;
    Ok(())
}
