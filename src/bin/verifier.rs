use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::sync::{mpsc, watch};
use tracing::{info, warn};

use humanity_verifier::command::CommandHandler;
use humanity_verifier::config::{AppConfig, CONFIG_PATH, DISCORD_TOKEN_VAR, Secrets};
use humanity_verifier::discord::{self, ChannelNotifier, DiscordRest, InboundMessage};
use humanity_verifier::poller::ApplicantPoller;
use humanity_verifier::reporter::{self, LogNotifier, Notifier};
use humanity_verifier::verifier::Verifier;

#[derive(Parser)]
#[command(
    name = "verifier",
    about = "Discord bot that verifies HumanityDAO applicants against their Twitter accounts"
)]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// Do not watch the registry for new applications
    #[arg(long)]
    no_poller: bool,

    /// Do not connect to the Discord gateway for `!verify` commands
    #[arg(long)]
    no_bot: bool,

    /// Override `chain.start_block` from the config
    #[arg(long)]
    start_block: Option<u64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();
    if args.no_poller && args.no_bot {
        anyhow::bail!("Nothing to run: both --no-poller and --no-bot were given");
    }

    let config = AppConfig::load(&args.config)?;
    info!("Loaded config from {}", args.config.display());
    let secrets = Secrets::from_env()?;

    let verifier = Arc::new(Verifier::from_config(&config, &secrets)?);
    let rest = secrets
        .discord_bot_token
        .as_deref()
        .map(|token| DiscordRest::new(token, config.request_timeout()))
        .transpose()?;

    let (shutdown_tx, shutdown_rx) = watch::channel(false);

    let poller_task = if args.no_poller {
        None
    } else {
        let notifier: Arc<dyn Notifier> = match (&rest, &config.discord.channel_id) {
            (Some(rest), Some(channel)) => {
                info!("Application notices go to channel {channel}");
                Arc::new(ChannelNotifier::new(rest.clone(), channel.clone()))
            }
            _ => {
                warn!("No Discord token or channel configured, application notices go to the log");
                Arc::new(LogNotifier)
            }
        };
        let start_block = args.start_block.unwrap_or(config.chain.start_block);
        let poller = ApplicantPoller::new(
            verifier.clone(),
            notifier,
            start_block,
            config.poll_interval(),
        )
        .with_max_block_range(config.settings.max_block_range);
        Some(tokio::spawn(poller.run(shutdown_rx.clone())))
    };

    let bot_tasks = if args.no_bot {
        None
    } else {
        let rest = rest.with_context(|| format!("{DISCORD_TOKEN_VAR} not set"))?;
        let (tx, rx) = mpsc::channel(64);
        let gateway = tokio::spawn(discord::run_gateway(
            rest.token().to_string(),
            tx,
            shutdown_rx.clone(),
        ));
        let dispatcher = tokio::spawn(dispatch_commands(
            rx,
            CommandHandler::new(verifier.clone()),
            rest,
        ));
        Some((gateway, dispatcher))
    };

    tokio::signal::ctrl_c().await?;
    info!("Received Ctrl+C, shutting down...");
    let _ = shutdown_tx.send(true);

    if let Some((gateway, dispatcher)) = bot_tasks {
        if let Err(e) = gateway.await {
            warn!("Gateway task failed: {e}");
        }
        if let Err(e) = dispatcher.await {
            warn!("Command dispatcher failed: {e}");
        }
    }
    if let Some(task) = poller_task {
        match task.await {
            Ok(stats) => reporter::report_stats(&stats),
            Err(e) => warn!("Poller task failed: {e}"),
        }
    }

    Ok(())
}

/// One task per inbound command; ends when the gateway drops its sender.
async fn dispatch_commands(
    mut rx: mpsc::Receiver<InboundMessage>,
    handler: CommandHandler,
    rest: DiscordRest,
) {
    while let Some(msg) = rx.recv().await {
        let handler = handler.clone();
        let notifier = ChannelNotifier::new(rest.clone(), msg.channel_id);
        tokio::spawn(async move {
            handler.handle(&msg.content, &notifier).await;
        });
    }
}
