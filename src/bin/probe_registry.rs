//! Probe: list Apply events from the HumanityDAO registry.
//!
//! Prints the chain head, then one line per application in the range,
//! optionally filtered to one applicant address.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Instant;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use clap::Parser;

use humanity_verifier::chain::RpcEventSource;
use humanity_verifier::config::{AppConfig, CONFIG_PATH};
use humanity_verifier::registry::RegistryClient;
use humanity_verifier::types::format_address;

#[derive(Parser)]
#[command(name = "probe_registry", about = "Dump registry Apply events")]
struct Args {
    /// Path to the TOML config file
    #[arg(long, default_value = CONFIG_PATH)]
    config: PathBuf,

    /// First block (defaults to chain.start_block)
    #[arg(long)]
    from: Option<u64>,

    /// Last block (defaults to the chain head)
    #[arg(long)]
    to: Option<u64>,

    /// Only show applications from this address (searches from block 0)
    #[arg(long)]
    applicant: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    let args = Args::parse();
    let config = AppConfig::load(&args.config)?;
    let registry_address = config.registry_address()?;
    let source = RpcEventSource::new(&config.chain.rpc_url, registry_address, config.request_timeout())?;
    let registry = RegistryClient::new(Arc::new(source));

    println!("=== Probe: registry Apply events ===");
    println!("Registry: {}", format_address(&registry_address));

    let start = Instant::now();
    let head = registry.head_height().await?;
    println!("Head: {head} ({:?})", start.elapsed());

    let start = Instant::now();
    let events = match &args.applicant {
        Some(applicant) => {
            let applicant: Address = applicant
                .parse()
                .with_context(|| format!("invalid applicant address {applicant}"))?;
            registry.query_by_applicant(applicant).await?
        }
        None => {
            let from = args.from.unwrap_or(config.chain.start_block);
            let to = args.to.unwrap_or(head);
            println!("Range: {from}..={to}");
            registry.query_range(from, to).await?
        }
    };
    println!("Events: {} ({:?})", events.len(), start.elapsed());
    println!();

    for event in &events {
        let block = event
            .block_number
            .map_or_else(|| "?".to_string(), |b| b.to_string());
        println!(
            "block {block:>10}  #{:<6} {}  {}",
            event.proposal_id,
            format_address(&event.applicant),
            event.username
        );
    }
    Ok(())
}
