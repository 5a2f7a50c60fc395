use std::path::Path;
use std::time::Duration;

use alloy::primitives::Address;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::poller::DEFAULT_MAX_BLOCK_RANGE;
use crate::{BOTOMETER_API_BASE, IDENTITY_ACCOUNT_ID, REGISTRY_ADDRESS, TWITTER_API_BASE};

/// Default config file path.
pub const CONFIG_PATH: &str = "config.toml";

pub const DISCORD_TOKEN_VAR: &str = "DISCORD_BOT_TOKEN";
pub const TWITTER_TOKEN_VAR: &str = "TWITTER_BEARER_TOKEN";
pub const RAPIDAPI_KEY_VAR: &str = "RAPIDAPI_KEY";

/// Top-level application config deserialized from `config.toml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    pub chain: ChainConfig,
    #[serde(default)]
    pub social: SocialConfig,
    #[serde(default)]
    pub discord: DiscordConfig,
    #[serde(default)]
    pub settings: SettingsConfig,
}

/// Ethereum node and registry contract.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChainConfig {
    /// HTTP JSON-RPC endpoint.
    pub rpc_url: String,
    #[serde(default = "default_registry_address")]
    pub registry_address: String,
    /// Block the applicant poller starts scanning from.
    pub start_block: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SocialConfig {
    /// Account id that verification tweets must mention.
    #[serde(default = "default_identity_account_id")]
    pub identity_account_id: String,
    /// Number of recent tweets fetched per lookup (5-100).
    #[serde(default = "default_timeline_limit")]
    pub timeline_limit: u32,
    #[serde(default = "default_twitter_api_base")]
    pub twitter_api_base: String,
    #[serde(default = "default_botometer_api_base")]
    pub botometer_api_base: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DiscordConfig {
    /// Channel that receives new-applicant notifications.
    /// Without it, notifications only go to the log.
    pub channel_id: Option<String>,
}

/// Runtime settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SettingsConfig {
    /// Seconds between applicant poll cycles.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    /// Timeout for every outbound HTTP / RPC call.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,
    /// Most blocks requested in one `eth_getLogs` call. Public providers
    /// cap this, so a long catch-up is split into several queries.
    #[serde(default = "default_max_block_range")]
    pub max_block_range: u64,
}

fn default_registry_address() -> String {
    REGISTRY_ADDRESS.to_string()
}

fn default_identity_account_id() -> String {
    IDENTITY_ACCOUNT_ID.to_string()
}

fn default_timeline_limit() -> u32 {
    20
}

fn default_twitter_api_base() -> String {
    TWITTER_API_BASE.to_string()
}

fn default_botometer_api_base() -> String {
    BOTOMETER_API_BASE.to_string()
}

fn default_poll_interval() -> u64 {
    300
}

fn default_request_timeout() -> u64 {
    30
}

fn default_max_block_range() -> u64 {
    DEFAULT_MAX_BLOCK_RANGE
}

impl Default for SocialConfig {
    fn default() -> Self {
        Self {
            identity_account_id: default_identity_account_id(),
            timeline_limit: default_timeline_limit(),
            twitter_api_base: default_twitter_api_base(),
            botometer_api_base: default_botometer_api_base(),
        }
    }
}

impl Default for SettingsConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            request_timeout_secs: default_request_timeout(),
            max_block_range: default_max_block_range(),
        }
    }
}

impl AppConfig {
    /// Load config from the given TOML file path.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("failed to parse {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents)?;
        config.registry_address()?;
        if !(5..=100).contains(&config.social.timeline_limit) {
            anyhow::bail!("social.timeline_limit must be between 5 and 100");
        }
        if config.settings.poll_interval_secs == 0 {
            anyhow::bail!("settings.poll_interval_secs must be positive");
        }
        if config.settings.request_timeout_secs == 0 {
            anyhow::bail!("settings.request_timeout_secs must be positive");
        }
        if config.settings.max_block_range == 0 {
            anyhow::bail!("settings.max_block_range must be positive");
        }
        Ok(config)
    }

    pub fn registry_address(&self) -> Result<Address> {
        self.chain
            .registry_address
            .parse()
            .with_context(|| format!("invalid registry address {}", self.chain.registry_address))
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.settings.poll_interval_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.settings.request_timeout_secs)
    }
}

/// API credentials, read from the environment (after `.env` is loaded).
#[derive(Clone)]
pub struct Secrets {
    pub twitter_bearer_token: String,
    pub rapidapi_key: String,
    pub discord_bot_token: Option<String>,
}

impl Secrets {
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            twitter_bearer_token: require_env(TWITTER_TOKEN_VAR)?,
            rapidapi_key: require_env(RAPIDAPI_KEY_VAR)?,
            discord_bot_token: std::env::var(DISCORD_TOKEN_VAR).ok(),
        })
    }
}

fn require_env(name: &str) -> Result<String> {
    std::env::var(name).with_context(|| format!("{name} not set"))
}
