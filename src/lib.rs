pub mod api;
pub mod chain;
pub mod command;
pub mod config;
pub mod discord;
pub mod engine;
pub mod error;
pub mod extractor;
pub mod messages;
pub mod poller;
pub mod registry;
pub mod reporter;
pub mod social;
pub mod state;
pub mod types;
pub mod verifier;

#[cfg(test)]
pub(crate) mod testing;

/// HumanityDAO `TwitterHumanityApplicant` contract on Ethereum mainnet.
pub const REGISTRY_ADDRESS: &str = "0x9D661f7773Be14439b4223F5b516bC7Ef67b0369";

/// Numeric id of the @HumanityDAO Twitter account applicants must mention.
pub const IDENTITY_ACCOUNT_ID: &str = "1118447927112781824";

/// Twitter REST API base URL (v2 endpoints, bearer auth)
pub const TWITTER_API_BASE: &str = "https://api.twitter.com";

/// Botometer scoring API base URL (served through RapidAPI)
pub const BOTOMETER_API_BASE: &str = "https://botometer-pro.p.rapidapi.com";

/// Discord REST API base URL
pub const DISCORD_API_BASE: &str = "https://discord.com/api/v10";

/// Discord gateway WebSocket URL (JSON encoding)
pub const DISCORD_GATEWAY_URL: &str = "wss://gateway.discord.gg/?v=10&encoding=json";
