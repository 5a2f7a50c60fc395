//! Discord plumbing: REST sends, typing indicators, and a minimal gateway
//! client that forwards chat messages.

use std::time::Duration;

use anyhow::{Context, Result, bail};
use async_trait::async_trait;
use futures_util::{SinkExt, StreamExt};
use reqwest::Client;
use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{mpsc, watch};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use crate::reporter::Notifier;
use crate::{DISCORD_API_BASE, DISCORD_GATEWAY_URL};

/// Discord rejects message content longer than this many characters.
const MAX_MESSAGE_CHARS: usize = 2000;

/// GUILDS | GUILD_MESSAGES | DIRECT_MESSAGES | MESSAGE_CONTENT
const GATEWAY_INTENTS: u64 = (1 << 0) | (1 << 9) | (1 << 12) | (1 << 15);

const OP_DISPATCH: u8 = 0;
const OP_HEARTBEAT: u8 = 1;
const OP_IDENTIFY: u8 = 2;
const OP_RECONNECT: u8 = 7;
const OP_INVALID_SESSION: u8 = 9;
const OP_HELLO: u8 = 10;
const OP_HEARTBEAT_ACK: u8 = 11;

const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);

/// Authenticated Discord REST client.
#[derive(Clone)]
pub struct DiscordRest {
    http: Client,
    token: String,
}

impl DiscordRest {
    pub fn new(token: impl Into<String>, timeout: Duration) -> Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            token: token.into(),
        })
    }

    pub fn token(&self) -> &str {
        &self.token
    }

    pub async fn send_message(&self, channel_id: &str, content: &str) -> Result<()> {
        let url = format!("{DISCORD_API_BASE}/channels/{channel_id}/messages");
        let resp = self
            .http
            .post(url)
            .header("Authorization", format!("Bot {}", self.token))
            .json(&json!({ "content": truncate_message(content) }))
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("Discord returned {} for channel {channel_id}", resp.status());
        }
        Ok(())
    }

    pub async fn trigger_typing(&self, channel_id: &str) -> Result<()> {
        let url = format!("{DISCORD_API_BASE}/channels/{channel_id}/typing");
        let resp = self
            .http
            .post(url)
            .header("Authorization", format!("Bot {}", self.token))
            .send()
            .await?;
        if !resp.status().is_success() {
            bail!("Discord returned {} for typing in {channel_id}", resp.status());
        }
        Ok(())
    }
}

/// Notifier bound to one Discord channel.
pub struct ChannelNotifier {
    rest: DiscordRest,
    channel_id: String,
}

impl ChannelNotifier {
    pub fn new(rest: DiscordRest, channel_id: impl Into<String>) -> Self {
        Self {
            rest,
            channel_id: channel_id.into(),
        }
    }
}

#[async_trait]
impl Notifier for ChannelNotifier {
    async fn send(&self, text: &str) {
        if let Err(e) = self.rest.send_message(&self.channel_id, text).await {
            warn!("Failed to send message to {}: {e}", self.channel_id);
        }
    }

    async fn indicate_activity(&self) {
        if let Err(e) = self.rest.trigger_typing(&self.channel_id).await {
            debug!("Failed to trigger typing in {}: {e}", self.channel_id);
        }
    }
}

/// Cut `content` to Discord's limit on a character boundary.
pub fn truncate_message(content: &str) -> &str {
    match content.char_indices().nth(MAX_MESSAGE_CHARS) {
        Some((idx, _)) => &content[..idx],
        None => content,
    }
}

/// A chat message received over the gateway.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InboundMessage {
    pub channel_id: String,
    pub author_id: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
struct GatewayPayload {
    op: u8,
    #[serde(default)]
    d: Value,
    #[serde(default)]
    s: Option<u64>,
    #[serde(default)]
    t: Option<String>,
}

enum SessionEnd {
    Shutdown,
    Reconnect,
}

/// Forward every human-authored message to `tx` until shutdown,
/// reconnecting with exponential backoff when the session drops.
pub async fn run_gateway(
    token: String,
    tx: mpsc::Sender<InboundMessage>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut backoff = INITIAL_BACKOFF;
    loop {
        if *shutdown.borrow() {
            break;
        }
        match session(&token, &tx, &mut shutdown).await {
            Ok(SessionEnd::Shutdown) => break,
            Ok(SessionEnd::Reconnect) => {
                info!("Gateway session ended, reconnecting");
                backoff = INITIAL_BACKOFF;
            }
            Err(e) => warn!("Gateway error: {e:#}"),
        }

        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(backoff) => {}
        }
        backoff = (backoff * 2).min(MAX_BACKOFF);
    }
    info!("Gateway stopped");
}

async fn session(
    token: &str,
    tx: &mpsc::Sender<InboundMessage>,
    shutdown: &mut watch::Receiver<bool>,
) -> Result<SessionEnd> {
    let (ws_stream, _) = connect_async(DISCORD_GATEWAY_URL)
        .await
        .context("gateway connect failed")?;
    let (mut write, mut read) = ws_stream.split();

    let hello = loop {
        match read.next().await {
            Some(Ok(Message::Text(text))) => break parse_payload(text.as_str())?,
            Some(Ok(_)) => continue,
            Some(Err(e)) => return Err(e.into()),
            None => bail!("gateway closed before hello"),
        }
    };
    let interval = heartbeat_interval(&hello)?;

    write
        .send(Message::Text(identify_payload(token).to_string().into()))
        .await?;

    let mut heartbeat = tokio::time::interval(interval);
    heartbeat.tick().await;
    let mut seq: Option<u64> = None;
    let mut self_id: Option<String> = None;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                let _ = write.send(Message::Close(None)).await;
                return Ok(SessionEnd::Shutdown);
            }
            _ = heartbeat.tick() => {
                write.send(Message::Text(heartbeat_payload(seq).to_string().into())).await?;
            }
            msg = read.next() => {
                let text = match msg {
                    Some(Ok(Message::Text(text))) => text,
                    Some(Ok(Message::Close(frame))) => {
                        info!("Gateway closed: {frame:?}");
                        return Ok(SessionEnd::Reconnect);
                    }
                    Some(Ok(_)) => continue,
                    Some(Err(e)) => return Err(e.into()),
                    None => return Ok(SessionEnd::Reconnect),
                };
                let payload = match parse_payload(text.as_str()) {
                    Ok(p) => p,
                    Err(e) => {
                        debug!("Ignoring unparseable gateway payload: {e}");
                        continue;
                    }
                };
                if payload.s.is_some() {
                    seq = payload.s;
                }
                match payload.op {
                    OP_DISPATCH => dispatch(&payload, &mut self_id, tx).await,
                    OP_HEARTBEAT => {
                        write.send(Message::Text(heartbeat_payload(seq).to_string().into())).await?;
                    }
                    OP_RECONNECT | OP_INVALID_SESSION => return Ok(SessionEnd::Reconnect),
                    OP_HEARTBEAT_ACK => {}
                    op => debug!("Unhandled gateway op {op}"),
                }
            }
        }
    }
}

async fn dispatch(
    payload: &GatewayPayload,
    self_id: &mut Option<String>,
    tx: &mpsc::Sender<InboundMessage>,
) {
    match payload.t.as_deref() {
        Some("READY") => {
            let user = &payload.d["user"];
            let id = user["id"].as_str().unwrap_or_default().to_string();
            info!(
                "Logged in as {} ({id})",
                user["username"].as_str().unwrap_or("?")
            );
            *self_id = Some(id);
        }
        Some("MESSAGE_CREATE") => {
            if let Some(msg) = parse_message_create(&payload.d, self_id.as_deref()) {
                debug!("Message from {} in {}", msg.author_id, msg.channel_id);
                if tx.send(msg).await.is_err() {
                    warn!("Command dispatcher is gone, dropping message");
                }
            }
        }
        _ => {}
    }
}

fn parse_payload(text: &str) -> Result<GatewayPayload> {
    serde_json::from_str(text).context("invalid gateway payload")
}

/// Heartbeat period announced by a Hello payload. Zero is rejected.
fn heartbeat_interval(hello: &GatewayPayload) -> Result<Duration> {
    if hello.op != OP_HELLO {
        bail!("expected hello, got op {}", hello.op);
    }
    match hello.d["heartbeat_interval"].as_u64() {
        Some(0) => bail!("hello with zero heartbeat_interval"),
        Some(ms) => Ok(Duration::from_millis(ms)),
        None => bail!("hello without heartbeat_interval"),
    }
}

fn identify_payload(token: &str) -> Value {
    json!({
        "op": OP_IDENTIFY,
        "d": {
            "token": token,
            "intents": GATEWAY_INTENTS,
            "properties": {
                "os": std::env::consts::OS,
                "browser": "humanity-verifier",
                "device": "humanity-verifier",
            },
        },
    })
}

fn heartbeat_payload(seq: Option<u64>) -> Value {
    json!({ "op": OP_HEARTBEAT, "d": seq })
}

/// Extract a message, skipping our own and other bots' messages.
fn parse_message_create(d: &Value, self_id: Option<&str>) -> Option<InboundMessage> {
    let author = &d["author"];
    let author_id = author["id"].as_str()?;
    if Some(author_id) == self_id || author["bot"].as_bool().unwrap_or(false) {
        return None;
    }
    Some(InboundMessage {
        channel_id: d["channel_id"].as_str()?.to_string(),
        author_id: author_id.to_string(),
        content: d["content"].as_str().unwrap_or_default().to_string(),
    })
}
