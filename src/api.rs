use std::collections::BTreeMap;
use std::time::Duration;

use anyhow::Context;
use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::{Value, json};
use tracing::debug;
use url::Url;

use crate::error::{VerifyError, VerifyResult};
use crate::social::SocialClient;
use crate::types::{Post, RiskScores};

/// Longest handle Twitter accepts.
const MAX_HANDLE_LEN: usize = 15;

/// `SocialClient` over the Twitter v2 API, scored by Botometer.
pub struct TwitterBotometerClient {
    http: Client,
    twitter_base: Url,
    botometer_base: Url,
    bearer_token: String,
    rapidapi_key: String,
    timeline_limit: u32,
}

#[derive(Debug, Deserialize)]
struct Envelope<T> {
    data: Option<T>,
    #[serde(default)]
    errors: Vec<ApiError>,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    title: String,
    #[serde(default)]
    detail: String,
}

#[derive(Debug, Clone, Deserialize)]
struct TwitterUser {
    id: String,
    username: String,
}

#[derive(Debug, Deserialize)]
struct Tweet {
    id: String,
    text: String,
    #[serde(default)]
    entities: Option<Entities>,
}

#[derive(Debug, Default, Deserialize)]
struct Entities {
    #[serde(default)]
    mentions: Vec<Mention>,
}

#[derive(Debug, Deserialize)]
struct Mention {
    #[serde(default)]
    id: Option<String>,
}

impl TwitterBotometerClient {
    pub fn new(
        twitter_base: &str,
        botometer_base: &str,
        bearer_token: impl Into<String>,
        rapidapi_key: impl Into<String>,
        timeline_limit: u32,
        timeout: Duration,
    ) -> anyhow::Result<Self> {
        let http = Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self {
            http,
            twitter_base: base_url(twitter_base)?,
            botometer_base: base_url(botometer_base)?,
            bearer_token: bearer_token.into(),
            rapidapi_key: rapidapi_key.into(),
            timeline_limit,
        })
    }

    async fn lookup_user(&self, handle: &str) -> VerifyResult<TwitterUser> {
        let username = validate_handle(handle)?;
        let url = join(&self.twitter_base, &format!("2/users/by/username/{username}"))?;
        let envelope: Envelope<TwitterUser> =
            send_json("twitter", self.http.get(url).bearer_auth(&self.bearer_token)).await?;
        match envelope.data {
            Some(user) => Ok(user),
            None => Err(VerifyError::lookup(describe_errors(
                &envelope.errors,
                &format!("unknown twitter account @{username}"),
            ))),
        }
    }

    /// Raw timeline JSON, newest first.
    async fn fetch_timeline(&self, user: &TwitterUser) -> VerifyResult<Vec<Value>> {
        let url = join(&self.twitter_base, &format!("2/users/{}/tweets", user.id))?;
        let request = self
            .http
            .get(url)
            .bearer_auth(&self.bearer_token)
            .query(&[
                ("max_results", self.timeline_limit.to_string()),
                ("tweet.fields", "entities,created_at,public_metrics".to_string()),
            ]);
        let envelope: Envelope<Vec<Value>> = send_json("twitter", request).await?;
        let tweets = timeline_data(envelope, &user.username)?;
        debug!("Fetched {} tweets for @{}", tweets.len(), user.username);
        Ok(tweets)
    }
}

#[async_trait]
impl SocialClient for TwitterBotometerClient {
    async fn fetch_recent_posts(&self, handle: &str) -> VerifyResult<Vec<Post>> {
        let user = self.lookup_user(handle).await?;
        let timeline = self.fetch_timeline(&user).await?;
        Ok(timeline_to_posts(timeline))
    }

    async fn fetch_risk_scores(&self, handle: &str) -> VerifyResult<RiskScores> {
        let user = self.lookup_user(handle).await?;
        let timeline = self.fetch_timeline(&user).await?;
        let url = join(&self.botometer_base, "4/check_account")?;
        let host = self.botometer_base.host_str().unwrap_or_default().to_string();
        let body = json!({
            "user": { "id_str": user.id, "screen_name": user.username },
            "timeline": timeline,
            "mentions": [],
        });
        let request = self
            .http
            .post(url)
            .header("x-rapidapi-key", &self.rapidapi_key)
            .header("x-rapidapi-host", host)
            .json(&body);
        let response: Value = send_json("botometer", request).await?;
        parse_scores(&response)
    }
}

/// Parse a base URL so that relative joins append to its path.
fn base_url(raw: &str) -> anyhow::Result<Url> {
    let mut url = Url::parse(raw).with_context(|| format!("invalid API base URL {raw}"))?;
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    Ok(url)
}

fn join(base: &Url, path: &str) -> VerifyResult<Url> {
    base.join(path)
        .map_err(|e| VerifyError::lookup(format!("bad endpoint {path}: {e}")))
}

/// Strip `@` and check the handle is a plausible Twitter username.
pub fn validate_handle(handle: &str) -> VerifyResult<String> {
    let username = handle.trim().trim_start_matches('@');
    let valid = !username.is_empty()
        && username.len() <= MAX_HANDLE_LEN
        && username
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(username.to_string())
    } else {
        Err(VerifyError::lookup(format!("invalid twitter handle {handle:?}")))
    }
}

/// Send a request and decode its JSON body, mapping failures to
/// `LookupFailure` with a reason specific to the failure.
async fn send_json<T: DeserializeOwned>(service: &str, request: RequestBuilder) -> VerifyResult<T> {
    let response = request.send().await.map_err(|e| {
        if e.is_timeout() {
            VerifyError::lookup(format!("{service} request timed out"))
        } else {
            VerifyError::lookup(format!("{service} unreachable: {e}"))
        }
    })?;

    let status = response.status();
    if !status.is_success() {
        return Err(VerifyError::lookup(status_reason(service, status)));
    }
    response
        .json()
        .await
        .map_err(|e| VerifyError::lookup(format!("{service} sent an unreadable response: {e}")))
}

fn status_reason(service: &str, status: StatusCode) -> String {
    match status {
        StatusCode::TOO_MANY_REQUESTS => format!("{service} rate limit reached, try again later"),
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => {
            format!("{service} rejected our credentials ({status})")
        }
        StatusCode::NOT_FOUND => format!("{service} account not found"),
        _ => format!("{service} returned {status}"),
    }
}

fn describe_errors(errors: &[ApiError], fallback: &str) -> String {
    errors
        .first()
        .map(|e| {
            if e.detail.is_empty() {
                e.title.clone()
            } else {
                e.detail.clone()
            }
        })
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| fallback.to_string())
}

/// Tweets from a timeline envelope. An `errors`-only body (protected or
/// suspended account) is a lookup failure; no data and no errors is an
/// empty timeline.
fn timeline_data(envelope: Envelope<Vec<Value>>, username: &str) -> VerifyResult<Vec<Value>> {
    match envelope.data {
        Some(tweets) => Ok(tweets),
        None if envelope.errors.is_empty() => Ok(Vec::new()),
        None => Err(VerifyError::lookup(describe_errors(
            &envelope.errors,
            &format!("timeline of @{username} unavailable"),
        ))),
    }
}

/// Convert raw v2 tweets into posts, skipping entries that do not parse.
fn timeline_to_posts(timeline: Vec<Value>) -> Vec<Post> {
    timeline
        .into_iter()
        .filter_map(|raw| serde_json::from_value::<Tweet>(raw).ok())
        .map(|tweet| Post {
            id: tweet.id,
            text: tweet.text,
            mention_ids: tweet
                .entities
                .unwrap_or_default()
                .mentions
                .into_iter()
                .filter_map(|m| m.id)
                .collect(),
        })
        .collect()
}

/// Extract raw and display scores from a Botometer response.
///
/// Accepts the v4 `raw_scores` layout and the legacy flat `scores` layout.
pub fn parse_scores(response: &Value) -> VerifyResult<RiskScores> {
    let raw = response
        .get("raw_scores")
        .or_else(|| response.get("scores"))
        .ok_or_else(|| VerifyError::lookup("botometer response contained no scores"))?;
    let display = response
        .get("display_scores")
        .map(flatten_scores)
        .unwrap_or_default();
    Ok(RiskScores {
        raw: flatten_scores(raw),
        display,
    })
}

/// Flatten nested score objects into `group.dimension` keys. Non-numeric
/// leaves are dropped.
pub fn flatten_scores(value: &Value) -> BTreeMap<String, f64> {
    fn walk(prefix: &str, value: &Value, out: &mut BTreeMap<String, f64>) {
        match value {
            Value::Number(n) => {
                if let Some(score) = n.as_f64() {
                    out.insert(prefix.to_string(), score);
                }
            }
            Value::Object(map) => {
                for (key, child) in map {
                    let name = if prefix.is_empty() {
                        key.clone()
                    } else {
                        format!("{prefix}.{key}")
                    };
                    walk(&name, child, out);
                }
            }
            _ => {}
        }
    }

    let mut out = BTreeMap::new();
    walk("", value, &mut out);
    out
}
