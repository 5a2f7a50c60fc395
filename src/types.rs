use std::collections::BTreeMap;
use std::fmt;

use alloy::primitives::{Address, U256};
use serde::Serialize;

/// A single post from a social account's timeline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Post {
    pub id: String,
    pub text: String,
    /// Stable account ids of every account mentioned in the post.
    pub mention_ids: Vec<String>,
}

impl Post {
    pub fn mentions(&self, account_id: &str) -> bool {
        self.mention_ids.iter().any(|id| id == account_id)
    }
}

/// An `Apply` event emitted by the registry contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplicationEvent {
    pub proposal_id: U256,
    pub applicant: Address,
    /// Social handle claimed in the application. Not validated on-chain.
    pub username: String,
    pub block_number: Option<u64>,
}

/// Outcome of scanning a handle's posts for a claimed address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClaimOutcome {
    Found(Address),
    /// Two distinct addresses were found; carries both in discovery order.
    Conflict(Vec<Address>),
    NotFound,
}

/// Named sub-scores returned by the scoring oracle.
///
/// `raw` drives classification and is normalized to `[0, 1]`.
/// `display` is the oracle's human-facing scale (0 = human, 5 = bot).
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct RiskScores {
    pub raw: BTreeMap<String, f64>,
    pub display: BTreeMap<String, f64>,
}

impl RiskScores {
    pub fn from_raw<I, K>(scores: I) -> Self
    where
        I: IntoIterator<Item = (K, f64)>,
        K: Into<String>,
    {
        Self {
            raw: scores.into_iter().map(|(k, v)| (k.into(), v)).collect(),
            display: BTreeMap::new(),
        }
    }

    /// Scores to show to users: display scale when present, raw otherwise.
    pub fn for_display(&self) -> &BTreeMap<String, f64> {
        if self.display.is_empty() {
            &self.raw
        } else {
            &self.display
        }
    }
}

/// Three-level automation risk, ordered by severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RiskLevel {
    Clear,
    Suspicious,
    LikelyBot,
}

impl RiskLevel {
    pub fn label(&self) -> &'static str {
        match self {
            RiskLevel::Clear => "clear",
            RiskLevel::Suspicious => "suspicious",
            RiskLevel::LikelyBot => "likely bot",
        }
    }
}

impl fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Verdict {
    pub level: RiskLevel,
    pub scores: RiskScores,
}

/// Result of the on-demand `!verify @handle` path.
#[derive(Debug, Clone, PartialEq)]
pub enum VerificationResult {
    AddressNotTweeted,
    ConflictingTweets(Vec<Address>),
    LookupFailed(String),
    NoOnChainApplication(Address),
    InconsistentApplicants {
        address: Address,
        usernames: Vec<String>,
    },
    Verified {
        address: Address,
        verdict: Verdict,
    },
}

/// Result of confirming an on-chain application against the applicant's posts.
#[derive(Debug, Clone, PartialEq)]
pub enum ApplicantCheck {
    AddressNotTweeted,
    ConflictingTweets(Vec<Address>),
    /// The handle tweeted a different address than the one that applied.
    AddressMismatch { tweeted: Address },
    Verified(Verdict),
}

/// Which notification the poller emitted for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeKind {
    Welcome,
    RiskWarning,
    Mismatch,
    Failure,
}

/// Summary of one poll cycle, emitted as a JSON line.
#[derive(Debug, Clone, Serialize)]
pub struct CycleReport {
    pub timestamp: String,
    pub from_block: u64,
    pub to_block: u64,
    pub events: usize,
    pub notices: Vec<NoticeKind>,
}

impl CycleReport {
    pub fn count(&self, kind: NoticeKind) -> usize {
        self.notices.iter().filter(|k| **k == kind).count()
    }
}

/// Lowercase `0x`-prefixed rendering used in every user-facing message.
pub fn format_address(address: &Address) -> String {
    format!("{address:#x}")
}

/// Canonical form of a social handle: no leading `@`, lowercase.
pub fn normalize_handle(handle: &str) -> String {
    handle.trim().trim_start_matches('@').to_lowercase()
}
