//! In-memory collaborators for unit tests.

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use alloy::primitives::{Address, U256};
use async_trait::async_trait;

use crate::error::{VerifyError, VerifyResult};
use crate::registry::EventSource;
use crate::reporter::Notifier;
use crate::social::SocialClient;
use crate::types::{ApplicationEvent, Post, RiskScores, normalize_handle};

pub const ACCOUNT: &str = "1118447927112781824";

pub fn post(text: &str, mentions: &[&str]) -> Post {
    Post {
        id: String::new(),
        text: text.to_string(),
        mention_ids: mentions.iter().map(|m| m.to_string()).collect(),
    }
}

pub fn event(proposal_id: u64, applicant: &str, username: &str, block: u64) -> ApplicationEvent {
    ApplicationEvent {
        proposal_id: U256::from(proposal_id),
        applicant: applicant.parse().expect("valid test address"),
        username: username.to_string(),
        block_number: Some(block),
    }
}

#[derive(Default)]
struct SocialInner {
    posts: HashMap<String, Vec<Post>>,
    scores: HashMap<String, RiskScores>,
    failing_scores: HashSet<String>,
    score_requests: AtomicUsize,
}

/// Social client with canned timelines. Handles without a timeline fail
/// with `LookupFailure`.
#[derive(Clone, Default)]
pub struct FakeSocial {
    inner: Arc<SocialInner>,
}

impl FakeSocial {
    pub fn with_posts(mut self, handle: &str, posts: Vec<Post>) -> Self {
        self.state().posts.insert(normalize_handle(handle), posts);
        self
    }

    pub fn with_scores(mut self, handle: &str, scores: &[(&str, f64)]) -> Self {
        self.state().scores.insert(
            normalize_handle(handle),
            RiskScores::from_raw(scores.iter().copied()),
        );
        self
    }

    /// Make the score oracle fail for `handle`.
    pub fn with_score_failure(mut self, handle: &str) -> Self {
        self.state().failing_scores.insert(normalize_handle(handle));
        self
    }

    pub fn score_requests(&self) -> usize {
        self.inner.score_requests.load(Ordering::SeqCst)
    }

    fn state(&mut self) -> &mut SocialInner {
        Arc::get_mut(&mut self.inner).expect("configure FakeSocial before cloning it")
    }
}

#[async_trait]
impl SocialClient for FakeSocial {
    async fn fetch_recent_posts(&self, handle: &str) -> VerifyResult<Vec<Post>> {
        self.inner
            .posts
            .get(&normalize_handle(handle))
            .cloned()
            .ok_or_else(|| VerifyError::lookup(format!("unknown handle {handle}")))
    }

    async fn fetch_risk_scores(&self, handle: &str) -> VerifyResult<RiskScores> {
        self.inner.score_requests.fetch_add(1, Ordering::SeqCst);
        let key = normalize_handle(handle);
        if self.inner.failing_scores.contains(&key) {
            return Err(VerifyError::lookup("botometer rate limit reached"));
        }
        Ok(self
            .inner
            .scores
            .get(&key)
            .cloned()
            .unwrap_or_default())
    }
}

#[derive(Default)]
struct ChainInner {
    head: AtomicU64,
    events: Mutex<Vec<ApplicationEvent>>,
    fail_head: AtomicBool,
    fail_logs: AtomicBool,
    logs_budget: Mutex<Option<usize>>,
    range_queries: Mutex<Vec<(u64, u64)>>,
}

/// Chain with a settable head and a fixed event log.
#[derive(Clone, Default)]
pub struct FakeChain {
    inner: Arc<ChainInner>,
}

impl FakeChain {
    pub fn with_head(head: u64) -> Self {
        let chain = Self::default();
        chain.set_head(head);
        chain
    }

    pub fn with_events(self, events: Vec<ApplicationEvent>) -> Self {
        self.push_events(events);
        self
    }

    pub fn push_events(&self, events: Vec<ApplicationEvent>) {
        self.inner.events.lock().unwrap().extend(events);
    }

    pub fn set_head(&self, head: u64) {
        self.inner.head.store(head, Ordering::SeqCst);
    }

    pub fn fail_head(&self, fail: bool) {
        self.inner.fail_head.store(fail, Ordering::SeqCst);
    }

    pub fn fail_logs(&self, fail: bool) {
        self.inner.fail_logs.store(fail, Ordering::SeqCst);
        if !fail {
            *self.inner.logs_budget.lock().unwrap() = None;
        }
    }

    /// Let `queries` more range queries succeed, then fail every log query
    /// until `fail_logs(false)`.
    pub fn fail_logs_after(&self, queries: usize) {
        *self.inner.logs_budget.lock().unwrap() = Some(queries);
    }

    /// Unfiltered range queries seen so far.
    pub fn range_queries(&self) -> Vec<(u64, u64)> {
        self.inner.range_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl EventSource for FakeChain {
    async fn head_height(&self) -> VerifyResult<u64> {
        if self.inner.fail_head.load(Ordering::SeqCst) {
            return Err(VerifyError::registry("connection refused"));
        }
        Ok(self.inner.head.load(Ordering::SeqCst))
    }

    async fn query_events(
        &self,
        from_block: u64,
        to_block: u64,
        applicant: Option<Address>,
    ) -> VerifyResult<Vec<ApplicationEvent>> {
        if self.inner.fail_logs.load(Ordering::SeqCst) {
            return Err(VerifyError::registry("eth_getLogs failed"));
        }
        if applicant.is_none() {
            let mut budget = self.inner.logs_budget.lock().unwrap();
            match budget.as_mut() {
                Some(0) => {
                    self.inner.fail_logs.store(true, Ordering::SeqCst);
                    return Err(VerifyError::registry("eth_getLogs failed"));
                }
                Some(left) => *left -= 1,
                None => {}
            }
            drop(budget);
            self.inner
                .range_queries
                .lock()
                .unwrap()
                .push((from_block, to_block));
        }
        let events = self.inner.events.lock().unwrap();
        Ok(events
            .iter()
            .filter(|e| {
                let block = e.block_number.unwrap_or(0);
                block >= from_block && block <= to_block
            })
            .filter(|e| applicant.is_none_or(|a| e.applicant == a))
            .cloned()
            .collect())
    }
}

/// Notifier that records every message.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<String>>>,
    typing: Arc<AtomicUsize>,
}

impl RecordingNotifier {
    pub fn sent(&self) -> Vec<String> {
        self.sent.lock().unwrap().clone()
    }

    pub fn typing_count(&self) -> usize {
        self.typing.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send(&self, text: &str) {
        self.sent.lock().unwrap().push(text.to_string());
    }

    async fn indicate_activity(&self) {
        self.typing.fetch_add(1, Ordering::SeqCst);
    }
}
