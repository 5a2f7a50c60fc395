use async_trait::async_trait;

use crate::error::VerifyResult;
use crate::types::{Post, RiskScores};

/// Read access to a social network and its bot-scoring oracle.
#[async_trait]
pub trait SocialClient: Send + Sync {
    /// Recent posts authored by `handle`, newest first. The window size is
    /// the implementation's choice.
    async fn fetch_recent_posts(&self, handle: &str) -> VerifyResult<Vec<Post>>;

    /// Automation scores for `handle`.
    async fn fetch_risk_scores(&self, handle: &str) -> VerifyResult<RiskScores>;
}
