use std::sync::Arc;

use tracing::{debug, info};

use crate::api::TwitterBotometerClient;
use crate::chain::RpcEventSource;
use crate::config::{AppConfig, Secrets};
use crate::engine::{check_applicant_consistency, classify};
use crate::error::VerifyResult;
use crate::extractor::AddressExtractor;
use crate::registry::RegistryClient;
use crate::social::SocialClient;
use crate::types::{
    ApplicantCheck, ApplicationEvent, ClaimOutcome, VerificationResult, format_address,
};

/// Reconciles social claims, on-chain applications and risk scores.
///
/// Holds no mutable state; one instance is shared by every command and the
/// poller.
pub struct Verifier {
    extractor: AddressExtractor,
    registry: RegistryClient,
    social: Arc<dyn SocialClient>,
}

impl Verifier {
    pub fn new(
        social: Arc<dyn SocialClient>,
        registry: RegistryClient,
        identity_account_id: impl Into<String>,
    ) -> Self {
        Self {
            extractor: AddressExtractor::new(social.clone(), identity_account_id),
            registry,
            social,
        }
    }

    /// Wire the Twitter/Botometer client and the JSON-RPC registry from config.
    pub fn from_config(config: &AppConfig, secrets: &Secrets) -> anyhow::Result<Self> {
        let social = TwitterBotometerClient::new(
            &config.social.twitter_api_base,
            &config.social.botometer_api_base,
            secrets.twitter_bearer_token.clone(),
            secrets.rapidapi_key.clone(),
            config.social.timeline_limit,
            config.request_timeout(),
        )?;
        let source = RpcEventSource::new(
            &config.chain.rpc_url,
            config.registry_address()?,
            config.request_timeout(),
        )?;
        Ok(Self::new(
            Arc::new(social),
            RegistryClient::new(Arc::new(source)),
            config.social.identity_account_id.clone(),
        ))
    }

    pub fn registry(&self) -> &RegistryClient {
        &self.registry
    }

    /// Verify `handle` end to end, stopping at the first inconclusive stage.
    pub async fn verify_handle(&self, handle: &str) -> VerificationResult {
        match self.try_verify_handle(handle).await {
            Ok(result) => result,
            Err(e) => VerificationResult::LookupFailed(e.to_string()),
        }
    }

    async fn try_verify_handle(&self, handle: &str) -> VerifyResult<VerificationResult> {
        let address = match self.extractor.extract_claimed_address(handle).await? {
            ClaimOutcome::Found(addr) => addr,
            ClaimOutcome::NotFound => return Ok(VerificationResult::AddressNotTweeted),
            ClaimOutcome::Conflict(addrs) => {
                return Ok(VerificationResult::ConflictingTweets(addrs));
            }
        };
        debug!("{handle} claims {}", format_address(&address));

        let applications = self.registry.query_by_applicant(address).await?;
        if applications.is_empty() {
            return Ok(VerificationResult::NoOnChainApplication(address));
        }
        if let Err(usernames) = check_applicant_consistency(handle, &applications) {
            return Ok(VerificationResult::InconsistentApplicants { address, usernames });
        }

        let scores = self.social.fetch_risk_scores(handle).await?;
        let verdict = classify(scores);
        info!(
            "Verified {handle} as {} ({})",
            format_address(&address),
            verdict.level
        );
        Ok(VerificationResult::Verified { address, verdict })
    }

    /// Confirm that an application's username tweeted the applying address.
    ///
    /// A mismatch stops before the risk check.
    pub async fn check_applicant(&self, event: &ApplicationEvent) -> VerifyResult<ApplicantCheck> {
        let tweeted = match self
            .extractor
            .extract_claimed_address(&event.username)
            .await?
        {
            ClaimOutcome::Found(addr) => addr,
            ClaimOutcome::NotFound => return Ok(ApplicantCheck::AddressNotTweeted),
            ClaimOutcome::Conflict(addrs) => return Ok(ApplicantCheck::ConflictingTweets(addrs)),
        };
        if tweeted != event.applicant {
            return Ok(ApplicantCheck::AddressMismatch { tweeted });
        }

        let scores = self.social.fetch_risk_scores(&event.username).await?;
        Ok(ApplicantCheck::Verified(classify(scores)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{ACCOUNT, FakeChain, FakeSocial, event, post};
    use crate::types::RiskLevel;

    const ADDR: &str = "0xabcdef0123456789abcdef0123456789abcdef01";
    const OTHER: &str = "0x1111111111111111111111111111111111111111";

    fn verifier(social: FakeSocial, chain: FakeChain) -> Verifier {
        let registry = RegistryClient::new(Arc::new(chain));
        Verifier::new(Arc::new(social), registry, ACCOUNT)
    }

    fn tweeting(handle: &str, addr: &str) -> FakeSocial {
        FakeSocial::default().with_posts(handle, vec![post(&format!("joining {addr}"), &[ACCOUNT])])
    }

    // ── verify_handle ──────────────────────────────────────────────

    #[tokio::test]
    async fn not_tweeted() {
        let social = FakeSocial::default().with_posts("alice", vec![]);
        let v = verifier(social, FakeChain::with_head(10));
        assert_eq!(v.verify_handle("alice").await, VerificationResult::AddressNotTweeted);
    }

    #[tokio::test]
    async fn conflicting_tweets() {
        let social = FakeSocial::default().with_posts(
            "alice",
            vec![
                post(&format!("a {ADDR}"), &[ACCOUNT]),
                post(&format!("b {OTHER}"), &[ACCOUNT]),
            ],
        );
        let v = verifier(social, FakeChain::with_head(10));
        assert!(matches!(
            v.verify_handle("alice").await,
            VerificationResult::ConflictingTweets(addrs) if addrs.len() == 2
        ));
    }

    #[tokio::test]
    async fn unknown_handle_is_lookup_failure() {
        let v = verifier(FakeSocial::default(), FakeChain::with_head(10));
        assert!(matches!(
            v.verify_handle("ghost").await,
            VerificationResult::LookupFailed(_)
        ));
    }

    #[tokio::test]
    async fn registry_down_is_lookup_failure() {
        let chain = FakeChain::with_head(10);
        chain.fail_head(true);
        let v = verifier(tweeting("alice", ADDR), chain);
        match v.verify_handle("alice").await {
            VerificationResult::LookupFailed(reason) => assert!(reason.contains("registry")),
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn no_on_chain_application() {
        let chain = FakeChain::with_head(10).with_events(vec![event(1, OTHER, "alice", 2)]);
        let v = verifier(tweeting("alice", ADDR), chain);
        assert_eq!(
            v.verify_handle("alice").await,
            VerificationResult::NoOnChainApplication(ADDR.parse().unwrap())
        );
    }

    #[tokio::test]
    async fn inconsistent_applicants() {
        let chain = FakeChain::with_head(10).with_events(vec![
            event(1, ADDR, "alice", 2),
            event(2, ADDR, "mallory", 3),
        ]);
        let social = tweeting("alice", ADDR).with_scores("alice", &[("english", 0.1)]);
        let v = verifier(social.clone(), chain);
        assert!(matches!(
            v.verify_handle("alice").await,
            VerificationResult::InconsistentApplicants { usernames, .. } if usernames.len() == 2
        ));
        assert_eq!(social.score_requests(), 0);
    }

    #[tokio::test]
    async fn application_for_other_handle_is_inconsistent() {
        let chain = FakeChain::with_head(10).with_events(vec![event(1, ADDR, "bob", 2)]);
        let v = verifier(tweeting("alice", ADDR), chain);
        assert!(matches!(
            v.verify_handle("alice").await,
            VerificationResult::InconsistentApplicants { .. }
        ));
    }

    #[tokio::test]
    async fn verified_with_verdict() {
        let chain = FakeChain::with_head(10).with_events(vec![event(1, ADDR, "alice", 2)]);
        let social = tweeting("alice", ADDR).with_scores("alice", &[("english", 0.5)]);
        let v = verifier(social, chain);
        match v.verify_handle("alice").await {
            VerificationResult::Verified { address, verdict } => {
                assert_eq!(address, ADDR.parse::<alloy::primitives::Address>().unwrap());
                assert_eq!(verdict.level, RiskLevel::Suspicious);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn score_failure_is_lookup_failure() {
        let chain = FakeChain::with_head(10).with_events(vec![event(1, ADDR, "alice", 2)]);
        let social = tweeting("alice", ADDR).with_score_failure("alice");
        let v = verifier(social.clone(), chain);
        match v.verify_handle("alice").await {
            VerificationResult::LookupFailed(reason) => assert!(reason.contains("rate limit")),
            other => panic!("unexpected {other:?}"),
        }
        assert_eq!(social.score_requests(), 1);
    }

    // ── check_applicant ────────────────────────────────────────────

    #[tokio::test]
    async fn applicant_mismatch_skips_risk_check() {
        let social = tweeting("alice", OTHER).with_scores("alice", &[("english", 0.1)]);
        let v = verifier(social.clone(), FakeChain::with_head(10));
        let check = v.check_applicant(&event(7, ADDR, "alice", 3)).await.unwrap();
        assert_eq!(
            check,
            ApplicantCheck::AddressMismatch {
                tweeted: OTHER.parse().unwrap()
            }
        );
        assert_eq!(social.score_requests(), 0);
    }

    #[tokio::test]
    async fn applicant_confirmed() {
        let social = tweeting("alice", ADDR).with_scores("alice", &[("english", 0.05)]);
        let v = verifier(social, FakeChain::with_head(10));
        let check = v.check_applicant(&event(7, ADDR, "alice", 3)).await.unwrap();
        assert!(matches!(check, ApplicantCheck::Verified(v) if v.level == RiskLevel::Clear));
    }
}
