//! Chat-facing text for verification outcomes.

use std::collections::BTreeMap;

use crate::types::{
    ApplicantCheck, ApplicationEvent, NoticeKind, RiskLevel, VerificationResult, Verdict,
    format_address,
};

pub const USAGE: &str =
    "Could not find the twitter username, please use '!Verify @theusername' as the command";

pub const DONE: &str = "All done, nothing more to check";

/// `name: 1.2 other: 0.4`, one decimal per score.
pub fn format_scores(scores: &BTreeMap<String, f64>) -> String {
    scores
        .iter()
        .map(|(name, score)| format!("{name}: {score:.1}"))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Verdict line shared by the command and the poller.
pub fn verdict_line(verdict: &Verdict) -> String {
    let scores = format_scores(verdict.scores.for_display());
    match verdict.level {
        RiskLevel::Clear => "[OK] This twitter account doesn't look like a bot".to_string(),
        RiskLevel::Suspicious => format!(
            "[WARNING] The twitter account might be a bot, check manually. \
             The following scores (0 = human, 5 = bot) have been determined: {scores}"
        ),
        RiskLevel::LikelyBot => format!(
            "[WARNING] The twitter account is very likely a bot!!! \
             The following scores (0 = human, 5 = bot) have been determined: {scores}"
        ),
    }
}

/// Replies for a `!verify` command, in the order they are sent.
pub fn render_verification(handle: &str, result: &VerificationResult) -> Vec<String> {
    let mut out = Vec::new();
    match result {
        VerificationResult::AddressNotTweeted => {
            out.push(format!(
                "[WARNING] Couldn't detect tweet with Ethereum address for {handle}"
            ));
        }
        VerificationResult::ConflictingTweets(_) => {
            out.push(format!(
                "[WARNING] Account {handle} posted multiple tweets with different ethereum addresses, aborting"
            ));
        }
        VerificationResult::LookupFailed(reason) => {
            out.push(format!("[WARNING] Verification of {handle} failed: {reason}"));
        }
        VerificationResult::NoOnChainApplication(address) => {
            out.push(found_line(handle, address));
            out.push(format!(
                "[WARNING] Couldn't find any on-chain applications for HumanityDAO with Ethereum address {}",
                format_address(address)
            ));
        }
        VerificationResult::InconsistentApplicants { address, usernames } => {
            out.push(found_line(handle, address));
            out.push(format!(
                "[WARNING] Ethereum address {} applied as {} which doesn't match {handle}, check manually",
                format_address(address),
                usernames.join(", ")
            ));
        }
        VerificationResult::Verified { address, verdict } => {
            out.push(found_line(handle, address));
            out.push(format!(
                "[OK] Verified Ethereum address {} in application for {handle}",
                format_address(address)
            ));
            out.push(verdict_line(verdict));
            out.push(DONE.to_string());
        }
    }
    out
}

fn found_line(handle: &str, address: &alloy::primitives::Address) -> String {
    format!(
        "[OK] Found tweet with Ethereum address {} for {handle}",
        format_address(address)
    )
}

/// Notification for one application seen by the poller.
pub fn render_applicant(event: &ApplicationEvent, check: &ApplicantCheck) -> (NoticeKind, String) {
    let id = event.proposal_id;
    let user = &event.username;
    let applicant = format_address(&event.applicant);
    match check {
        ApplicantCheck::AddressNotTweeted => (
            NoticeKind::Mismatch,
            format!(
                "[WARNING] Application #{id}: couldn't detect tweet with Ethereum address for {user}"
            ),
        ),
        ApplicantCheck::ConflictingTweets(_) => (
            NoticeKind::Mismatch,
            format!(
                "[WARNING] Application #{id}: {user} posted multiple tweets with different ethereum addresses"
            ),
        ),
        ApplicantCheck::AddressMismatch { tweeted } => (
            NoticeKind::Mismatch,
            format!(
                "[WARNING] Application #{id}: {user} tweeted {} but applied with {applicant}",
                format_address(tweeted)
            ),
        ),
        ApplicantCheck::Verified(verdict) if verdict.level == RiskLevel::Clear => (
            NoticeKind::Welcome,
            format!(
                "[OK] Welcome {user}! Application #{id} from {applicant} checks out and the account doesn't look like a bot"
            ),
        ),
        ApplicantCheck::Verified(verdict) => (
            NoticeKind::RiskWarning,
            format!(
                "Application #{id} by {user} ({applicant}): {}",
                verdict_line(verdict)
            ),
        ),
    }
}

/// Notification for an application that could not be checked.
pub fn render_failure(event: &ApplicationEvent, reason: &str) -> String {
    format!(
        "[WARNING] Application #{} by {} could not be checked: {reason}",
        event.proposal_id, event.username
    )
}
