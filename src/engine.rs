use crate::types::{ApplicationEvent, RiskLevel, RiskScores, Verdict, normalize_handle};

/// Any raw score strictly above this marks the account as a likely bot.
pub const LIKELY_BOT_THRESHOLD: f64 = 0.8;

/// Any raw score strictly above this marks the account as suspicious.
pub const SUSPICIOUS_THRESHOLD: f64 = 0.3;

/// Classify an account's automation risk from its raw sub-scores.
///
/// The highest threshold crossed by any dimension wins, so the result does
/// not depend on iteration order. An empty score set is `Clear`.
pub fn classify(scores: RiskScores) -> Verdict {
    let level = risk_level(scores.raw.values().copied());
    Verdict { level, scores }
}

/// Risk level for a sequence of raw scores. NaN never crosses a threshold.
pub fn risk_level(scores: impl IntoIterator<Item = f64>) -> RiskLevel {
    scores
        .into_iter()
        .map(|score| {
            if score > LIKELY_BOT_THRESHOLD {
                RiskLevel::LikelyBot
            } else if score > SUSPICIOUS_THRESHOLD {
                RiskLevel::Suspicious
            } else {
                RiskLevel::Clear
            }
        })
        .max()
        .unwrap_or(RiskLevel::Clear)
}

/// Check that every application for one address claims `handle`.
///
/// Returns the distinct claimed usernames (in first-seen order) when the
/// applications disagree with each other or with `handle`.
pub fn check_applicant_consistency(
    handle: &str,
    events: &[ApplicationEvent],
) -> Result<(), Vec<String>> {
    let wanted = normalize_handle(handle);
    let mut distinct: Vec<String> = Vec::new();
    for event in events {
        if !distinct
            .iter()
            .any(|u| normalize_handle(u) == normalize_handle(&event.username))
        {
            distinct.push(event.username.clone());
        }
    }

    match distinct.as_slice() {
        [only] if normalize_handle(only) == wanted => Ok(()),
        _ => Err(distinct),
    }
}
