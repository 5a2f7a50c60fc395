use std::sync::Arc;

use alloy::primitives::Address;
use tracing::debug;

use crate::error::VerifyResult;
use crate::social::SocialClient;
use crate::types::{ClaimOutcome, Post, format_address};

/// Number of hex digits in an address token.
const ADDRESS_HEX_LEN: usize = 40;

/// Finds the address a handle claimed in posts mentioning the
/// identity-verification account.
pub struct AddressExtractor {
    social: Arc<dyn SocialClient>,
    identity_account_id: String,
}

impl AddressExtractor {
    pub fn new(social: Arc<dyn SocialClient>, identity_account_id: impl Into<String>) -> Self {
        Self {
            social,
            identity_account_id: identity_account_id.into(),
        }
    }

    /// Fetch `handle`'s recent posts and extract its single claimed address.
    ///
    /// Fetch failures propagate as `LookupFailure`; they are never reported
    /// as `NotFound`.
    pub async fn extract_claimed_address(&self, handle: &str) -> VerifyResult<ClaimOutcome> {
        let posts = self.social.fetch_recent_posts(handle).await?;
        let outcome = scan_posts(&posts, &self.identity_account_id);
        debug!(
            "Scanned {} post(s) for {handle}: {:?}",
            posts.len(),
            outcome
        );
        Ok(outcome)
    }
}

/// Scan posts that mention `account_id` for address tokens.
///
/// Stops at the first address that differs from an earlier one.
pub fn scan_posts(posts: &[Post], account_id: &str) -> ClaimOutcome {
    let mut claimed: Option<Address> = None;

    for post in posts.iter().filter(|p| p.mentions(account_id)) {
        let Some(found) = find_address(&post.text) else {
            continue;
        };
        debug!("Post {} claims {}", post.id, format_address(&found));
        match claimed {
            None => claimed = Some(found),
            Some(prev) if prev != found => return ClaimOutcome::Conflict(vec![prev, found]),
            Some(_) => {}
        }
    }

    match claimed {
        Some(addr) => ClaimOutcome::Found(addr),
        None => ClaimOutcome::NotFound,
    }
}

/// First `0x` + 40 hex digit token in `text`.
///
/// A token must not be followed by another hex digit, and must not be the
/// tail of a longer alphanumeric word.
pub fn find_address(text: &str) -> Option<Address> {
    let bytes = text.as_bytes();
    let token_len = 2 + ADDRESS_HEX_LEN;
    let mut i = 0;

    while i + token_len <= bytes.len() {
        let starts_token = bytes[i] == b'0'
            && bytes[i + 1] == b'x'
            && (i == 0 || !bytes[i - 1].is_ascii_alphanumeric());
        if starts_token {
            let digits = &bytes[i + 2..i + token_len];
            let bounded = bytes
                .get(i + token_len)
                .is_none_or(|b| !b.is_ascii_hexdigit());
            if bounded && digits.iter().all(u8::is_ascii_hexdigit) {
                if let Ok(addr) = text[i..i + token_len].parse::<Address>() {
                    return Some(addr);
                }
            }
        }
        i += 1;
    }
    None
}
