use thiserror::Error;

/// Failures of the external data sources behind a verification.
///
/// Conflicting claims and inconsistent applicants are verification
/// outcomes, not errors; see [`crate::types::VerificationResult`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum VerifyError {
    /// Social provider error: unknown handle, rate limit, network.
    #[error("social lookup failed: {0}")]
    LookupFailure(String),
    /// Chain node unreachable or returned an error.
    #[error("registry unavailable: {0}")]
    RegistryUnavailable(String),
}

impl VerifyError {
    pub fn lookup(msg: impl Into<String>) -> Self {
        Self::LookupFailure(msg.into())
    }

    pub fn registry(msg: impl Into<String>) -> Self {
        Self::RegistryUnavailable(msg.into())
    }
}

pub type VerifyResult<T> = Result<T, VerifyError>;
