//! Error types for the Escalation Scorer.

#[derive(Debug, thiserror::Error)]
pub enum ScorerError {
    #[error("store error while reading/writing scorer state: {0}")]
    Store(#[from] crate::store::StoreError),
}

/// Failure mode for a [`super::classify::Classify`] adapter. Every signal
/// that produces this is treated as contributing 0 to the fused score — no
/// single external dependency can cause a request to hang or fail the
/// decision.
#[derive(Debug, thiserror::Error)]
pub enum ClassifyError {
    #[error("classifier call timed out")]
    Timeout,
    #[error("classifier transport error: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("classifier returned an unexpected response")]
    BadResponse,
}
