//! Error type for [`super::Store`].

/// Failure modes for a Store call. Callers translate `Timeout` and `Backend`
/// into the documented fail-open value at the call site — these never
/// propagate as a 5xx. `Invariant` is a bug marker and is not expected to be
/// constructed outside a `panic!` (kept for completeness and for any future
/// caller that wants to match on it before the panic unwinds the task).
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("store call exceeded its deadline")]
    Timeout,
    #[error("redis backend error: {0}")]
    Backend(#[from] redis::RedisError),
    #[error("store invariant violated: {0}")]
    Invariant(String),
}
