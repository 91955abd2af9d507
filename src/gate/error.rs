//! Error types for the Edge Gate.

#[derive(Debug, thiserror::Error)]
pub enum GateError {
    #[error("store error while evaluating a gate decision: {0}")]
    Store(#[from] crate::store::StoreError),
}
