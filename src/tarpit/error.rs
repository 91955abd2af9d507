//! Error type for [`super::Generator`].

#[derive(Debug, thiserror::Error)]
pub enum TarpitError {
    #[error("store error while accounting hop: {0}")]
    Store(#[from] crate::store::StoreError),
    #[error("failed to build archive: {0}")]
    Archive(anyhow::Error),
}
