//! Error type for [`super::Backend`].

#[derive(Debug, thiserror::Error)]
pub enum MarkovError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] sqlx::Error),
    #[error("corpus file error: {0}")]
    Corpus(#[from] std::io::Error),
}
