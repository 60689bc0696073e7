use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

/// Failures surfaced to the view layer. Per-item enrichment failures and
/// unreadable local state never reach here; they degrade to defaults at the
/// point of failure.
#[derive(Error, Debug)]
pub enum Error {
    #[error("{0} is not set; add it to your .env file")]
    Configuration(&'static str),

    #[error("no matching record: {0}")]
    NotFound(String),

    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("provider error: {0}")]
    Provider(String),
}
