//! Error types for herald.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    /// Persisted state exists but is unreadable or fails schema validation.
    /// Distinct from "no state yet": corrupt state must never be treated as
    /// empty, or the whole history would be re-announced.
    #[error("invalid persisted state: {0}")]
    State(String),

    #[error("source error: {0}")]
    Source(String),

    #[error("publish error: {0}")]
    Publish(String),

    #[error("summary error: {0}")]
    Summary(String),

    #[error("http error: {0}")]
    Http(#[from] reqwest::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("{0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, Error>;
