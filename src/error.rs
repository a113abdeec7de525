use thiserror::Error;

/// Update pipeline error type
#[derive(Debug, Error)]
pub enum Error {
    #[error("network error: {0}")]
    Network(String),

    #[error("timeout")]
    Timeout,

    #[error("invalid update feed: {0}")]
    FeedParse(String),

    #[error("corrupt update download: {0}")]
    ArtifactIntegrity(String),

    #[error("could not hand off to installer: {0}")]
    InstallHandoff(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl From<reqwest::Error> for Error {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            Error::Timeout
        } else if err.is_decode() {
            Error::FeedParse(err.to_string())
        } else {
            Error::Network(err.to_string())
        }
    }
}

/// Convenience Result type using our Error
pub type Result<T> = std::result::Result<T, Error>;
