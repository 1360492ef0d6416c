use thiserror::Error;

/// Failures while obtaining the upstream catalog. All of these abort the
/// pass before any write happens.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("upstream catalog unavailable: {0}")]
    Unavailable(String),

    #[error("upstream catalog request timed out after {0}s")]
    Timeout(u64),

    #[error("upstream catalog returned zero records on every call convention")]
    EmptyCatalog,

    #[error("upstream catalog response has no recognizable shape: {0}")]
    MalformedShape(String),
}

#[derive(Error, Debug)]
pub enum SyncError {
    #[error("catalog fetch failed: {0}")]
    Fetch(#[from] FetchError),

    #[error("batch commit failed: {0}")]
    BatchCommitFailed(String),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON deserialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Store error: {message}")]
    Store { message: String },
}

pub type Result<T> = std::result::Result<T, SyncError>;
