use thiserror::Error;

#[derive(Debug, Error)]
pub enum BizuError {
    #[error("not authenticated: {0}")]
    Unauthenticated(String),
    #[error("forbidden: {0}")]
    Forbidden(String),
    #[error("validation failed: {0}")]
    ValidationFailed(String),
    #[error("not found: {0}")]
    NotFound(String),
    /// A fetch superseded by a newer one. Never surfaced to views.
    #[error("request superseded")]
    Cancelled,
    #[error("backend failure: {0}")]
    Transient(String),
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("decode error: {0}")]
    Decode(#[from] serde_json::Error),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl BizuError {
    /// Whether re-triggering the same action may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(self, BizuError::Transient(_) | BizuError::Network(_))
    }
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("storage quota exceeded ({used} of {quota} bytes)")]
    QuotaExceeded { used: usize, quota: usize },
    #[error("storage i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("storage serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("no configuration directory available on this platform")]
    NoConfigDir,
    #[error("config i/o error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
}
