//! Error types for the deployment service

use thiserror::Error;

/// Main error type for the deployment service
#[derive(Error, Debug)]
pub enum DeployerError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Fetch error: {0}")]
    FetchError(String),

    #[error("No release asset named {0}")]
    AssetNotFound(String),

    #[error("Install error: {0}")]
    InstallError(String),

    #[error("Subprocess error: {0}")]
    SubprocessError(String),

    #[error("Timed out: {0}")]
    Timeout(String),

    #[error("Deployment error: {0}")]
    DeployError(String),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl DeployerError {
    /// Whether the release fetcher failed in a way that only skips the
    /// artifact step. Timeouts are not included: they fail the task.
    pub fn is_fetch_failure(&self) -> bool {
        matches!(
            self,
            DeployerError::FetchError(_) | DeployerError::HttpError(_) | DeployerError::JsonError(_)
        )
    }
}
