//! Error types for pool operations

/// Errors from pool operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("no usable token: {0}")]
    NoUsableToken(String),

    #[error("token manager not initialized")]
    NotInitialized,

    #[error("credential index {0} out of range")]
    IndexOutOfRange(usize),

    #[error("credential {0} is disabled")]
    CredentialDisabled(String),

    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    #[error(transparent)]
    Credential(#[from] kiro_auth::Error),
}

/// Result alias for pool operations.
pub type Result<T> = std::result::Result<T, Error>;
