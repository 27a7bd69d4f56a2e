//! Error types for credential loading and upstream auth calls

/// Errors from credential loading and upstream auth operations.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("HTTP request failed: {0}")]
    Http(String),

    #[error("token exchange failed: {0}")]
    TokenExchange(String),

    #[error("invalid credentials: {0}")]
    InvalidCredentials(String),

    #[error("usage check failed: {0}")]
    Usage(String),

    #[error("credential parse error: {0}")]
    CredentialParse(String),

    #[error("credential configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(String),
}

/// Result alias for auth operations.
pub type Result<T> = std::result::Result<T, Error>;
