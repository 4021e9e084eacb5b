use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Client secrets file not found: {0}. Download OAuth desktop credentials from the Google Cloud Console.")]
    ClientSecretsNotFound(PathBuf),
    #[error("Invalid client secrets file: {0}")]
    ClientSecrets(String),
    #[error("Token storage error: {0}")]
    Storage(String),
    #[error("Refresh token was revoked or is invalid: {0}")]
    Revoked(String),
    #[error("Stored credential has no refresh token")]
    MissingRefreshToken,
    #[error("Token endpoint rejected the request: {0}")]
    TokenEndpoint(String),
    #[error("Authorization flow failed: {0}")]
    Consent(String),
    #[error("Access token rejected by the API: {0}")]
    Unauthorized(String),
    #[error("Network error while contacting the OAuth server: {0}")]
    Network(String),
    #[error("Invalid OAuth configuration: {0}")]
    Config(String),
}

impl AuthError {
    /// Whether running the interactive authorization flow again is the remedy.
    pub fn requires_reauthentication(&self) -> bool {
        matches!(
            self,
            AuthError::Revoked(_)
                | AuthError::MissingRefreshToken
                | AuthError::TokenEndpoint(_)
                | AuthError::Unauthorized(_)
        )
    }
}

impl From<std::io::Error> for AuthError {
    fn from(e: std::io::Error) -> Self {
        AuthError::Storage(e.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(e: url::ParseError) -> Self {
        AuthError::Config(e.to_string())
    }
}
