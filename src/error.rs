//! Error types for listing-builder

use thiserror::Error;

use crate::workflow::SubmissionFailure;

/// Result type alias for listing-builder operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in listing-builder
#[derive(Error, Debug)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Storage error: {0}")]
    Storage(String),

    /// Local pre-flight check failed; never reaches the network.
    #[error("{0}")]
    Validation(String),

    #[error("Not logged in. Run 'listing-builder login' first.")]
    NotAuthenticated,

    #[error("Invalid state parameter received. Possible CSRF attack.")]
    StateMismatch,

    #[error("Code verifier not found. Start the login again.")]
    MissingVerifier,

    #[error("Authorization denied: {0}")]
    AuthorizationDenied(String),

    #[error("Failed to fetch access token: {status} {message}")]
    TokenExchangeFailed { status: u16, message: String },

    #[error("Authorization server response did not include an access_token")]
    MalformedTokenResponse,

    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    #[error("Malformed API response: {0}")]
    MalformedResponse(String),

    #[error("Could not find a shop associated with your account")]
    NoShopAssociated,

    #[error("{0}")]
    Submission(SubmissionFailure),

    #[error("OAuth error: {0}")]
    OAuth(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

impl Error {
    /// HTTP status carried by the error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            Error::Api { status, .. } | Error::TokenExchangeFailed { status, .. } => Some(*status),
            Error::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether this failure means the stored session can no longer be used.
    ///
    /// The remote API exposes no structured "expired token" code, so this is a
    /// heuristic: a 401 status, or any error text mentioning "token".
    pub fn is_auth_expired(&self) -> bool {
        self.status() == Some(401) || self.to_string().contains("token")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_401_is_auth_expired() {
        let err = Error::Api { status: 401, message: "Unauthorized".to_string() };
        assert!(err.is_auth_expired());
    }

    #[test]
    fn test_token_message_is_auth_expired() {
        let err = Error::Api { status: 400, message: "invalid_token".to_string() };
        assert!(err.is_auth_expired());
    }

    #[test]
    fn test_server_error_is_not_auth_expired() {
        let err = Error::Api { status: 500, message: "Internal Server Error".to_string() };
        assert!(!err.is_auth_expired());
        assert!(!Error::NoShopAssociated.is_auth_expired());
    }
}
