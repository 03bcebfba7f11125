//! Credential storage and management
//!
//! Holds at most one access token in a durable [`KeyValueStore`]. There is no
//! refresh token or expiry tracking: an expired token is detected when the
//! API rejects it, and cleared then.

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::Result;
use crate::storage::{FileStore, KeyValueStore};

/// Durable storage key for the access token
pub const ACCESS_TOKEN_KEY: &str = "access_token";

/// OAuth2 access token, redacted in Debug/Display
#[derive(Clone, PartialEq, Eq)]
pub struct AccessToken(String);

impl AccessToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Expose the raw token (for the Authorization header)
    pub fn secret(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccessToken([REDACTED])")
    }
}

impl fmt::Display for AccessToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[REDACTED]")
    }
}

/// Single-slot credential store
#[derive(Clone)]
pub struct CredentialStore {
    store: Arc<dyn KeyValueStore>,
}

impl CredentialStore {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    /// Store backed by a credentials file; needs no other configuration
    pub fn from_file(path: impl Into<PathBuf>) -> Self {
        Self::new(Arc::new(FileStore::new(path)))
    }

    /// Load the stored token.
    ///
    /// Storage failures are logged and reported as "no token".
    pub fn load(&self) -> Option<AccessToken> {
        match self.store.get(ACCESS_TOKEN_KEY) {
            Ok(Some(token)) if !token.is_empty() => Some(AccessToken(token)),
            Ok(_) => None,
            Err(e) => {
                tracing::warn!("Could not read stored credentials: {}", e);
                None
            }
        }
    }

    /// Persist a token, replacing any previous one
    pub fn save(&self, token: &AccessToken) -> Result<()> {
        self.store.set(ACCESS_TOKEN_KEY, token.secret())?;
        tracing::debug!("Access token saved");
        Ok(())
    }

    /// Remove the stored token. Best-effort: failures are only logged.
    pub fn clear(&self) {
        if let Err(e) = self.store.remove(ACCESS_TOKEN_KEY) {
            tracing::warn!("Failed to remove stored credentials: {}", e);
        }
    }

    pub fn is_logged_in(&self) -> bool {
        self.load().is_some()
    }
}
