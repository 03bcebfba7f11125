//! AuthProvider - login, callback handling and logout
//!
//! Ties the PKCE exchange to the credential store:
//! - Browser-based authorization (loopback capture or pasted redirect URL)
//! - Persisting the token after a successful exchange
//! - Dropping any stored token when an authorization attempt fails

use std::sync::Arc;

use super::callback_server::{loopback_target, wait_for_callback};
use super::credentials::{AccessToken, CredentialStore};
use super::exchange::{CallbackParams, PkceExchange};
use crate::Result;
use crate::config::{self, Config};
use crate::error::Error;
use crate::storage::MemoryStore;

/// OAuth2 authentication provider
#[derive(Clone)]
pub struct AuthProvider {
    exchange: PkceExchange,
    credentials: CredentialStore,
}

impl AuthProvider {
    pub fn new(exchange: PkceExchange, credentials: CredentialStore) -> Self {
        Self { exchange, credentials }
    }

    /// Provider backed by the credentials file in the config directory
    pub fn from_config(config: &Config) -> Self {
        let transient = Arc::new(MemoryStore::new());
        Self::new(
            PkceExchange::new(config, transient),
            CredentialStore::from_file(config::credentials_path()),
        )
    }

    pub fn credentials(&self) -> &CredentialStore {
        &self.credentials
    }

    /// Run the full authorization flow and store the resulting token
    pub async fn login(&self, open_browser: bool) -> Result<AccessToken> {
        let auth_url = self.exchange.begin_authorization()?;

        if open_browser {
            println!("\n🔐 Opening browser for authorization...\n");
            if let Err(e) = open::that(auth_url.as_str()) {
                tracing::warn!("Failed to open browser: {}", e);
            }
            println!("If the browser doesn't open, visit this URL:\n{}\n", auth_url);
        } else {
            println!("\n🔐 Visit this URL to authorize:\n{}\n", auth_url);
        }

        let params = if loopback_target(self.exchange.redirect_uri()).is_some() {
            println!("⏳ Waiting for authorization...");
            wait_for_callback(self.exchange.redirect_uri()).await?
        } else {
            prompt_for_redirect()?
        };

        println!("✓ Authorization received, exchanging code...\n");
        self.handle_callback(&params).await
    }

    /// Complete an authorization attempt from the redirect's parameters.
    ///
    /// A failed attempt also clears any previously stored token.
    pub async fn handle_callback(&self, params: &CallbackParams) -> Result<AccessToken> {
        match self.exchange.complete_authorization(params).await {
            Ok(token) => {
                self.credentials.save(&token)?;
                tracing::info!("Authorization complete, token stored");
                Ok(token)
            }
            Err(e) => {
                tracing::error!("Authorization failed: {}", e);
                self.credentials.clear();
                Err(e)
            }
        }
    }

    /// Forget the stored token. Safe to call repeatedly.
    pub fn logout(&self) {
        self.credentials.clear();
        tracing::info!("Logged out");
    }
}

/// Ask the user to paste the URL the browser landed on
fn prompt_for_redirect() -> Result<CallbackParams> {
    let input = inquire::Text::new("Paste the full URL you were redirected to:")
        .prompt()
        .map_err(|e| Error::OAuth(format!("Prompt failed: {}", e)))?;
    CallbackParams::parse(&input)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::exchange::{STATE_KEY, VERIFIER_KEY};
    use crate::storage::KeyValueStore;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn provider(token_url: &str) -> (AuthProvider, MemoryStore) {
        let config = Config {
            client_id: "client-123".to_string(),
            redirect_uri: "https://shop.example.com/".to_string(),
            token_url: token_url.to_string(),
            ..Config::default()
        };
        let transient = MemoryStore::new();
        let exchange = PkceExchange::new(&config, Arc::new(transient.clone()));
        let credentials = CredentialStore::new(Arc::new(MemoryStore::new()));
        (AuthProvider::new(exchange, credentials), transient)
    }

    #[tokio::test]
    async fn test_successful_callback_stores_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "fresh"
            })))
            .mount(&server)
            .await;

        let (auth, transient) = provider(&format!("{}/token", server.uri()));
        transient.set(STATE_KEY, "s1").unwrap();
        transient.set(VERIFIER_KEY, "v1").unwrap();

        let params = CallbackParams::parse("?code=c1&state=s1").unwrap();
        auth.handle_callback(&params).await.unwrap();

        assert_eq!(auth.credentials().load().unwrap().secret(), "fresh");
    }

    #[tokio::test]
    async fn test_failed_callback_clears_stored_token() {
        let (auth, transient) = provider("http://127.0.0.1:9/token");
        auth.credentials().save(&AccessToken::new("stale")).unwrap();
        transient.set(STATE_KEY, "s1").unwrap();

        let params = CallbackParams::parse("?code=c1&state=forged").unwrap();
        let result = auth.handle_callback(&params).await;

        assert!(matches!(result, Err(Error::StateMismatch)));
        assert!(auth.credentials().load().is_none());
    }

    #[test]
    fn test_logout_is_idempotent() {
        let (auth, _) = provider("http://127.0.0.1:9/token");
        auth.credentials().save(&AccessToken::new("tok")).unwrap();

        auth.logout();
        let after_once = auth.credentials().load();
        auth.logout();
        let after_twice = auth.credentials().load();

        assert!(after_once.is_none());
        assert_eq!(after_once, after_twice);
    }
}
