//! OAuth2 authorization code exchange with PKCE
//!
//! One authorization attempt spans two calls:
//! 1. [`PkceExchange::begin_authorization`] stores a fresh verifier and state
//!    and returns the URL to send the user to.
//! 2. [`PkceExchange::complete_authorization`] validates the redirect's
//!    parameters and trades the code for an access token.
//!
//! The verifier and state live in a transient store and are erased once the
//! attempt ends, whether it succeeded or not.

use std::sync::Arc;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use url::Url;

use super::credentials::AccessToken;
use super::pkce::{generate_state, PkcePair};
use crate::Result;
use crate::config::Config;
use crate::error::Error;
use crate::storage::KeyValueStore;

/// Transient storage key for the PKCE code verifier
pub const VERIFIER_KEY: &str = "oauth_code_verifier";

/// Transient storage key for the anti-forgery state
pub const STATE_KEY: &str = "oauth_state";

/// Query parameters delivered to the redirect URI
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
}

impl CallbackParams {
    /// Collect the callback parameters from a URL's query string
    pub fn from_url(url: &Url) -> Self {
        let mut params = Self::default();
        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "code" => params.code = Some(value.into_owned()),
                "state" => params.state = Some(value.into_owned()),
                "error" => params.error = Some(value.into_owned()),
                "error_description" => params.error_description = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    /// Parse a redirected URL as pasted by the user.
    ///
    /// Accepts an absolute URL, a path with a query (`/callback?code=..`), or
    /// a bare query string (`?code=..` / `code=..`).
    pub fn parse(input: &str) -> Result<Self> {
        let input = input.trim();
        let url = match Url::parse(input) {
            Ok(url) => url,
            Err(_) => {
                let relative = if input.starts_with('/') || input.starts_with('?') {
                    input.to_string()
                } else {
                    format!("?{}", input)
                };
                Url::parse(&format!("http://localhost{}", relative))
                    .map_err(|e| Error::OAuth(format!("Failed to parse callback URL: {}", e)))?
            }
        };
        Ok(Self::from_url(&url))
    }

    /// Whether these parameters look like an authorization redirect at all
    pub fn is_callback(&self) -> bool {
        self.code.is_some() || self.error.is_some()
    }
}

/// Token exchange request body
#[derive(Debug, Serialize)]
struct TokenExchangeRequest<'a> {
    grant_type: &'a str,
    client_id: &'a str,
    redirect_uri: &'a str,
    code: &'a str,
    code_verifier: &'a str,
}

/// PKCE authorization-code flow against a single authorization server
#[derive(Clone)]
pub struct PkceExchange {
    client_id: String,
    redirect_uri: String,
    scope: String,
    auth_url: String,
    token_url: String,
    transient: Arc<dyn KeyValueStore>,
    http_client: Client,
}

impl PkceExchange {
    pub fn new(config: &Config, transient: Arc<dyn KeyValueStore>) -> Self {
        Self {
            client_id: config.client_id.clone(),
            redirect_uri: config.redirect_uri.clone(),
            scope: config.scope_param(),
            auth_url: config.auth_url.clone(),
            token_url: config.token_url.clone(),
            transient,
            http_client: Client::new(),
        }
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// Start an authorization attempt.
    ///
    /// Persists a new verifier and state, replacing any from an earlier
    /// attempt, and returns the authorization URL.
    pub fn begin_authorization(&self) -> Result<Url> {
        let pkce = PkcePair::new();
        let state = generate_state();

        self.transient.set(VERIFIER_KEY, &pkce.verifier)?;
        self.transient.set(STATE_KEY, &state)?;

        let url = self.build_auth_url(&pkce.challenge, &state)?;
        tracing::debug!("Authorization URL built for client {}", self.client_id);
        Ok(url)
    }

    fn build_auth_url(&self, code_challenge: &str, state: &str) -> Result<Url> {
        let mut url = Url::parse(&self.auth_url)
            .map_err(|e| Error::OAuth(format!("Invalid auth URL: {}", e)))?;

        url.query_pairs_mut()
            .append_pair("response_type", "code")
            .append_pair("client_id", &self.client_id)
            .append_pair("redirect_uri", &self.redirect_uri)
            .append_pair("scope", &self.scope)
            .append_pair("state", state)
            .append_pair("code_challenge", code_challenge)
            .append_pair("code_challenge_method", "S256");

        Ok(url)
    }

    /// Finish the attempt started by [`begin_authorization`](Self::begin_authorization).
    ///
    /// The state check runs before anything touches the network. Stored
    /// secrets are gone when this returns, on every path.
    pub async fn complete_authorization(&self, params: &CallbackParams) -> Result<AccessToken> {
        let result = self.redeem(params).await;
        self.discard_secrets();
        result
    }

    async fn redeem(&self, params: &CallbackParams) -> Result<AccessToken> {
        let stored_state = self.transient.get(STATE_KEY)?;
        match (stored_state.as_deref(), params.state.as_deref()) {
            (Some(expected), Some(returned)) if expected == returned => {}
            _ => {
                tracing::warn!("OAuth state mismatch, rejecting callback");
                return Err(Error::StateMismatch);
            }
        }
        self.transient.remove(STATE_KEY)?;

        let code = match params.code.as_deref() {
            Some(code) => code,
            None => {
                let description = params
                    .error_description
                    .clone()
                    .or_else(|| params.error.clone())
                    .unwrap_or_else(|| "No authorization code found in URL.".to_string());
                return Err(Error::AuthorizationDenied(description));
            }
        };

        let verifier = self
            .transient
            .get(VERIFIER_KEY)?
            .ok_or(Error::MissingVerifier)?;

        let token = self.exchange_code(code, &verifier).await?;
        self.transient.remove(VERIFIER_KEY)?;
        Ok(token)
    }

    /// Exchange authorization code for an access token
    async fn exchange_code(&self, code: &str, code_verifier: &str) -> Result<AccessToken> {
        let request = TokenExchangeRequest {
            grant_type: "authorization_code",
            client_id: &self.client_id,
            redirect_uri: &self.redirect_uri,
            code,
            code_verifier,
        };

        tracing::info!("Exchanging authorization code for access token");
        let response = self.http_client
            .post(&self.token_url)
            .form(&request)
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = provider_message(&body)
                .unwrap_or_else(|| status.canonical_reason().unwrap_or("Unknown").to_string());
            tracing::warn!("Token exchange failed with {}: {}", status, message);
            return Err(Error::TokenExchangeFailed {
                status: status.as_u16(),
                message,
            });
        }

        let data: Value = serde_json::from_str(&body).map_err(|_| Error::MalformedTokenResponse)?;
        data.get("access_token")
            .and_then(Value::as_str)
            .filter(|token| !token.is_empty())
            .map(AccessToken::new)
            .ok_or(Error::MalformedTokenResponse)
    }

    fn discard_secrets(&self) {
        for key in [STATE_KEY, VERIFIER_KEY] {
            if let Err(e) = self.transient.remove(key) {
                tracing::warn!("Failed to clear {} from transient storage: {}", key, e);
            }
        }
    }
}

/// Pull `error` / `error_description` out of an OAuth error body
fn provider_message(body: &str) -> Option<String> {
    let data: Value = serde_json::from_str(body).ok()?;
    let error = data.get("error").and_then(Value::as_str);
    let description = data.get("error_description").and_then(Value::as_str);
    match (error, description) {
        (Some(error), Some(description)) => Some(format!("{}: {}", error, description)),
        (Some(error), None) => Some(error.to_string()),
        (None, Some(description)) => Some(description.to_string()),
        (None, None) => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::pkce::generate_code_challenge;
    use crate::storage::MemoryStore;
    use std::collections::HashMap;
    use wiremock::matchers::{any, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn test_config(token_url: &str) -> Config {
        Config {
            client_id: "client-123".to_string(),
            redirect_uri: "https://shop.example.com/".to_string(),
            token_url: token_url.to_string(),
            ..Config::default()
        }
    }

    fn exchange_with(config: &Config) -> (PkceExchange, MemoryStore) {
        let transient = MemoryStore::new();
        let exchange = PkceExchange::new(config, Arc::new(transient.clone()));
        (exchange, transient)
    }

    fn callback(code: Option<&str>, state: Option<&str>) -> CallbackParams {
        CallbackParams {
            code: code.map(String::from),
            state: state.map(String::from),
            ..CallbackParams::default()
        }
    }

    async fn server_expecting_no_calls() -> MockServer {
        let server = MockServer::start().await;
        Mock::given(any())
            .respond_with(ResponseTemplate::new(200))
            .expect(0)
            .mount(&server)
            .await;
        server
    }

    #[test]
    fn test_begin_authorization_builds_url() {
        let config = test_config("https://example.com/token");
        let (exchange, transient) = exchange_with(&config);

        let url = exchange.begin_authorization().unwrap();
        let query: HashMap<String, String> = url.query_pairs().into_owned().collect();

        let verifier = transient.get(VERIFIER_KEY).unwrap().unwrap();
        let state = transient.get(STATE_KEY).unwrap().unwrap();

        assert!(url.as_str().starts_with("https://www.etsy.com/oauth/connect?"));
        assert_eq!(query["response_type"], "code");
        assert_eq!(query["client_id"], "client-123");
        assert_eq!(query["redirect_uri"], "https://shop.example.com/");
        assert_eq!(query["scope"], "listings_w listings_r shops_r email_r");
        assert_eq!(query["state"], state);
        assert_eq!(query["code_challenge"], generate_code_challenge(&verifier));
        assert_eq!(query["code_challenge_method"], "S256");
        assert_eq!(verifier.len(), 43);
    }

    #[test]
    fn test_begin_authorization_replaces_previous_attempt() {
        let config = test_config("https://example.com/token");
        let (exchange, transient) = exchange_with(&config);

        exchange.begin_authorization().unwrap();
        let first = transient.get(STATE_KEY).unwrap();
        exchange.begin_authorization().unwrap();
        assert_ne!(transient.get(STATE_KEY).unwrap(), first);
    }

    #[tokio::test]
    async fn test_state_mismatch_rejected_without_network() {
        let server = server_expecting_no_calls().await;
        let config = test_config(&format!("{}/token", server.uri()));

        let cases = [
            (Some("expected"), Some("other")),
            (Some("expected"), None),
            (None, Some("expected")),
            (None, None),
            (Some("abc"), Some("ABC")),
        ];

        for (stored, returned) in cases {
            let (exchange, transient) = exchange_with(&config);
            if let Some(stored) = stored {
                transient.set(STATE_KEY, stored).unwrap();
            }
            transient.set(VERIFIER_KEY, "verifier").unwrap();

            let result = exchange
                .complete_authorization(&callback(Some("code"), returned))
                .await;

            assert!(matches!(result, Err(Error::StateMismatch)), "{:?} vs {:?}", stored, returned);
            assert_eq!(transient.get(STATE_KEY).unwrap(), None);
            assert_eq!(transient.get(VERIFIER_KEY).unwrap(), None);
        }
    }

    #[tokio::test]
    async fn test_exchange_request_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "access_token": "tok-1",
                "token_type": "Bearer",
                "expires_in": 3600,
                "refresh_token": "ignored"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let config = test_config(&format!("{}/token", server.uri()));
        let (exchange, transient) = exchange_with(&config);
        transient.set(STATE_KEY, "s1").unwrap();
        transient.set(VERIFIER_KEY, "abc").unwrap();

        let token = exchange
            .complete_authorization(&callback(Some("xyz"), Some("s1")))
            .await
            .unwrap();
        assert_eq!(token.secret(), "tok-1");

        let requests = server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 1);
        let content_type = requests[0].headers.get("content-type").unwrap().to_str().unwrap();
        assert_eq!(content_type, "application/x-www-form-urlencoded");

        let body: HashMap<String, String> = url::form_urlencoded::parse(&requests[0].body)
            .into_owned()
            .collect();
        let expected: HashMap<String, String> = [
            ("grant_type", "authorization_code"),
            ("client_id", "client-123"),
            ("redirect_uri", "https://shop.example.com/"),
            ("code", "xyz"),
            ("code_verifier", "abc"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();
        assert_eq!(body, expected);

        assert_eq!(transient.get(STATE_KEY).unwrap(), None);
        assert_eq!(transient.get(VERIFIER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_authorization_denied() {
        let server = server_expecting_no_calls().await;
        let config = test_config(&format!("{}/token", server.uri()));
        let (exchange, transient) = exchange_with(&config);
        transient.set(STATE_KEY, "s1").unwrap();
        transient.set(VERIFIER_KEY, "abc").unwrap();

        let params = CallbackParams {
            state: Some("s1".to_string()),
            error: Some("access_denied".to_string()),
            error_description: Some("The user denied the request".to_string()),
            ..CallbackParams::default()
        };

        match exchange.complete_authorization(&params).await {
            Err(Error::AuthorizationDenied(msg)) => assert_eq!(msg, "The user denied the request"),
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(transient.get(VERIFIER_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_missing_verifier() {
        let server = server_expecting_no_calls().await;
        let config = test_config(&format!("{}/token", server.uri()));
        let (exchange, transient) = exchange_with(&config);
        transient.set(STATE_KEY, "s1").unwrap();

        let result = exchange
            .complete_authorization(&callback(Some("xyz"), Some("s1")))
            .await;
        assert!(matches!(result, Err(Error::MissingVerifier)));
    }

    #[tokio::test]
    async fn test_token_exchange_failure_uses_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/token"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "error": "invalid_grant",
                "error_description": "code has expired"
            })))
            .mount(&server)
            .await;

        let config = test_config(&format!("{}/token", server.uri()));
        let (exchange, transient) = exchange_with(&config);
        transient.set(STATE_KEY, "s1").unwrap();
        transient.set(VERIFIER_KEY, "abc").unwrap();

        match exchange.complete_authorization(&callback(Some("xyz"), Some("s1"))).await {
            Err(Error::TokenExchangeFailed { status, message }) => {
                assert_eq!(status, 400);
                assert_eq!(message, "invalid_grant: code has expired");
            }
            other => panic!("unexpected result: {:?}", other),
        }
        assert_eq!(transient.get(VERIFIER_KEY).unwrap(), None);
        assert_eq!(transient.get(STATE_KEY).unwrap(), None);
    }

    #[tokio::test]
    async fn test_token_exchange_failure_falls_back_to_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("<html>bad gateway</html>"))
            .mount(&server)
            .await;

        let config = test_config(&format!("{}/token", server.uri()));
        let (exchange, transient) = exchange_with(&config);
        transient.set(STATE_KEY, "s1").unwrap();
        transient.set(VERIFIER_KEY, "abc").unwrap();

        match exchange.complete_authorization(&callback(Some("xyz"), Some("s1"))).await {
            Err(Error::TokenExchangeFailed { status, message }) => {
                assert_eq!(status, 502);
                assert_eq!(message, "Bad Gateway");
            }
            other => panic!("unexpected result: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_token_response_without_access_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "token_type": "Bearer"
            })))
            .mount(&server)
            .await;

        let config = test_config(&format!("{}/token", server.uri()));
        let (exchange, transient) = exchange_with(&config);
        transient.set(STATE_KEY, "s1").unwrap();
        transient.set(VERIFIER_KEY, "abc").unwrap();

        let result = exchange
            .complete_authorization(&callback(Some("xyz"), Some("s1")))
            .await;
        assert!(matches!(result, Err(Error::MalformedTokenResponse)));
        assert_eq!(transient.get(VERIFIER_KEY).unwrap(), None);
    }

    #[test]
    fn test_parse_callback_forms() {
        let full = CallbackParams::parse("https://shop.example.com/?code=abc&state=s1").unwrap();
        assert_eq!(full.code.as_deref(), Some("abc"));
        assert_eq!(full.state.as_deref(), Some("s1"));

        let path_only = CallbackParams::parse("/callback?code=abc&state=s1").unwrap();
        assert_eq!(path_only, full);

        let bare = CallbackParams::parse("code=abc&state=s1").unwrap();
        assert_eq!(bare, full);
    }

    #[test]
    fn test_parse_callback_error() {
        let params = CallbackParams::parse(
            "?error=access_denied&error_description=User+denied&state=s1",
        )
        .unwrap();
        assert!(params.is_callback());
        assert_eq!(params.error.as_deref(), Some("access_denied"));
        assert_eq!(params.error_description.as_deref(), Some("User denied"));
        assert!(params.code.is_none());
    }

    #[test]
    fn test_not_a_callback() {
        let params = CallbackParams::parse("https://shop.example.com/").unwrap();
        assert!(!params.is_callback());
    }
}
