//! Authentication module for OAuth2 and credential management
//!
//! This module provides:
//! - PKCE code generation for OAuth2 flows
//! - The authorization-code exchange with state validation
//! - Single-token credential storage
//! - OAuth2 callback server
//! - AuthProvider tying the pieces together for login and logout

mod pkce;
mod credentials;
mod exchange;
mod callback_server;
mod provider;

pub use pkce::{generate_code_challenge, generate_code_verifier, generate_state, PkcePair};
pub use credentials::{AccessToken, CredentialStore, ACCESS_TOKEN_KEY};
pub use exchange::{CallbackParams, PkceExchange, STATE_KEY, VERIFIER_KEY};
pub use callback_server::{loopback_target, wait_for_callback};
pub use provider::AuthProvider;
