//! Configuration management

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use url::Url;
use crate::Result;
use crate::error::Error;

/// Main configuration structure
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// App keystring (OAuth client id, also sent as the API key)
    #[serde(default)]
    pub client_id: String,

    /// Redirect URI registered with the marketplace app.
    /// Must match exactly, trailing slash included.
    #[serde(default = "default_redirect_uri")]
    pub redirect_uri: String,

    /// Permissions requested during authorization
    #[serde(default = "default_scopes")]
    pub scopes: Vec<String>,

    /// Base URL for all resource API calls
    #[serde(default = "default_api_base_url")]
    pub api_base_url: String,

    /// Authorization endpoint
    #[serde(default = "default_auth_url")]
    pub auth_url: String,

    /// Token exchange endpoint
    #[serde(default = "default_token_url")]
    pub token_url: String,

    /// Fixed values sent with every draft listing
    #[serde(default)]
    pub listing: ListingDefaults,
}

/// Placeholder values for a digital-download draft listing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListingDefaults {
    #[serde(default = "default_quantity")]
    pub quantity: u32,

    #[serde(default = "default_price")]
    pub price: f64,

    #[serde(default = "default_who_made")]
    pub who_made: String,

    #[serde(default = "default_when_made")]
    pub when_made: String,

    /// Taxonomy node for digital prints
    #[serde(default = "default_taxonomy_id")]
    pub taxonomy_id: u64,

    #[serde(default)]
    pub shop_section_id: Option<u64>,
}

fn default_redirect_uri() -> String {
    "http://localhost:8085/callback".to_string()
}

fn default_scopes() -> Vec<String> {
    ["listings_w", "listings_r", "shops_r", "email_r"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

fn default_api_base_url() -> String {
    "https://api.etsy.com/v3".to_string()
}

fn default_auth_url() -> String {
    "https://www.etsy.com/oauth/connect".to_string()
}

fn default_token_url() -> String {
    format!("{}/public/oauth/token", default_api_base_url())
}

fn default_quantity() -> u32 {
    999
}

fn default_price() -> f64 {
    3.00
}

fn default_who_made() -> String {
    "i_did".to_string()
}

fn default_when_made() -> String {
    "2020_2029".to_string()
}

fn default_taxonomy_id() -> u64 {
    2078
}

impl Default for ListingDefaults {
    fn default() -> Self {
        Self {
            quantity: default_quantity(),
            price: default_price(),
            who_made: default_who_made(),
            when_made: default_when_made(),
            taxonomy_id: default_taxonomy_id(),
            shop_section_id: None,
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            redirect_uri: default_redirect_uri(),
            scopes: default_scopes(),
            api_base_url: default_api_base_url(),
            auth_url: default_auth_url(),
            token_url: default_token_url(),
            listing: ListingDefaults::default(),
        }
    }
}

impl Config {
    /// Check the fields the auth flow cannot work without
    pub fn validate(&self) -> Result<()> {
        if self.client_id.trim().is_empty() {
            return Err(Error::Config(
                "client_id is not set. Run 'listing-builder init'.".to_string(),
            ));
        }
        for (name, value) in [
            ("redirect_uri", &self.redirect_uri),
            ("api_base_url", &self.api_base_url),
            ("auth_url", &self.auth_url),
            ("token_url", &self.token_url),
        ] {
            Url::parse(value)
                .map_err(|e| Error::Config(format!("Invalid {} '{}': {}", name, value, e)))?;
        }
        if self.scopes.is_empty() {
            return Err(Error::Config("At least one scope is required".to_string()));
        }
        Ok(())
    }

    /// Scopes in the space-joined form the authorization endpoint expects
    pub fn scope_param(&self) -> String {
        self.scopes.join(" ")
    }
}

/// Get the config directory path
pub fn config_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".listing-builder")
}

/// Get the config file path
pub fn config_path() -> PathBuf {
    config_dir().join("config.json")
}

/// Get the durable credentials file path
pub fn credentials_path() -> PathBuf {
    config_dir().join("credentials.json")
}

/// Load configuration from file
pub fn load() -> Result<Config> {
    let path = config_path();

    if !path.exists() {
        return Err(Error::Config(format!(
            "Config not found at {:?}. Run 'listing-builder init' first.",
            path
        )));
    }

    let content = std::fs::read_to_string(&path)?;
    let config: Config = serde_json::from_str(&content)?;
    config.validate()?;
    Ok(config)
}

/// Save configuration to file
pub fn save(config: &Config) -> Result<()> {
    let path = config_path();

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    let content = serde_json::to_string_pretty(config)?;
    std::fs::write(&path, content)?;
    Ok(())
}

/// Interactive setup: ask for the app keystring and callback URL
pub fn onboard() -> Result<Config> {
    use crate::ui;
    use inquire::Text;

    ui::print_header("Setup");
    println!("  Create an app in the marketplace developer console, then enter its details.\n");

    let mut config = Config::default();

    config.client_id = Text::new("App keystring (client id):")
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?
        .trim()
        .to_string();

    config.redirect_uri = Text::new("Callback URL registered for the app:")
        .with_default(&config.redirect_uri)
        .with_help_message("Must match exactly, including any trailing slash")
        .prompt()
        .map_err(|e| Error::Config(format!("Prompt failed: {}", e)))?
        .trim()
        .to_string();

    config.validate()?;

    ui::print_thinking("Saving configuration");
    save(&config)?;
    ui::print_success(&format!("Configuration written to {:?}", config_path()));

    Ok(config)
}
