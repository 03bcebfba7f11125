//! Authenticated HTTP client for the marketplace API

use reqwest::header::CONTENT_TYPE;
use reqwest::multipart::Form;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::Result;
use crate::auth::AccessToken;
use crate::config::{Config, ListingDefaults};
use crate::error::Error;

/// Request payload
#[derive(Debug)]
pub enum RequestBody {
    Empty,
    Json(Value),
    /// Content type and boundary are set by reqwest
    Multipart(Form),
}

/// Bearer-authenticated client for one API host
#[derive(Clone)]
pub struct ApiClient {
    http_client: Client,
    base_url: String,
    api_key: String,
    pub(crate) listing_defaults: ListingDefaults,
}

impl ApiClient {
    pub fn new(config: &Config) -> Self {
        Self {
            http_client: Client::new(),
            base_url: config.api_base_url.trim_end_matches('/').to_string(),
            api_key: config.client_id.clone(),
            listing_defaults: config.listing.clone(),
        }
    }

    /// Send one request.
    ///
    /// Returns `Ok(None)` for `204 No Content`; any other success body must
    /// be JSON that deserializes into `T`.
    pub async fn call<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        method: Method,
        body: RequestBody,
        token: &AccessToken,
    ) -> Result<Option<T>> {
        let url = format!("{}{}", self.base_url, endpoint);
        tracing::debug!("{} {}", method, url);

        let request = self.http_client
            .request(method.clone(), &url)
            .bearer_auth(token.secret())
            .header("x-api-key", &self.api_key);

        let request = match body {
            RequestBody::Empty => request.header(CONTENT_TYPE, "application/json"),
            RequestBody::Json(value) => request.json(&value),
            RequestBody::Multipart(form) => request.multipart(form),
        };

        let response = request.send().await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let message = error_message(status, &body);
            tracing::debug!("{} {} failed with {}: {}", method, endpoint, status, message);
            return Err(Error::Api {
                status: status.as_u16(),
                message,
            });
        }

        if status == StatusCode::NO_CONTENT {
            return Ok(None);
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| Error::MalformedResponse(format!("{} {}: {}", method, endpoint, e)))
    }
}

/// Message for a failed call: the JSON `error` field, else the raw body,
/// else the status reason
fn error_message(status: StatusCode, body: &str) -> String {
    if let Ok(data) = serde_json::from_str::<Value>(body) {
        match data.get("error") {
            Some(Value::String(error)) => return error.clone(),
            Some(other) if !other.is_null() => return other.to_string(),
            _ => {}
        }
    }

    let body = body.trim();
    if !body.is_empty() {
        return body.to_string();
    }

    status.canonical_reason().unwrap_or("Unknown").to_string()
}
