// API client module: a small blocking HTTP client that talks to the
// TST-Online service. Intentionally synchronous; each invocation performs
// at most one request at a time.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;
use tracing::debug;

use crate::config::ConfigState;
use crate::error::TstError;

/// Status code plus raw body of a service response. Flows branch on the
/// code themselves; a 4xx/5xx here is data, not a transport failure.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn json(&self) -> Result<Value, TstError> {
        serde_json::from_str(&self.body)
            .map_err(|_| TstError::BadResponse("body is not valid JSON".into()))
    }

    /// First entry of the `messages` array, or the raw body when that shape
    /// is absent. Error payloads from the service use this convention.
    pub fn first_message(&self) -> String {
        serde_json::from_str::<Value>(&self.body)
            .ok()
            .as_ref()
            .and_then(|body| body.get("messages"))
            .and_then(|messages| messages.get(0))
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| self.body.trim().to_string())
    }
}

/// Authenticated request interface the flows depend on. [`ApiClient`] is the
/// production implementation; tests substitute recording stubs.
pub trait Transport {
    fn get(&self, url: &str) -> Result<HttpResponse, TstError>;
    fn patch(&self, url: &str, payload: &Value) -> Result<HttpResponse, TstError>;
}

/// Blocking client that attaches `Authorization: Bearer {token}` to every
/// request.
pub struct ApiClient {
    client: Client,
}

impl ApiClient {
    /// Client for the logged-in user of `config`.
    pub fn new(config: &ConfigState) -> Result<Self, TstError> {
        Self::with_token(&config.access_token)
    }

    /// Client with an explicit bearer token. Login validates a candidate
    /// token before it is ever persisted, so the token is not always the
    /// stored one.
    pub fn with_token(token: &str) -> Result<Self, TstError> {
        let mut headers = HeaderMap::new();
        let bearer = HeaderValue::from_str(&format!("Bearer {token}"))
            .map_err(|_| TstError::TokenRejected(token.to_string()))?;
        headers.insert(AUTHORIZATION, bearer);
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .default_headers(headers)
            .build()
            .map_err(TstError::NetworkUnavailable)?;
        Ok(ApiClient { client })
    }

    fn read(response: reqwest::blocking::Response) -> Result<HttpResponse, TstError> {
        let status = response.status().as_u16();
        let body = response.text().map_err(TstError::NetworkUnavailable)?;
        debug!(status, bytes = body.len(), "response");
        Ok(HttpResponse { status, body })
    }
}

impl Transport for ApiClient {
    fn get(&self, url: &str) -> Result<HttpResponse, TstError> {
        debug!(%url, "GET");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(TstError::NetworkUnavailable)?;
        Self::read(response)
    }

    fn patch(&self, url: &str, payload: &Value) -> Result<HttpResponse, TstError> {
        debug!(%url, "PATCH");
        let response = self
            .client
            .patch(url)
            .json(payload)
            .send()
            .map_err(TstError::NetworkUnavailable)?;
        Self::read(response)
    }
}
