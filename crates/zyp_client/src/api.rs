//! REST transport for the ZypHub API.
//!
//! The client core only depends on the `RestTransport` trait; `ApiClient`
//! is the reqwest-backed production implementation. Response bodies are
//! normalized to camelCase keys so every payload reaching the model layer
//! uses one casing convention, whichever service produced it.

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Non-2xx response; `body` is the normalized error payload.
    #[error("Request failed ({status}): {body}")]
    Status { status: u16, body: Value },

    #[error("Network error: {0}")]
    Network(String),
}

/// Verb-level API surface consumed by the client core.
#[async_trait]
pub trait RestTransport: Send + Sync {
    /// Install or clear the bearer token used on subsequent requests.
    fn set_token(&self, token: Option<String>);

    async fn get(&self, path: &str) -> Result<Value, ApiError>;
    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError>;
    async fn put(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError>;
    async fn patch(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError>;
    async fn delete(&self, path: &str) -> Result<Value, ApiError>;
}

pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
    bearer: Mutex<Option<String>>,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        let client = reqwest::Client::builder()
            .use_rustls_tls()
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
            bearer: Mutex::new(None),
        })
    }

    async fn request(
        &self,
        method: reqwest::Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ApiError> {
        let url = format!("{}/{}", self.base_url, path);
        let mut req = self.client.request(method, &url);
        if let Some(token) = self.bearer.lock().clone() {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &body {
            req = req.json(body);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| ApiError::Network(e.to_string()))?;
        let status = resp.status();
        let body: Value = resp.json().await.unwrap_or_default();
        let body = camelize_keys(body);
        if status.is_success() {
            Ok(body)
        } else {
            Err(ApiError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    pub async fn login(&self, user: Value) -> Result<Value, ApiError> {
        self.post("users/login", Some(user)).await
    }

    pub async fn login_by_key(&self, user: Value) -> Result<Value, ApiError> {
        self.post("users/login/apikey", Some(user)).await
    }

    pub async fn logout(&self) -> Result<Value, ApiError> {
        self.post("users/logout", None).await
    }

    pub async fn check_login_status(&self) -> Result<Value, ApiError> {
        self.get("auth/check").await
    }
}

#[async_trait]
impl RestTransport for ApiClient {
    fn set_token(&self, token: Option<String>) {
        *self.bearer.lock() = token;
    }

    async fn get(&self, path: &str) -> Result<Value, ApiError> {
        self.request(reqwest::Method::GET, path, None).await
    }

    async fn post(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.request(reqwest::Method::POST, path, body).await
    }

    async fn put(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.request(reqwest::Method::PUT, path, body).await
    }

    async fn patch(&self, path: &str, body: Option<Value>) -> Result<Value, ApiError> {
        self.request(reqwest::Method::PATCH, path, body).await
    }

    async fn delete(&self, path: &str) -> Result<Value, ApiError> {
        self.request(reqwest::Method::DELETE, path, None).await
    }
}

/// Recursively rewrite snake_case object keys to camelCase. Keys with a
/// leading underscore (the server's primary-key spelling) are left alone.
pub fn camelize_keys(value: Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.into_iter()
                .map(|(k, v)| (camelize(&k), camelize_keys(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.into_iter().map(camelize_keys).collect()),
        other => other,
    }
}

fn camelize(key: &str) -> String {
    if key.starts_with('_') || !key.contains('_') {
        return key.to_string();
    }
    let mut out = String::with_capacity(key.len());
    let mut upper_next = false;
    for c in key.chars() {
        if c == '_' {
            upper_next = true;
        } else if upper_next {
            out.extend(c.to_uppercase());
            upper_next = false;
        } else {
            out.push(c);
        }
    }
    out
}
