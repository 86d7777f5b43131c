//! REST client shared by every service
//!
//! One `ApiClient` per service endpoint. Requests and responses are JSON;
//! non-2xx responses become `ApiError::Status` carrying the status code so
//! callers can tell not-found apart from real failures.

use std::fmt;
use std::sync::Arc;

use log::debug;
use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("decoding response: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("no credentials configured: {0}")]
    Unauthenticated(String),
}

impl ApiError {
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Status { status, .. } => Some(*status),
            _ => None,
        }
    }

    /// 404 and 410 both mean the remote object is gone
    pub fn is_not_found_or_gone(&self) -> bool {
        matches!(self.status(), Some(404 | 410))
    }

    /// Gateway failures worth polling through
    pub fn is_transient(&self) -> bool {
        matches!(self.status(), Some(502..=504))
    }
}

/// Adds credentials to outgoing requests
pub trait Authenticator: Send + Sync + fmt::Debug {
    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError>;
}

/// Static service account access token
pub struct TokenAuth {
    token: Option<String>,
}

impl TokenAuth {
    pub fn new(token: Option<String>) -> Self {
        Self { token }
    }
}

impl fmt::Debug for TokenAuth {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenAuth")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

impl Authenticator for TokenAuth {
    fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder, ApiError> {
        match &self.token {
            Some(token) => Ok(request.bearer_auth(token)),
            None => Err(ApiError::Unauthenticated(
                "set service_account_token or STACKIT_SERVICE_ACCOUNT_TOKEN".to_string(),
            )),
        }
    }
}

/// JSON client bound to one service endpoint
#[derive(Debug, Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    auth: Arc<dyn Authenticator>,
}

impl ApiClient {
    pub fn new(http: reqwest::Client, base_url: impl Into<String>, auth: Arc<dyn Authenticator>) -> Self {
        Self {
            http,
            base_url: base_url.into(),
            auth,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T, ApiError> {
        self.send::<(), T>(Method::GET, path, None).await
    }

    pub async fn post<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::POST, path, Some(body)).await
    }

    pub async fn patch<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::PATCH, path, Some(body)).await
    }

    pub async fn put<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<T, ApiError> {
        self.send(Method::PUT, path, Some(body)).await
    }

    /// DELETE, discarding any response body
    pub async fn delete(&self, path: &str) -> Result<(), ApiError> {
        self.send::<(), serde::de::IgnoredAny>(Method::DELETE, path, None)
            .await
            .map(|_| ())
    }

    async fn send<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: Option<&B>,
    ) -> Result<T, ApiError> {
        let url = format!("{}{}", self.base_url, path);
        debug!("{} {}", method, url);

        let mut request = self.http.request(method.clone(), &url);
        if let Some(body) = body {
            request = request.json(body);
        }
        let request = self.auth.authorize(request)?;

        let response = request.send().await?;
        let status = response.status();
        let bytes = response.bytes().await?;

        if !status.is_success() {
            debug!("{} {} returned {}", method, url, status.as_u16());
            return Err(ApiError::Status {
                status: status.as_u16(),
                message: error_message(&bytes),
            });
        }

        if bytes.iter().all(u8::is_ascii_whitespace) {
            Ok(serde_json::from_value(serde_json::Value::Null)?)
        } else {
            Ok(serde_json::from_slice(&bytes)?)
        }
    }
}

/// Extract a readable message from an error body
fn error_message(body: &[u8]) -> String {
    if let Ok(json) = serde_json::from_slice::<serde_json::Value>(body) {
        for key in ["message", "msg", "error"] {
            if let Some(msg) = json.get(key).and_then(|v| v.as_str()) {
                return msg.to_string();
            }
        }
    }
    String::from_utf8_lossy(body).trim().to_string()
}

/// Describe a failed data source lookup by status code
///
/// 404 maps to `not_found`; other statuses listed in `by_status` use their
/// own message; anything else keeps the underlying error.
pub fn describe_lookup_error(err: &ApiError, not_found: &str, by_status: &[(u16, String)]) -> String {
    match err.status() {
        Some(404) => not_found.to_string(),
        Some(status) => by_status
            .iter()
            .find(|(s, _)| *s == status)
            .map(|(_, msg)| msg.clone())
            .unwrap_or_else(|| format!("Calling API: {}", err)),
        None => format!("Calling API: {}", err),
    }
}
