//! Microsoft Graph client.
//!
//! Async HTTP client using `reqwest` with Bearer token authentication.
//! Bodies are passed through as `serde_json::Value`; shaping them is the
//! caller's concern.

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;
use tracing::debug;

use crate::BoxFuture;
use crate::error::ApiError;

/// Graph endpoint root, including the API version.
pub const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/beta";

/// Authenticated access to Graph, abstracted for testing.
///
/// Paths are relative to the API root (`deviceAppManagement/mobileApps`).
/// Empty response bodies come back as `Value::Null`.
pub trait GraphApi: Send + Sync {
    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Value, ApiError>>;

    fn post<'a>(&'a self, path: &'a str, body: &'a Value)
    -> BoxFuture<'a, Result<Value, ApiError>>;

    fn patch<'a>(
        &'a self,
        path: &'a str,
        body: &'a Value,
    ) -> BoxFuture<'a, Result<Value, ApiError>>;

    /// API root, used to build `@odata.id` references.
    fn base_url(&self) -> &str {
        DEFAULT_BASE_URL
    }
}

/// `reqwest`-backed [`GraphApi`].
pub struct GraphClient {
    http: reqwest::Client,
    base_url: String,
}

impl GraphClient {
    /// Creates a client sending `access_token` as a Bearer credential.
    pub fn new(access_token: &str) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {access_token}"))
            .map_err(|_| ApiError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Points the client at a different API root (sovereign clouds, tests).
    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = url.into().trim_end_matches('/').to_string();
        self
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("https://") || path.starts_with("http://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<Value, ApiError> {
        let resp = req.send().await?;
        let status = resp.status();

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ApiError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let bytes = resp.bytes().await?;
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }
        Ok(serde_json::from_slice(&bytes)?)
    }
}

impl GraphApi for GraphClient {
    fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get<'a>(&'a self, path: &'a str) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async move {
            debug!(path, "graph GET");
            self.send(self.http.get(self.url(path))).await
        })
    }

    fn post<'a>(
        &'a self,
        path: &'a str,
        body: &'a Value,
    ) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async move {
            debug!(path, "graph POST");
            self.send(self.http.post(self.url(path)).json(body)).await
        })
    }

    fn patch<'a>(
        &'a self,
        path: &'a str,
        body: &'a Value,
    ) -> BoxFuture<'a, Result<Value, ApiError>> {
        Box::pin(async move {
            debug!(path, "graph PATCH");
            self.send(self.http.patch(self.url(path)).json(body)).await
        })
    }
}
