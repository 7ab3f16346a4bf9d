//! HTTP client for the packaging portal's agent API.
//!
//! Every request carries the agent's API key as a Bearer credential.

use intunepack_graph::{ApiError, BoxFuture};
use intunepack_orchestrator::{ControlPlane, ProgressReporter};
use intunepack_protocol::{GraphToken, ProgressUpdate, StatusUpdate};
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde::de::DeserializeOwned;
use tracing::debug;

/// `reqwest`-backed [`ControlPlane`].
pub struct HttpControlPlane {
    http: reqwest::Client,
    base_url: String,
}

impl HttpControlPlane {
    pub fn new(base_url: &str, api_key: &str) -> Result<Self, ApiError> {
        let mut headers = HeaderMap::new();
        let mut auth = HeaderValue::from_str(&format!("Bearer {}", api_key.trim()))
            .map_err(|_| ApiError::InvalidToken)?;
        auth.set_sensitive(true);
        headers.insert(AUTHORIZATION, auth);
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let http = reqwest::Client::builder()
            .default_headers(headers)
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/api/agent/{path}", self.base_url)
    }

    async fn check(resp: reqwest::Response) -> Result<reqwest::Response, ApiError> {
        let status = resp.status();
        if status.is_success() {
            Ok(resp)
        } else {
            let body = resp.text().await.unwrap_or_default();
            Err(ApiError::Status {
                status: status.as_u16(),
                body,
            })
        }
    }

    async fn get_json<T: DeserializeOwned>(req: reqwest::RequestBuilder) -> Result<T, ApiError> {
        let resp = Self::check(req.send().await?).await?;
        let bytes = resp.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn post_json<T: serde::Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<(), ApiError> {
        let resp = self.http.post(self.url(path)).json(body).send().await?;
        Self::check(resp).await?;
        Ok(())
    }
}

impl ProgressReporter for HttpControlPlane {
    fn report_status<'a>(
        &'a self,
        job_id: &'a str,
        update: &'a StatusUpdate,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            debug!(job_id, status = ?update.status, "reporting status");
            self.post_json(&format!("jobs/{job_id}/status"), update).await
        })
    }

    fn report_progress<'a>(
        &'a self,
        job_id: &'a str,
        update: &'a ProgressUpdate,
    ) -> BoxFuture<'a, Result<(), ApiError>> {
        Box::pin(async move {
            debug!(job_id, percent = update.percent, "reporting progress");
            self.post_json(&format!("jobs/{job_id}/progress"), update).await
        })
    }
}

impl ControlPlane for HttpControlPlane {
    fn next_job<'a>(
        &'a self,
        agent_id: &'a str,
    ) -> BoxFuture<'a, Result<Option<serde_json::Value>, ApiError>> {
        Box::pin(async move {
            let resp = self
                .http
                .get(self.url("jobs/next"))
                .query(&[("agentId", agent_id)])
                .send()
                .await?;
            if resp.status() == StatusCode::NO_CONTENT {
                return Ok(None);
            }
            let resp = Self::check(resp).await?;
            let bytes = resp.bytes().await?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                return Ok(None);
            }
            Ok(Some(serde_json::from_slice(&bytes)?))
        })
    }

    fn graph_token<'a>(&'a self, tenant_id: &'a str) -> BoxFuture<'a, Result<GraphToken, ApiError>> {
        Box::pin(async move {
            let req = self.http.get(self.url(&format!("tenants/{tenant_id}/graph-token")));
            Self::get_json(req).await
        })
    }
}
