//! Seams to the control plane and to Graph authentication.

use std::sync::Arc;

use intunepack_graph::{ApiError, BoxFuture, GraphApi, GraphClient};
use intunepack_protocol::{GraphToken, ProgressUpdate, StatusUpdate};
use serde_json::Value;
use intunepack_uploader::{UploadObserver, UploadStage};
use tracing::{debug, warn};

/// Receives job status and progress.
pub trait ProgressReporter: Send + Sync {
    fn report_status<'a>(
        &'a self,
        job_id: &'a str,
        update: &'a StatusUpdate,
    ) -> BoxFuture<'a, Result<(), ApiError>>;

    fn report_progress<'a>(
        &'a self,
        job_id: &'a str,
        update: &'a ProgressUpdate,
    ) -> BoxFuture<'a, Result<(), ApiError>>;
}

/// The job queue the agent polls.
pub trait ControlPlane: ProgressReporter {
    /// Next queued job for `agent_id`, if any, as the undecoded JSON object.
    ///
    /// Decoding into [`Job`](intunepack_protocol::Job) is left to the
    /// caller, which fails undecodable jobs by id.
    fn next_job<'a>(&'a self, agent_id: &'a str)
    -> BoxFuture<'a, Result<Option<Value>, ApiError>>;

    /// Graph access token for a tenant.
    fn graph_token<'a>(&'a self, tenant_id: &'a str) -> BoxFuture<'a, Result<GraphToken, ApiError>>;
}

/// Hands out an authenticated Graph client per tenant.
pub trait GraphConnector: Send + Sync {
    fn connect<'a>(&'a self, tenant_id: &'a str)
    -> BoxFuture<'a, Result<Box<dyn GraphApi>, ApiError>>;
}

/// [`GraphConnector`] fetching tokens from the control plane.
pub struct ControlPlaneConnector {
    control_plane: Arc<dyn ControlPlane>,
    graph_base_url: Option<String>,
}

impl ControlPlaneConnector {
    pub fn new(control_plane: Arc<dyn ControlPlane>) -> Self {
        Self {
            control_plane,
            graph_base_url: None,
        }
    }

    pub fn with_graph_base_url(mut self, url: impl Into<String>) -> Self {
        self.graph_base_url = Some(url.into());
        self
    }
}

impl GraphConnector for ControlPlaneConnector {
    fn connect<'a>(
        &'a self,
        tenant_id: &'a str,
    ) -> BoxFuture<'a, Result<Box<dyn GraphApi>, ApiError>> {
        Box::pin(async move {
            let token = self.control_plane.graph_token(tenant_id).await?;
            debug!(tenant_id, expires_on = ?token.expires_on, "graph token acquired");
            let mut client = GraphClient::new(&token.access_token)?;
            if let Some(url) = &self.graph_base_url {
                client = client.with_base_url(url.clone());
            }
            Ok(Box::new(client) as Box<dyn GraphApi>)
        })
    }
}

/// Forwards upload progress to a [`ProgressReporter`].
///
/// Reporting failures are logged; they never fail the upload.
pub(crate) struct ReportingObserver<'a> {
    pub reporter: &'a dyn ProgressReporter,
    pub job_id: &'a str,
}

impl UploadObserver for ReportingObserver<'_> {
    fn on_stage(&self, stage: UploadStage) -> BoxFuture<'_, ()> {
        Box::pin(async move {
            debug!(job_id = self.job_id, %stage, "upload stage");
        })
    }

    fn on_progress<'a>(&'a self, percent: u8, message: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async move {
            report_progress(self.reporter, self.job_id, percent, message).await;
        })
    }
}

pub(crate) async fn report_progress(
    reporter: &dyn ProgressReporter,
    job_id: &str,
    percent: u8,
    message: &str,
) {
    let update = ProgressUpdate {
        percent,
        message: message.to_string(),
    };
    if let Err(e) = reporter.report_progress(job_id, &update).await {
        warn!(job_id, percent, error = %e, "failed to report progress");
    }
}

pub(crate) async fn report_status(reporter: &dyn ProgressReporter, job_id: &str, update: &StatusUpdate) {
    if let Err(e) = reporter.report_status(job_id, update).await {
        warn!(job_id, status = ?update.status, error = %e, "failed to report status");
    }
}
