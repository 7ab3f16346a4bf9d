//! Job loop: fetch, process, report, repeat.

use std::sync::Arc;
use std::time::Duration;

use intunepack_graph::ApiError;
use intunepack_orchestrator::{ControlPlane, JobError, JobOrchestrator};
use intunepack_protocol::{Job, StatusUpdate};
use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// Pulls jobs one at a time and hands them to the orchestrator.
pub struct Poller {
    agent_id: String,
    interval: Duration,
    control_plane: Arc<dyn ControlPlane>,
    orchestrator: JobOrchestrator,
}

impl Poller {
    pub fn new(
        agent_id: String,
        interval: Duration,
        control_plane: Arc<dyn ControlPlane>,
        orchestrator: JobOrchestrator,
    ) -> Self {
        Self {
            agent_id,
            interval,
            control_plane,
            orchestrator,
        }
    }

    /// Runs until `cancel` fires.
    ///
    /// A job in flight when `cancel` fires is abandoned at its next
    /// checkpoint, or finishes if it is already uploading.
    pub async fn run(&self, cancel: CancellationToken) {
        info!(agent_id = %self.agent_id, interval = ?self.interval, "polling for jobs");

        while !cancel.is_cancelled() {
            match self.poll_once(&cancel).await {
                Ok(true) => continue,
                Ok(false) => {}
                Err(e) => warn!(error = %e, "failed to fetch next job"),
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        info!("poller stopped");
    }

    /// Fetches and processes at most one job. `Ok(false)` means the queue
    /// was empty.
    ///
    /// A job that does not decode is failed under its `id`; one without an
    /// `id` comes back as [`ApiError::Json`].
    pub async fn poll_once(&self, cancel: &CancellationToken) -> Result<bool, ApiError> {
        let Some(raw) = self.control_plane.next_job(&self.agent_id).await? else {
            return Ok(false);
        };
        let id = raw.get("id").and_then(Value::as_str).map(str::to_string);

        match (serde_json::from_value::<Job>(raw), id) {
            (Ok(job), _) => self.run_job(&job, cancel).await,
            (Err(e), Some(id)) => {
                warn!(job_id = %id, error = %e, "rejecting undecodable job");
                self.report(&id, StatusUpdate::failed(format!("undecodable job: {e}")))
                    .await;
            }
            (Err(e), None) => return Err(e.into()),
        }
        Ok(true)
    }

    async fn run_job(&self, job: &Job, cancel: &CancellationToken) {
        if let Err(e) = job.validate() {
            warn!(job_id = %job.id, error = %e, "rejecting invalid job");
            self.report(&job.id, StatusUpdate::failed(e.to_string())).await;
            return;
        }

        self.report(&job.id, StatusUpdate::packaging()).await;
        match self.orchestrator.process(job, cancel).await {
            Ok(app) => info!(job_id = %job.id, app_id = %app.id, "job complete"),
            Err(JobError::Cancelled) => {
                warn!(job_id = %job.id, "job abandoned on shutdown");
                self.report(&job.id, StatusUpdate::failed("agent shut down before upload"))
                    .await;
            }
            Err(e) => {
                error!(job_id = %job.id, error = %e, "job failed");
                self.report(&job.id, StatusUpdate::failed(e.to_string())).await;
            }
        }
    }

    async fn report(&self, job_id: &str, update: StatusUpdate) {
        if let Err(e) = self.control_plane.report_status(job_id, &update).await {
            warn!(job_id, status = ?update.status, error = %e, "failed to report status");
        }
    }
}
