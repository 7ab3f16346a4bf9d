//! One pass of a job through the packaging pipeline.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use intunepack_graph::BlobStorage;
use intunepack_packager::PackageAssembler;
use intunepack_protocol::{Job, StatusUpdate};
use intunepack_tools::{ToolProvisioner, ToolSources, download_file};
use intunepack_transfer::verify_file_checksum;
use intunepack_uploader::{RemoteApp, UploadOptions, Uploader};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::control::{
    GraphConnector, ProgressReporter, ReportingObserver, report_progress, report_status,
};
use crate::error::JobError;
use crate::workdir::WorkDir;

const INSTALLER_DIR: &str = "Installer";

/// Settings the orchestrator threads into every job.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Parent of the per-job working directories.
    pub work_dir: PathBuf,
    pub tools_dir: PathBuf,
    pub tool_sources: ToolSources,
    /// Optional wrapper for the content-prep executable (e.g. `wine`).
    pub content_prep_launcher: Option<PathBuf>,
    pub content_prep_timeout: Option<Duration>,
    pub upload: UploadOptions,
}

/// Sequences download, verification, packaging and upload for one job.
pub struct JobOrchestrator {
    config: OrchestratorConfig,
    http: reqwest::Client,
    connector: Arc<dyn GraphConnector>,
    blob: Arc<dyn BlobStorage>,
    reporter: Arc<dyn ProgressReporter>,
}

impl JobOrchestrator {
    pub fn new(
        config: OrchestratorConfig,
        http: reqwest::Client,
        connector: Arc<dyn GraphConnector>,
        blob: Arc<dyn BlobStorage>,
        reporter: Arc<dyn ProgressReporter>,
    ) -> Self {
        Self {
            config,
            http,
            connector,
            blob,
            reporter,
        }
    }

    /// Processes `job` and reports `uploading` then `deployed`.
    ///
    /// Errors are returned, not reported; marking the job failed is the
    /// caller's job. A `deployed` status the reporter rejects is an error. `cancel` is honored up to the start of the upload.
    /// The working directory is removed on every exit path.
    pub async fn process(
        &self,
        job: &Job,
        cancel: &CancellationToken,
    ) -> Result<RemoteApp, JobError> {
        check_cancelled(cancel)?;
        let work = WorkDir::create(&self.config.work_dir, &job.id)?;
        info!(job_id = %job.id, package_id = %job.package_id, version = %job.version, "processing job");

        // 1. Tools
        self.progress(job, 1, "Provisioning tools").await;
        let provisioner = ToolProvisioner::new(
            self.http.clone(),
            self.config.tools_dir.clone(),
            self.config.tool_sources.clone(),
        );
        let tools = provisioner.ensure_tools().await?;
        check_cancelled(cancel)?;

        // 2. Installer
        self.progress(job, 2, "Downloading installer").await;
        let installer = work
            .path()
            .join(INSTALLER_DIR)
            .join(job.installer_file_name());
        let bytes = download_file(&self.http, &job.installer_url, &installer).await?;
        info!(job_id = %job.id, bytes, "installer downloaded");
        check_cancelled(cancel)?;

        // 3. Checksum
        self.progress(job, 3, "Verifying installer").await;
        {
            let path = installer.clone();
            let expected = job.expected_sha256().map(str::to_string);
            tokio::task::spawn_blocking(move || verify_file_checksum(&path, expected.as_deref()))
                .await
                .map_err(|e| JobError::Join(e.to_string()))??;
        }
        check_cancelled(cancel)?;

        // 4. Package
        self.progress(job, 4, "Building package").await;
        let mut assembler = PackageAssembler::new(tools);
        if let Some(launcher) = &self.config.content_prep_launcher {
            assembler = assembler.with_launcher(launcher.clone());
        }
        if let Some(timeout) = self.config.content_prep_timeout {
            assembler = assembler.with_timeout(timeout);
        }
        let package = assembler.assemble(job, &installer, work.path()).await?;
        check_cancelled(cancel)?;

        // 5. Upload; not interruptible from here on.
        report_status(self.reporter.as_ref(), &job.id, &StatusUpdate::uploading()).await;
        let graph = self.connector.connect(&job.tenant_id).await?;
        let observer = ReportingObserver {
            reporter: self.reporter.as_ref(),
            job_id: &job.id,
        };
        let app = Uploader::new(graph.as_ref(), self.blob.as_ref())
            .with_options(self.config.upload)
            .upload(job, &package, &observer)
            .await?;

        self.reporter
            .report_status(&job.id, &StatusUpdate::deployed(&app.id, &app.url))
            .await
            .map_err(JobError::Report)?;
        info!(job_id = %job.id, app_id = %app.id, url = %app.url, "job deployed");

        drop(work);
        Ok(app)
    }

    async fn progress(&self, job: &Job, percent: u8, message: &str) {
        report_progress(self.reporter.as_ref(), &job.id, percent, message).await;
    }
}

fn check_cancelled(cancel: &CancellationToken) -> Result<(), JobError> {
    if cancel.is_cancelled() {
        warn!("job abandoned at checkpoint");
        Err(JobError::Cancelled)
    } else {
        Ok(())
    }
}
