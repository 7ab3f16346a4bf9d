//! Wires the agent components together for each CLI command.

use std::path::Path;
use std::sync::Arc;

use intunepack_graph::HttpBlobStorage;
use intunepack_orchestrator::{ControlPlane, ControlPlaneConnector, JobOrchestrator, ProgressReporter};
use intunepack_tools::{ToolPaths, ToolProvisioner};
use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::control_plane::HttpControlPlane;
use crate::poller::Poller;

/// Polls for and processes jobs until Ctrl-C.
pub async fn run(config: Config) -> anyhow::Result<()> {
    let http = http_client()?;

    let control_plane = Arc::new(HttpControlPlane::new(
        &config.control_plane_url,
        &config.api_key,
    )?);
    let as_control_plane: Arc<dyn ControlPlane> = control_plane.clone();
    let as_reporter: Arc<dyn ProgressReporter> = control_plane;

    let connector = ControlPlaneConnector::new(as_control_plane.clone())
        .with_graph_base_url(config.graph_base_url.clone());
    let orchestrator = JobOrchestrator::new(
        config.orchestrator_config(),
        http.clone(),
        Arc::new(connector),
        Arc::new(HttpBlobStorage::new(http)),
        as_reporter,
    );
    let poller = Poller::new(
        config.agent_id.clone(),
        config.poll_interval(),
        as_control_plane,
        orchestrator,
    );

    let cancel = CancellationToken::new();
    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::info!("SIGINT received, shutting down");
        }
        on_signal.cancel();
    });

    tracing::info!(agent_id = %config.agent_id, "agent ready");
    poller.run(cancel).await;
    Ok(())
}

/// Configuration and tool problems. Read-only.
pub fn check(config: &Config) -> Vec<String> {
    let mut issues = config.issues();

    let tools = ToolPaths::in_dir(&config.tools_dir);
    if !tools.content_prep_exe.is_file() {
        issues.push(format!(
            "content-prep tool missing at {} (run `setup`)",
            tools.content_prep_exe.display()
        ));
    }
    if !tools.toolkit_entry().is_file() {
        issues.push(format!(
            "toolkit template missing at {} (run `setup`)",
            tools.toolkit_dir.display()
        ));
    }

    issues
}

/// Provisions the tools, writing a default config first if there is none.
pub async fn setup(config_path: &Path) -> anyhow::Result<Vec<String>> {
    let config = if config_path.exists() {
        Config::load(config_path)?
    } else {
        let config = Config::default();
        config.save(config_path)?;
        println!(
            "wrote default configuration to {}; set control_plane_url and api_key before `run`",
            config_path.display()
        );
        config
    };

    let provisioner = ToolProvisioner::new(http_client()?, config.tools_dir.clone(), config.tool_sources());
    match provisioner.ensure_tools().await {
        Ok(paths) => {
            println!("content-prep tool: {}", paths.content_prep_exe.display());
            println!("toolkit template:  {}", paths.toolkit_dir.display());
            Ok(Vec::new())
        }
        Err(e) => {
            let status = provisioner.status();
            let mut failures = vec![e.to_string()];
            if !status.content_prep {
                failures.push(format!("content-prep tool not provisioned ({})", config.content_prep_url));
            }
            if !status.toolkit {
                failures.push(format!("toolkit template not provisioned ({})", config.toolkit_url));
            }
            Ok(failures)
        }
    }
}

fn http_client() -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .user_agent(concat!("intunepack-agent/", env!("CARGO_PKG_VERSION")))
        .build()
}
