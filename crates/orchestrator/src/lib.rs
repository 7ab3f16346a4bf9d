//! Drives a single packaging job from installer URL to deployed Intune app.
//!
//! [`JobOrchestrator::process`] provisions the tools, downloads and
//! verifies the installer, assembles the package and hands it to the
//! uploader, reporting progress through a [`ProgressReporter`] along the
//! way. Each job runs inside its own [`WorkDir`], removed on completion.

mod control;
mod error;
mod pipeline;
mod workdir;

pub use control::{ControlPlane, ControlPlaneConnector, GraphConnector, ProgressReporter};
pub use error::JobError;
pub use pipeline::{JobOrchestrator, OrchestratorConfig};
pub use workdir::WorkDir;
