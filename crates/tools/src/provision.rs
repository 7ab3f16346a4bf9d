//! Idempotent provisioning of the content-prep tool and toolkit template.

use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::archive::extract_zip;
use crate::download::download_file;
use crate::error::ToolProvisioningError;

/// File name of the content-prep executable.
pub const CONTENT_PREP_EXE: &str = "IntuneWinAppUtil.exe";

/// Directory (under the tools dir) holding the toolkit template tree.
pub const TOOLKIT_DIR: &str = "PSAppDeployToolkit";

/// Entry executable at the root of the toolkit template.
pub const TOOLKIT_ENTRY_EXE: &str = "Invoke-AppDeployToolkit.exe";

const DEFAULT_CONTENT_PREP_URL: &str = "https://raw.githubusercontent.com/microsoft/Microsoft-Win32-Content-Prep-Tool/master/IntuneWinAppUtil.exe";
const DEFAULT_TOOLKIT_URL: &str = "https://github.com/PSAppDeployToolkit/PSAppDeployToolkit/releases/download/4.0.6/PSAppDeployToolkit_Template_v4.zip";

/// Where the two dependencies are downloaded from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSources {
    pub content_prep_url: String,
    /// Zip archive of the toolkit template.
    pub toolkit_url: String,
}

impl Default for ToolSources {
    fn default() -> Self {
        Self {
            content_prep_url: DEFAULT_CONTENT_PREP_URL.into(),
            toolkit_url: DEFAULT_TOOLKIT_URL.into(),
        }
    }
}

/// Locations of the provisioned tools.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub content_prep_exe: PathBuf,
    pub toolkit_dir: PathBuf,
}

impl ToolPaths {
    /// Standard layout under `tools_dir`.
    pub fn in_dir(tools_dir: &Path) -> Self {
        Self {
            content_prep_exe: tools_dir.join(CONTENT_PREP_EXE),
            toolkit_dir: tools_dir.join(TOOLKIT_DIR),
        }
    }

    /// Marker file proving the toolkit tree is complete.
    pub fn toolkit_entry(&self) -> PathBuf {
        self.toolkit_dir.join(TOOLKIT_ENTRY_EXE)
    }
}

/// Presence of each dependency, without side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ToolStatus {
    pub content_prep: bool,
    pub toolkit: bool,
}

impl ToolStatus {
    pub fn is_ready(&self) -> bool {
        self.content_prep && self.toolkit
    }
}

/// Ensures the packaging tools exist under a tools directory.
///
/// Existence-checked, not locked: one agent processes jobs sequentially.
/// The toolkit is staged in a sibling directory and renamed into place,
/// so a half-extracted tree is never mistaken for a complete one.
pub struct ToolProvisioner {
    http: reqwest::Client,
    tools_dir: PathBuf,
    sources: ToolSources,
}

impl ToolProvisioner {
    pub fn new(http: reqwest::Client, tools_dir: PathBuf, sources: ToolSources) -> Self {
        Self {
            http,
            tools_dir,
            sources,
        }
    }

    pub fn paths(&self) -> ToolPaths {
        ToolPaths::in_dir(&self.tools_dir)
    }

    pub fn status(&self) -> ToolStatus {
        let paths = self.paths();
        ToolStatus {
            content_prep: paths.content_prep_exe.is_file(),
            toolkit: paths.toolkit_entry().is_file(),
        }
    }

    /// Downloads whatever is missing and returns the tool paths.
    ///
    /// Performs no network calls when both tools are already present.
    pub async fn ensure_tools(&self) -> Result<ToolPaths, ToolProvisioningError> {
        let paths = self.paths();
        let status = self.status();
        if status.is_ready() {
            debug!(tools_dir = %self.tools_dir.display(), "tools already provisioned");
            return Ok(paths);
        }

        tokio::fs::create_dir_all(&self.tools_dir).await?;

        if !status.content_prep {
            info!(url = %self.sources.content_prep_url, "downloading content-prep tool");
            download_file(
                &self.http,
                &self.sources.content_prep_url,
                &paths.content_prep_exe,
            )
            .await?;
        }

        if !status.toolkit {
            self.install_toolkit(&paths).await?;
        }

        if !paths.content_prep_exe.is_file() {
            return Err(ToolProvisioningError::Missing(paths.content_prep_exe));
        }
        if !paths.toolkit_entry().is_file() {
            return Err(ToolProvisioningError::Missing(paths.toolkit_entry()));
        }

        info!(tools_dir = %self.tools_dir.display(), "tools provisioned");
        Ok(paths)
    }

    async fn install_toolkit(&self, paths: &ToolPaths) -> Result<(), ToolProvisioningError> {
        info!(url = %self.sources.toolkit_url, "downloading toolkit template");

        let archive = self.tools_dir.join("toolkit-template.zip");
        let staging = self.tools_dir.join(format!(".{TOOLKIT_DIR}.staging"));

        download_file(&self.http, &self.sources.toolkit_url, &archive).await?;

        if staging.exists() {
            tokio::fs::remove_dir_all(&staging).await?;
        }

        let extracted = {
            let archive = archive.clone();
            let staging = staging.clone();
            tokio::task::spawn_blocking(move || extract_zip(&archive, &staging))
                .await
                .map_err(|e| ToolProvisioningError::Join(e.to_string()))?
        };
        let _ = tokio::fs::remove_file(&archive).await;
        let files = extracted?;

        let root = template_root(&staging)?;
        if paths.toolkit_dir.exists() {
            // Incomplete tree from an earlier attempt.
            tokio::fs::remove_dir_all(&paths.toolkit_dir).await?;
        }
        tokio::fs::rename(&root, &paths.toolkit_dir).await?;
        if staging.exists() {
            let _ = tokio::fs::remove_dir_all(&staging).await;
        }

        info!(files, dir = %paths.toolkit_dir.display(), "toolkit template extracted");
        Ok(())
    }
}

/// Finds the template root inside an extracted archive.
///
/// Release archives sometimes wrap the template in one top-level folder.
fn template_root(staging: &Path) -> std::io::Result<PathBuf> {
    if staging.join(TOOLKIT_ENTRY_EXE).exists() {
        return Ok(staging.to_path_buf());
    }

    let mut entries = std::fs::read_dir(staging)?.collect::<Result<Vec<_>, _>>()?;
    if entries.len() == 1 && entries[0].file_type()?.is_dir() {
        let only = entries.remove(0).path();
        if only.join(TOOLKIT_ENTRY_EXE).exists() {
            return Ok(only);
        }
    }

    Ok(staging.to_path_buf())
}
