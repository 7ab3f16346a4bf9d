use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use intunepack_protocol::Job;
use intunepack_tools::{TOOLKIT_ENTRY_EXE, ToolPaths, copy_dir_recursive};
use tokio::process::Command;
use tracing::{debug, info};

use crate::error::PackagingError;
use crate::metadata::{EncryptionInfo, extract_encrypted_content, read_package_metadata};
use crate::script::{SCRIPT_FILE_NAME, generate_script};

/// Source tree handed to the content-prep tool.
pub const PACKAGE_DIR: &str = "Package";
/// Directory the content-prep tool writes the artifact to.
pub const OUTPUT_DIR: &str = "Output";
/// Directory holding the extracted encrypted payload.
pub const UPLOAD_DIR: &str = "Upload";
/// Installer location inside the package tree.
pub const FILES_DIR: &str = "Files";

const ARTIFACT_EXTENSION: &str = "intunewin";
const DEFAULT_TOOL_TIMEOUT: Duration = Duration::from_secs(30 * 60);

/// A sealed package ready for upload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PackagingResult {
    /// The `.intunewin` produced by the content-prep tool.
    pub artifact_path: PathBuf,
    /// Encrypted payload extracted from the artifact; this is what gets uploaded.
    pub encrypted_content_path: PathBuf,
    /// File name of the artifact, reported to Graph as the app's `fileName`.
    pub file_name: String,
    pub setup_file: String,
    pub unencrypted_size: u64,
    pub encrypted_size: u64,
    pub encryption_info: EncryptionInfo,
}

/// Builds the package tree for a job and seals it with the content-prep tool.
pub struct PackageAssembler {
    tools: ToolPaths,
    launcher: Option<PathBuf>,
    timeout: Duration,
}

impl PackageAssembler {
    pub fn new(tools: ToolPaths) -> Self {
        Self {
            tools,
            launcher: None,
            timeout: DEFAULT_TOOL_TIMEOUT,
        }
    }

    /// Runs the content-prep executable through `launcher` (e.g. `wine`).
    pub fn with_launcher(mut self, launcher: impl Into<PathBuf>) -> Self {
        self.launcher = Some(launcher.into());
        self
    }

    /// Upper bound on a single content-prep run.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Stages `Package/`, runs the tool into `Output/` and reads the result.
    pub async fn assemble(
        &self,
        job: &Job,
        installer: &Path,
        work_dir: &Path,
    ) -> Result<PackagingResult, PackagingError> {
        let installer_name = installer
            .file_name()
            .and_then(|n| n.to_str())
            .map(str::to_string)
            .ok_or_else(|| {
                std::io::Error::new(
                    std::io::ErrorKind::InvalidInput,
                    format!("installer path has no file name: {}", installer.display()),
                )
            })?;

        let package_dir = work_dir.join(PACKAGE_DIR);
        let output_dir = work_dir.join(OUTPUT_DIR);

        let script = generate_script(job, &installer_name);
        let copied = {
            let toolkit = self.tools.toolkit_dir.clone();
            let package_dir = package_dir.clone();
            let installer = installer.to_path_buf();
            tokio::task::spawn_blocking(move || {
                stage_package_tree(&toolkit, &package_dir, &installer, &installer_name, &script)
            })
            .await
            .map_err(|e| PackagingError::Join(e.to_string()))??
        };
        info!(job_id = %job.id, files = copied, "package tree staged");

        tokio::fs::create_dir_all(&output_dir).await?;
        self.run_content_prep(&package_dir, &output_dir).await?;

        let artifact = find_single_artifact(&output_dir).await?;
        info!(job_id = %job.id, artifact = %artifact.display(), "package sealed");

        let upload_dir = work_dir.join(UPLOAD_DIR);
        tokio::task::spawn_blocking(move || read_result(artifact, &upload_dir))
            .await
            .map_err(|e| PackagingError::Join(e.to_string()))?
    }

    async fn run_content_prep(
        &self,
        package_dir: &Path,
        output_dir: &Path,
    ) -> Result<(), PackagingError> {
        let (program, mut cmd) = match &self.launcher {
            Some(launcher) => {
                let mut cmd = Command::new(launcher);
                cmd.arg(&self.tools.content_prep_exe);
                (launcher.clone(), cmd)
            }
            None => (
                self.tools.content_prep_exe.clone(),
                Command::new(&self.tools.content_prep_exe),
            ),
        };

        cmd.arg("-c")
            .arg(package_dir)
            .arg("-s")
            .arg(TOOLKIT_ENTRY_EXE)
            .arg("-o")
            .arg(output_dir)
            .arg("-q")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        debug!(program = %program.display(), "running content prep tool");
        let child = cmd.spawn().map_err(|source| PackagingError::Spawn {
            program: program.display().to_string(),
            source,
        })?;

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| PackagingError::Timeout(self.timeout))??;

        let stdout = String::from_utf8_lossy(&output.stdout);
        if !stdout.trim().is_empty() {
            debug!(output = %stdout.trim(), "content prep tool output");
        }

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(PackagingError::ToolFailed {
                code: output.status.code(),
                stderr: if stderr.is_empty() {
                    stdout.trim().to_string()
                } else {
                    stderr
                },
            });
        }

        Ok(())
    }
}

fn stage_package_tree(
    toolkit: &Path,
    package_dir: &Path,
    installer: &Path,
    installer_name: &str,
    script: &str,
) -> Result<u64, PackagingError> {
    let mut copied = copy_dir_recursive(toolkit, package_dir)?;

    let files_dir = package_dir.join(FILES_DIR);
    std::fs::create_dir_all(&files_dir)?;
    std::fs::copy(installer, files_dir.join(installer_name))?;
    copied += 1;

    std::fs::write(package_dir.join(SCRIPT_FILE_NAME), script)?;
    Ok(copied)
}

async fn find_single_artifact(output_dir: &Path) -> Result<PathBuf, PackagingError> {
    let mut found = Vec::new();
    let mut entries = tokio::fs::read_dir(output_dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        let is_artifact = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case(ARTIFACT_EXTENSION));
        if is_artifact && entry.file_type().await?.is_file() {
            found.push(path);
        }
    }

    match found.len() {
        0 => Err(PackagingError::NoOutput(output_dir.to_path_buf())),
        1 => Ok(found.remove(0)),
        _ => {
            found.sort();
            Err(PackagingError::AmbiguousOutput(found))
        }
    }
}

fn read_result(artifact: PathBuf, upload_dir: &Path) -> Result<PackagingResult, PackagingError> {
    let meta = read_package_metadata(&artifact)?;
    let encrypted_content_path = upload_dir.join(&meta.file_name);
    let encrypted_size =
        extract_encrypted_content(&artifact, &meta.file_name, &encrypted_content_path)?;

    let file_name = artifact
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    Ok(PackagingResult {
        artifact_path: artifact,
        encrypted_content_path,
        file_name,
        setup_file: meta.setup_file,
        unencrypted_size: meta.unencrypted_content_size,
        encrypted_size,
        encryption_info: meta.encryption_info,
    })
}
