//! Agent configuration management.
//!
//! Configuration is stored as TOML:
//! - Linux: `~/.config/intunepack/agent.toml`
//! - Windows: `%APPDATA%/intunepack/agent.toml`
//!
//! Working data (tools, per-job scratch space) defaults to
//! `~/.local/share/intunepack` or `%LOCALAPPDATA%/intunepack`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use intunepack_graph::DEFAULT_BASE_URL;
use intunepack_orchestrator::OrchestratorConfig;
use intunepack_tools::ToolSources;
use intunepack_uploader::UploadOptions;
use serde::{Deserialize, Serialize};

const MAX_UPLOAD_CONCURRENCY: usize = 32;

/// Why the configuration cannot be used.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("config file not found: {}", .0.display())]
    NotFound(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("invalid TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("invalid configuration:\n  - {}", .0.join("\n  - "))]
    Invalid(Vec<String>),
}

/// Agent configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Identity sent to the control plane when asking for work.
    #[serde(default = "default_agent_id")]
    pub agent_id: String,

    /// Idle delay between job polls.
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Shared, persistent tool cache.
    #[serde(default = "default_tools_dir")]
    pub tools_dir: PathBuf,

    /// Parent of the per-job working directories.
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    #[serde(default)]
    pub control_plane_url: String,

    #[serde(default)]
    pub api_key: String,

    #[serde(default = "default_graph_base_url")]
    pub graph_base_url: String,

    #[serde(default = "default_content_prep_url")]
    pub content_prep_url: String,

    #[serde(default = "default_toolkit_url")]
    pub toolkit_url: String,

    /// Parallel block uploads per job.
    #[serde(default = "default_upload_concurrency")]
    pub upload_concurrency: usize,

    /// Runs the content-prep executable through this program (e.g. `wine`).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content_prep_launcher: Option<PathBuf>,

    #[serde(default = "default_content_prep_timeout")]
    pub content_prep_timeout_secs: u64,
}

fn default_agent_id() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "intunepack-agent".into())
}

fn default_poll_interval() -> u64 {
    10
}

fn default_tools_dir() -> PathBuf {
    data_dir().join("tools")
}

fn default_work_dir() -> PathBuf {
    data_dir().join("work")
}

fn default_graph_base_url() -> String {
    DEFAULT_BASE_URL.into()
}

fn default_content_prep_url() -> String {
    ToolSources::default().content_prep_url
}

fn default_toolkit_url() -> String {
    ToolSources::default().toolkit_url
}

fn default_upload_concurrency() -> usize {
    intunepack_uploader::DEFAULT_CONCURRENCY
}

fn default_content_prep_timeout() -> u64 {
    30 * 60
}

impl Default for Config {
    fn default() -> Self {
        Self {
            agent_id: default_agent_id(),
            poll_interval_secs: default_poll_interval(),
            tools_dir: default_tools_dir(),
            work_dir: default_work_dir(),
            control_plane_url: String::new(),
            api_key: String::new(),
            graph_base_url: default_graph_base_url(),
            content_prep_url: default_content_prep_url(),
            toolkit_url: default_toolkit_url(),
            upload_concurrency: default_upload_concurrency(),
            content_prep_launcher: None,
            content_prep_timeout_secs: default_content_prep_timeout(),
        }
    }
}

impl Config {
    /// Reads the configuration at `path`. Does not validate.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;
        Ok(toml::from_str(&content)?)
    }

    /// Writes the configuration to `path`, owner-readable only on Unix.
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let io = |source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(io)?;
        }

        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content).map_err(io)?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600)).map_err(io)?;
        }

        tracing::debug!(path = %path.display(), "configuration saved");
        Ok(())
    }

    /// Every problem with the loaded values, in field order.
    pub fn issues(&self) -> Vec<String> {
        let mut issues = Vec::new();

        if self.agent_id.trim().is_empty() {
            issues.push("agent_id must not be empty".to_string());
        }
        if self.poll_interval_secs == 0 {
            issues.push("poll_interval_secs must be at least 1".to_string());
        }
        if self.tools_dir.as_os_str().is_empty() {
            issues.push("tools_dir must not be empty".to_string());
        }
        if self.work_dir.as_os_str().is_empty() {
            issues.push("work_dir must not be empty".to_string());
        } else if self.work_dir == self.tools_dir {
            issues.push("work_dir must differ from tools_dir".to_string());
        }
        check_url(&mut issues, "control_plane_url", &self.control_plane_url);
        if self.api_key.trim().is_empty() {
            issues.push("api_key must not be empty".to_string());
        }
        check_url(&mut issues, "graph_base_url", &self.graph_base_url);
        check_url(&mut issues, "content_prep_url", &self.content_prep_url);
        check_url(&mut issues, "toolkit_url", &self.toolkit_url);
        if !(1..=MAX_UPLOAD_CONCURRENCY).contains(&self.upload_concurrency) {
            issues.push(format!(
                "upload_concurrency must be between 1 and {MAX_UPLOAD_CONCURRENCY}, got {}",
                self.upload_concurrency
            ));
        }
        if self.content_prep_timeout_secs == 0 {
            issues.push("content_prep_timeout_secs must be at least 1".to_string());
        }

        issues
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let issues = self.issues();
        if issues.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::Invalid(issues))
        }
    }

    pub fn tool_sources(&self) -> ToolSources {
        ToolSources {
            content_prep_url: self.content_prep_url.clone(),
            toolkit_url: self.toolkit_url.clone(),
        }
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            work_dir: self.work_dir.clone(),
            tools_dir: self.tools_dir.clone(),
            tool_sources: self.tool_sources(),
            content_prep_launcher: self.content_prep_launcher.clone(),
            content_prep_timeout: Some(Duration::from_secs(self.content_prep_timeout_secs)),
            upload: UploadOptions {
                concurrency: self.upload_concurrency,
                ..UploadOptions::default()
            },
        }
    }
}

fn check_url(issues: &mut Vec<String>, key: &str, value: &str) {
    let value = value.trim();
    if value.is_empty() {
        issues.push(format!("{key} must not be empty"));
    } else if !(value.starts_with("https://") || value.starts_with("http://")) {
        issues.push(format!("{key} must be an http(s) URL, got {value:?}"));
    }
}

/// Returns the platform-specific configuration file path.
pub fn default_config_path() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let appdata =
            std::env::var("APPDATA").unwrap_or_else(|_| "C:\\Users\\Default\\AppData".into());
        PathBuf::from(appdata).join("intunepack").join("agent.toml")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".config")
            .join("intunepack")
            .join("agent.toml")
    }
}

fn data_dir() -> PathBuf {
    #[cfg(target_os = "windows")]
    {
        let local = std::env::var("LOCALAPPDATA")
            .unwrap_or_else(|_| "C:\\Users\\Default\\AppData\\Local".into());
        PathBuf::from(local).join("intunepack")
    }

    #[cfg(not(target_os = "windows"))]
    {
        let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".into());
        PathBuf::from(home)
            .join(".local")
            .join("share")
            .join("intunepack")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn valid() -> Config {
        Config {
            control_plane_url: "https://portal.example.test".into(),
            api_key: "secret".into(),
            ..Config::default()
        }
    }

    #[test]
    fn default_config() {
        let config = Config::default();
        assert!(!config.agent_id.is_empty());
        assert_eq!(config.poll_interval_secs, 10);
        assert_eq!(config.upload_concurrency, 4);
        assert_eq!(config.graph_base_url, "https://graph.microsoft.com/beta");
        assert!(config.tools_dir.ends_with("tools"));
        assert!(config.work_dir.ends_with("work"));
        assert!(config.content_prep_launcher.is_none());
    }

    #[test]
    fn partial_toml_uses_defaults() {
        let toml_str = r#"
control_plane_url = "https://portal.example.test"
api_key = "secret"
poll_interval_secs = 30
"#;
        let config: Config = toml::from_str(toml_str).unwrap();
        assert_eq!(config.poll_interval_secs, 30);
        assert_eq!(config.upload_concurrency, 4);
        assert_eq!(config.content_prep_url, ToolSources::default().content_prep_url);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn lists_every_issue() {
        let config = Config {
            agent_id: " ".into(),
            poll_interval_secs: 0,
            control_plane_url: "portal.example.test".into(),
            api_key: String::new(),
            upload_concurrency: 0,
            ..Config::default()
        };

        let issues = config.issues();

        assert_eq!(issues.len(), 5, "{issues:#?}");
        assert!(issues[0].contains("agent_id"));
        assert!(issues[1].contains("poll_interval_secs"));
        assert!(issues[2].contains("control_plane_url"));
        assert!(issues[3].contains("api_key"));
        assert!(issues[4].contains("upload_concurrency"));

        match config.validate() {
            Err(ConfigError::Invalid(listed)) => assert_eq!(listed, issues),
            other => panic!("expected Invalid, got {other:?}"),
        }
    }

    #[test]
    fn rejects_shared_tools_and_work_dir() {
        let config = Config {
            work_dir: PathBuf::from("/srv/intunepack"),
            tools_dir: PathBuf::from("/srv/intunepack"),
            ..valid()
        };
        assert_eq!(config.issues(), vec!["work_dir must differ from tools_dir"]);
    }

    #[test]
    fn invalid_error_lists_issues_on_separate_lines() {
        let err = ConfigError::Invalid(vec!["a is bad".into(), "b is bad".into()]);
        assert_eq!(
            err.to_string(),
            "invalid configuration:\n  - a is bad\n  - b is bad"
        );
    }

    #[test]
    fn missing_file_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let err = Config::load(&tmp.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::NotFound(_)));
    }

    #[test]
    fn malformed_file_is_parse_error() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("agent.toml");
        std::fs::write(&path, "poll_interval_secs = \"soon\"").unwrap();
        assert!(matches!(Config::load(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn save_and_load() {
        let tmp = tempfile::tempdir().unwrap();
        let path = tmp.path().join("nested/agent.toml");
        let config = Config {
            agent_id: "build-01".into(),
            content_prep_launcher: Some(PathBuf::from("/usr/bin/wine")),
            ..valid()
        };

        config.save(&path).unwrap();
        let loaded = Config::load(&path).unwrap();

        assert_eq!(loaded, config);
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = std::fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }
    }

    #[test]
    fn threads_values_into_orchestrator_config() {
        let config = Config {
            upload_concurrency: 8,
            content_prep_timeout_secs: 90,
            ..valid()
        };

        let orchestrator = config.orchestrator_config();

        assert_eq!(orchestrator.upload.concurrency, 8);
        assert_eq!(orchestrator.content_prep_timeout, Some(Duration::from_secs(90)));
        assert_eq!(orchestrator.work_dir, config.work_dir);
        assert_eq!(orchestrator.tool_sources.toolkit_url, config.toolkit_url);
    }

    #[test]
    fn config_path_not_empty() {
        assert!(default_config_path().to_string_lossy().contains("intunepack"));
    }
}
