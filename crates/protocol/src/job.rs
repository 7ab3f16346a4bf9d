//! The job record handed out by the control plane.

use serde::{Deserialize, Serialize};

use crate::assignment::Assignment;
use crate::rules::DetectionRule;
use crate::types::{Architecture, CategoryRef, InstallScope, InstallerType, MigrationDirective};

/// One app packaging-and-upload unit of work.
///
/// Treated as an immutable value for the whole processing pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub tenant_id: String,
    /// Package identifier, e.g. `7zip.7zip`.
    pub package_id: String,
    pub display_name: String,
    pub publisher: String,
    pub version: String,
    #[serde(default)]
    pub architecture: Architecture,
    #[serde(default)]
    pub install_scope: InstallScope,
    pub installer_url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_sha256: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub installer_type: Option<InstallerType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub install_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uninstall_command: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub detection_rules: Vec<DetectionRule>,
    /// Requirement rules, already in Graph wire format.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub requirement_rules: Vec<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub assignments: Vec<Assignment>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub categories: Vec<CategoryRef>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub migration: Option<MigrationDirective>,
}

/// Rejected job, with every problem found.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid job: {}", .problems.join("; "))]
pub struct JobValidationError {
    pub problems: Vec<String>,
}

impl Job {
    /// Validates the job once at ingestion.
    pub fn validate(&self) -> Result<(), JobValidationError> {
        let mut problems = Vec::new();

        for (name, value) in [
            ("id", &self.id),
            ("tenantId", &self.tenant_id),
            ("packageId", &self.package_id),
            ("displayName", &self.display_name),
            ("version", &self.version),
        ] {
            if value.trim().is_empty() {
                problems.push(format!("{name} is empty"));
            }
        }

        if !(self.installer_url.starts_with("https://") || self.installer_url.starts_with("http://"))
        {
            problems.push(format!(
                "installerUrl must be http(s): {:?}",
                self.installer_url
            ));
        }

        if let Some(hash) = self.expected_sha256()
            && (hash.len() != 64 || !hash.chars().all(|c| c.is_ascii_hexdigit()))
        {
            problems.push("installerSha256 is not a 64-character hex digest".into());
        }

        if self.resolved_installer_type().is_none() {
            problems.push("installerType missing and not inferable from installerUrl".into());
        }

        for (i, rule) in self.detection_rules.iter().enumerate() {
            if let Some(field) = rule.missing_field() {
                problems.push(format!(
                    "detectionRules[{i}] ({}) is missing {field}",
                    rule.kind()
                ));
            }
        }

        for (i, rule) in self.requirement_rules.iter().enumerate() {
            let tagged = rule
                .get("@odata.type")
                .and_then(|v| v.as_str())
                .is_some_and(|t| !t.is_empty());
            if !tagged {
                problems.push(format!("requirementRules[{i}] has no @odata.type"));
            }
        }

        for (i, a) in self.assignments.iter().enumerate() {
            if let Some(p) = a.problem() {
                problems.push(format!("assignments[{i}]: {p}"));
            }
        }

        if let Some(m) = &self.migration
            && m.previous_app_id.trim().is_empty()
        {
            problems.push("migration.previousAppId is empty".into());
        }

        if problems.is_empty() {
            Ok(())
        } else {
            Err(JobValidationError { problems })
        }
    }

    /// Expected SHA-256, ignoring blank values.
    pub fn expected_sha256(&self) -> Option<&str> {
        self.installer_sha256
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }

    /// Explicit installer type, or the one implied by the download URL.
    pub fn resolved_installer_type(&self) -> Option<InstallerType> {
        self.installer_type
            .or_else(|| InstallerType::from_file_name(&self.installer_url))
    }

    /// File name the installer is saved under.
    ///
    /// Taken from the last URL path segment when it looks like a file,
    /// otherwise derived from the package id and installer type.
    pub fn installer_file_name(&self) -> String {
        let path = self
            .installer_url
            .split(['?', '#'])
            .next()
            .unwrap_or_default();
        let last = path.rsplit('/').next().unwrap_or_default();
        let clean: String = last
            .chars()
            .filter(|c| !matches!(c, '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|'))
            .collect();
        if clean.contains('.') && !clean.starts_with('.') {
            return clean;
        }
        let ext = self
            .resolved_installer_type()
            .map(|t| match t {
                InstallerType::Msi | InstallerType::Wix => "msi",
                InstallerType::Msix => "msix",
                _ => "exe",
            })
            .unwrap_or("exe");
        format!("{}.{ext}", self.package_id.replace(['/', '\\'], "_"))
    }
}
