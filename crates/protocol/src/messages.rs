use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Control-plane payloads
// ---------------------------------------------------------------------------

/// Job status as understood by the control plane.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Packaging,
    Uploading,
    Deployed,
    Failed,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Deployed | Self::Failed)
    }
}

/// Status change pushed to the control plane.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusUpdate {
    pub status: JobStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intune_app_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub intune_app_url: Option<String>,
}

impl StatusUpdate {
    pub fn packaging() -> Self {
        Self {
            status: JobStatus::Packaging,
            message: None,
            intune_app_id: None,
            intune_app_url: None,
        }
    }

    pub fn uploading() -> Self {
        Self {
            status: JobStatus::Uploading,
            message: None,
            intune_app_id: None,
            intune_app_url: None,
        }
    }

    pub fn deployed(app_id: &str, app_url: &str) -> Self {
        Self {
            status: JobStatus::Deployed,
            message: None,
            intune_app_id: Some(app_id.to_string()),
            intune_app_url: Some(app_url.to_string()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            status: JobStatus::Failed,
            message: Some(message.into()),
            intune_app_id: None,
            intune_app_url: None,
        }
    }
}

/// Fractional progress pushed to the control plane.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressUpdate {
    /// 0 to 100.
    pub percent: u8,
    pub message: String,
}

/// Access token for the Graph API of one tenant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphToken {
    pub access_token: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deployed_update_wire_shape() {
        let update = StatusUpdate::deployed("app-1", "https://x/app-1");
        let json = serde_json::to_value(&update).unwrap();
        assert_eq!(json["status"], "deployed");
        assert_eq!(json["intuneAppId"], "app-1");
        assert!(json.get("message").is_none());
    }

    #[test]
    fn failed_update_carries_message() {
        let json = serde_json::to_value(StatusUpdate::failed("boom")).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["message"], "boom");
        assert!(JobStatus::Failed.is_terminal());
        assert!(!JobStatus::Uploading.is_terminal());
    }

    #[test]
    fn token_parses_without_expiry() {
        let t: GraphToken = serde_json::from_str(r#"{"accessToken":"abc"}"#).unwrap();
        assert_eq!(t.access_token, "abc");
        assert!(t.expires_on.is_none());
    }
}
