//! Assignment descriptors: who receives the app and how.

use serde::{Deserialize, Serialize};

/// Audience of an assignment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum AssignmentTarget {
    AllUsers,
    AllDevices,
    #[serde(rename_all = "camelCase")]
    Group { group_id: String },
    #[serde(rename_all = "camelCase")]
    ExclusionGroup { group_id: String },
}

impl AssignmentTarget {
    pub fn is_exclusion(&self) -> bool {
        matches!(self, Self::ExclusionGroup { .. })
    }
}

/// Install intent of an assignment.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum AssignmentIntent {
    #[default]
    Required,
    Available,
    Uninstall,
    /// Required only on devices that already have the app; gated by
    /// requirement rules rather than by the assignment itself.
    UpdateOnly,
}

/// Whether the assignment filter includes or excludes matching devices.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FilterMode {
    #[default]
    Include,
    Exclude,
}

impl FilterMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Include => "include",
            Self::Exclude => "exclude",
        }
    }
}

/// Assignment filter attached to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssignmentFilter {
    pub id: String,
    #[serde(default)]
    pub mode: FilterMode,
}

/// One assignment of the app.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Assignment {
    pub target: AssignmentTarget,
    #[serde(default)]
    pub intent: AssignmentIntent,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<AssignmentFilter>,
}

impl Assignment {
    /// Checks the assignment shape, returning a human-readable problem.
    pub fn problem(&self) -> Option<String> {
        match &self.target {
            AssignmentTarget::Group { group_id } | AssignmentTarget::ExclusionGroup { group_id }
                if group_id.trim().is_empty() =>
            {
                return Some("group target without groupId".into());
            }
            _ => {}
        }
        if let Some(filter) = &self.filter {
            if self.target.is_exclusion() {
                return Some("exclusion group targets cannot carry a filter".into());
            }
            if filter.id.trim().is_empty() {
                return Some("filter without id".into());
            }
        }
        None
    }
}
