//! Typed detection rule descriptors.
//!
//! Jobs carry detection rules as a closed set of kinds; translation to the
//! Graph `@odata.type` shapes happens in the uploader.

use serde::{Deserialize, Serialize};

/// Comparison operator used by file, registry and MSI version checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RuleOperator {
    #[default]
    NotConfigured,
    Equal,
    NotEqual,
    GreaterThan,
    GreaterThanOrEqual,
    LessThan,
    LessThanOrEqual,
}

/// What a file-system rule checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FileDetectionType {
    #[default]
    Exists,
    DoesNotExist,
    ModifiedDate,
    CreatedDate,
    Version,
    SizeInMB,
}

/// What a registry rule checks.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum RegistryDetectionType {
    #[default]
    Exists,
    DoesNotExist,
    String,
    Integer,
    Version,
}

/// A condition Intune evaluates on the device to decide whether the app
/// is installed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum DetectionRule {
    #[serde(rename_all = "camelCase")]
    File {
        path: String,
        file_or_folder_name: String,
        #[serde(default)]
        check_32_bit_on_64_system: bool,
        #[serde(default)]
        detection_type: FileDetectionType,
        #[serde(default)]
        operator: RuleOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Registry {
        key_path: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value_name: Option<String>,
        #[serde(default)]
        check_32_bit_on_64_system: bool,
        #[serde(default)]
        detection_type: RegistryDetectionType,
        #[serde(default)]
        operator: RuleOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        value: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    MsiProductCode {
        product_code: String,
        #[serde(default)]
        product_version_operator: RuleOperator,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        product_version: Option<String>,
    },
    #[serde(rename_all = "camelCase")]
    Script {
        /// Plain-text PowerShell; base64-encoded at the API boundary.
        script_content: String,
        #[serde(default)]
        enforce_signature_check: bool,
        #[serde(default)]
        run_as_32_bit: bool,
    },
}

impl DetectionRule {
    /// Short kind name for logs and validation messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::File { .. } => "file",
            Self::Registry { .. } => "registry",
            Self::MsiProductCode { .. } => "msiProductCode",
            Self::Script { .. } => "script",
        }
    }

    /// Returns a description of the first missing required field, if any.
    pub fn missing_field(&self) -> Option<&'static str> {
        match self {
            Self::File {
                path,
                file_or_folder_name,
                ..
            } => {
                if path.trim().is_empty() {
                    Some("path")
                } else if file_or_folder_name.trim().is_empty() {
                    Some("fileOrFolderName")
                } else {
                    None
                }
            }
            Self::Registry { key_path, .. } => key_path.trim().is_empty().then_some("keyPath"),
            Self::MsiProductCode { product_code, .. } => {
                product_code.trim().is_empty().then_some("productCode")
            }
            Self::Script { script_content, .. } => {
                script_content.trim().is_empty().then_some("scriptContent")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_tagged_file_rule() {
        let json = r#"{
            "type": "file",
            "path": "%ProgramFiles%\\7-Zip",
            "fileOrFolderName": "7z.exe",
            "detectionType": "version",
            "operator": "greaterThanOrEqual",
            "value": "23.01"
        }"#;
        let rule: DetectionRule = serde_json::from_str(json).unwrap();
        match rule {
            DetectionRule::File {
                detection_type,
                operator,
                value,
                check_32_bit_on_64_system,
                ..
            } => {
                assert_eq!(detection_type, FileDetectionType::Version);
                assert_eq!(operator, RuleOperator::GreaterThanOrEqual);
                assert_eq!(value.as_deref(), Some("23.01"));
                assert!(!check_32_bit_on_64_system);
            }
            other => panic!("unexpected rule: {other:?}"),
        }
    }

    #[test]
    fn parses_msi_and_script_rules() {
        let msi: DetectionRule = serde_json::from_str(
            r#"{"type":"msiProductCode","productCode":"{1234}"}"#,
        )
        .unwrap();
        assert_eq!(msi.kind(), "msiProductCode");
        assert!(msi.missing_field().is_none());

        let script: DetectionRule =
            serde_json::from_str(r#"{"type":"script","scriptContent":""}"#).unwrap();
        assert_eq!(script.missing_field(), Some("scriptContent"));
    }

    #[test]
    fn unknown_kind_is_rejected() {
        let res = serde_json::from_str::<DetectionRule>(r#"{"type":"wmi","query":"x"}"#);
        assert!(res.is_err());
    }

    #[test]
    fn registry_rule_requires_key_path() {
        let rule = DetectionRule::Registry {
            key_path: " ".into(),
            value_name: None,
            check_32_bit_on_64_system: false,
            detection_type: RegistryDetectionType::Exists,
            operator: RuleOperator::NotConfigured,
            value: None,
        };
        assert_eq!(rule.missing_field(), Some("keyPath"));
    }
}
