//! Translation of job descriptors into Graph wire payloads.
//!
//! Typed values are turned into OData-tagged JSON only here.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use intunepack_packager::{EncryptionInfo, PackagingResult};
use intunepack_protocol::{
    Assignment, AssignmentIntent, AssignmentTarget, DetectionRule, FileDetectionType, Job,
    RuleOperator,
};
use serde_json::{Value, json};

const INSTALL_COMMAND: &str = "Invoke-AppDeployToolkit.exe -DeploymentType Install -DeployMode Silent";
const UNINSTALL_COMMAND: &str =
    "Invoke-AppDeployToolkit.exe -DeploymentType Uninstall -DeployMode Silent";
const MINIMUM_WINDOWS_RELEASE: &str = "1607";

/// Body of the `win32LobApp` creation request.
pub fn app_body(job: &Job, package: &PackagingResult) -> Value {
    let description = job
        .description
        .as_deref()
        .filter(|d| !d.trim().is_empty())
        .unwrap_or(&job.display_name);

    json!({
        "@odata.type": "#microsoft.graph.win32LobApp",
        "displayName": job.display_name,
        "description": description,
        "publisher": job.publisher,
        "displayVersion": job.version,
        "notes": format!("Packaged by intunepack from {}", job.package_id),
        "isFeatured": false,
        "fileName": package.file_name,
        "setupFilePath": package.setup_file,
        "installCommandLine": INSTALL_COMMAND,
        "uninstallCommandLine": UNINSTALL_COMMAND,
        "applicableArchitectures": job.architecture.applicable_architectures(),
        "minimumSupportedWindowsRelease": MINIMUM_WINDOWS_RELEASE,
        "installExperience": {
            "@odata.type": "#microsoft.graph.win32LobAppInstallExperience",
            "runAsAccount": job.install_scope.run_as_account(),
            "deviceRestartBehavior": "suppress",
        },
        "returnCodes": [
            return_code(0, "success"),
            return_code(1707, "success"),
            return_code(3010, "softReboot"),
            return_code(1641, "hardReboot"),
            return_code(1618, "retry"),
        ],
    })
}

fn return_code(code: i32, kind: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.win32LobAppReturnCode",
        "returnCode": code,
        "type": kind,
    })
}

/// Body of the content-file registration request.
pub fn content_file_body(package: &PackagingResult, name: &str) -> Value {
    json!({
        "@odata.type": "#microsoft.graph.mobileAppContentFile",
        "name": name,
        "size": package.unencrypted_size,
        "sizeEncrypted": package.encrypted_size,
        "manifest": null,
        "isDependency": false,
    })
}

/// Body of the file commit request.
pub fn commit_body(info: &EncryptionInfo) -> Value {
    let mut encryption = json!(info);
    if let Some(obj) = encryption.as_object_mut() {
        obj.insert(
            "@odata.type".into(),
            json!("#microsoft.graph.fileEncryptionInfo"),
        );
    }
    json!({ "fileEncryptionInfo": encryption })
}

/// Keeps characters that are safe in a Program Files folder name.
pub fn sanitize_display_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric() || matches!(c, ' ' | '.' | '-' | '_'))
        .collect::<String>()
        .trim()
        .to_string()
}

/// File-exists rule for `%ProgramFiles%\{display name}`, used when the job
/// carries no detection rules.
pub fn default_detection_rule(job: &Job) -> DetectionRule {
    DetectionRule::File {
        path: "%ProgramFiles%".into(),
        file_or_folder_name: sanitize_display_name(&job.display_name),
        check_32_bit_on_64_system: false,
        detection_type: FileDetectionType::Exists,
        operator: RuleOperator::NotConfigured,
        value: None,
    }
}

/// Wire form of one detection rule.
pub fn detection_rule(rule: &DetectionRule) -> Value {
    match rule {
        DetectionRule::File {
            path,
            file_or_folder_name,
            check_32_bit_on_64_system,
            detection_type,
            operator,
            value,
        } => json!({
            "@odata.type": "#microsoft.graph.win32LobAppFileSystemRule",
            "ruleType": "detection",
            "path": path,
            "fileOrFolderName": file_or_folder_name,
            "check32BitOn64System": check_32_bit_on_64_system,
            "operationType": detection_type,
            "operator": operator,
            "comparisonValue": value,
        }),
        DetectionRule::Registry {
            key_path,
            value_name,
            check_32_bit_on_64_system,
            detection_type,
            operator,
            value,
        } => json!({
            "@odata.type": "#microsoft.graph.win32LobAppRegistryRule",
            "ruleType": "detection",
            "keyPath": key_path,
            "valueName": value_name,
            "check32BitOn64System": check_32_bit_on_64_system,
            "operationType": detection_type,
            "operator": operator,
            "comparisonValue": value,
        }),
        DetectionRule::MsiProductCode {
            product_code,
            product_version_operator,
            product_version,
        } => json!({
            "@odata.type": "#microsoft.graph.win32LobAppProductCodeRule",
            "ruleType": "detection",
            "productCode": product_code,
            "productVersionOperator": product_version_operator,
            "productVersion": product_version,
        }),
        DetectionRule::Script {
            script_content,
            enforce_signature_check,
            run_as_32_bit,
        } => json!({
            "@odata.type": "#microsoft.graph.win32LobAppPowerShellScriptRule",
            "ruleType": "detection",
            "displayName": null,
            "scriptContent": STANDARD.encode(script_content),
            "enforceSignatureCheck": enforce_signature_check,
            "runAs32Bit": run_as_32_bit,
            "runAsAccount": null,
            "operationType": "notConfigured",
            "operator": "notConfigured",
            "comparisonValue": null,
        }),
    }
}

/// Every rule the job contributes: detection rules (or the default) and
/// the requirement rules, which are already in wire form.
pub fn job_rules(job: &Job) -> Vec<Value> {
    let mut rules: Vec<Value> = if job.detection_rules.is_empty() {
        vec![detection_rule(&default_detection_rule(job))]
    } else {
        job.detection_rules.iter().map(detection_rule).collect()
    };
    rules.extend(job.requirement_rules.iter().cloned());
    rules
}

/// `existing` followed by each of `added` not already present.
pub fn union_rules(existing: &[Value], added: Vec<Value>) -> Vec<Value> {
    let mut all = existing.to_vec();
    for rule in added {
        if !all.contains(&rule) {
            all.push(rule);
        }
    }
    all
}

fn target(target: &AssignmentTarget) -> Value {
    match target {
        AssignmentTarget::AllUsers => json!({
            "@odata.type": "#microsoft.graph.allLicensedUsersAssignmentTarget",
        }),
        AssignmentTarget::AllDevices => json!({
            "@odata.type": "#microsoft.graph.allDevicesAssignmentTarget",
        }),
        AssignmentTarget::Group { group_id } => json!({
            "@odata.type": "#microsoft.graph.groupAssignmentTarget",
            "groupId": group_id,
        }),
        AssignmentTarget::ExclusionGroup { group_id } => json!({
            "@odata.type": "#microsoft.graph.exclusionGroupAssignmentTarget",
            "groupId": group_id,
        }),
    }
}

/// Graph intent. Update-only is sent as required; the requirement rules
/// keep it off devices without the app.
pub fn intent(intent: AssignmentIntent) -> &'static str {
    match intent {
        AssignmentIntent::Required | AssignmentIntent::UpdateOnly => "required",
        AssignmentIntent::Available => "available",
        AssignmentIntent::Uninstall => "uninstall",
    }
}

/// Wire form of one assignment.
pub fn assignment(a: &Assignment) -> Value {
    let mut target = target(&a.target);
    if let Some(obj) = target.as_object_mut() {
        match &a.filter {
            Some(filter) => {
                obj.insert(
                    "deviceAndAppManagementAssignmentFilterId".into(),
                    json!(filter.id),
                );
                obj.insert(
                    "deviceAndAppManagementAssignmentFilterType".into(),
                    json!(filter.mode.as_str()),
                );
            }
            None if !a.target.is_exclusion() => {
                obj.insert(
                    "deviceAndAppManagementAssignmentFilterType".into(),
                    json!("none"),
                );
            }
            None => {}
        }
    }

    json!({
        "@odata.type": "#microsoft.graph.mobileAppAssignment",
        "intent": intent(a.intent),
        "target": target,
        "settings": {
            "@odata.type": "#microsoft.graph.win32LobAppAssignmentSettings",
            "notifications": "showAll",
            "deliveryOptimizationPriority": "notConfigured",
        },
    })
}

/// Re-targets assignments read from another app: server-assigned fields
/// are dropped.
pub fn carried_assignment(existing: &Value) -> Option<Value> {
    let target = existing.get("target")?.clone();
    let intent = existing.get("intent")?.clone();
    let mut out = json!({
        "@odata.type": "#microsoft.graph.mobileAppAssignment",
        "intent": intent,
        "target": target,
    });
    if let Some(settings) = existing.get("settings").filter(|s| !s.is_null())
        && let Some(obj) = out.as_object_mut()
    {
        obj.insert("settings".into(), settings.clone());
    }
    Some(out)
}
