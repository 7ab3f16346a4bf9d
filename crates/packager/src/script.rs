//! PowerShell deployment-toolkit entry script generation.

use std::fmt::Write;
use std::sync::LazyLock;

use intunepack_protocol::{InstallScope, InstallerType, Job};
use regex::Regex;

/// File name of the generated entry script inside the package root.
pub const SCRIPT_FILE_NAME: &str = "Invoke-AppDeployToolkit.ps1";

/// Registry root under which install markers are written.
const MARKER_ROOT: &str = r"SOFTWARE\IntunePack\Apps";

/// Trailing run of switch tokens: `/x`, `-x`, `--x`, each optionally
/// carrying a `=value` or a quoted value.
static TRAILING_SWITCHES: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?:^|\s)((?:--?|/)[A-Za-z0-9?][^\s"]*(?:"[^"]*")?(?:\s+(?:--?|/)[A-Za-z0-9?][^\s"]*(?:"[^"]*")?)*)\s*$"#,
    )
    .expect("switch regex is valid")
});

const PLACEHOLDER_SWITCHES: [&str; 2] = ["-deploymenttype", "-deploymode"];

/// Quotes `value` as a single-quoted PowerShell literal.
///
/// Straight and typographic single quotes are doubled; control characters
/// become spaces.
pub fn escape_ps(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for c in value.chars() {
        match c {
            '\'' | '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' => {
                out.push(c);
                out.push(c);
            }
            c if c.is_control() => out.push(' '),
            c => out.push(c),
        }
    }
    out.push('\'');
    out
}

/// Replaces every `.` and `-` in a package id with `_`.
pub fn sanitize_package_id(package_id: &str) -> String {
    package_id.replace(['.', '-'], "_")
}

/// Registry path of the install marker for `package_id`.
pub fn marker_key_path(scope: InstallScope, package_id: &str) -> String {
    let hive = match scope {
        InstallScope::Machine => "HKLM",
        InstallScope::User => "HKCU",
    };
    format!(r"{hive}:\{MARKER_ROOT}\{}", sanitize_package_id(package_id))
}

/// Silent switches found at the end of an install command line.
///
/// Returns `None` when the command ends in no switches, or only in
/// deployment-type placeholders.
pub fn extract_switches(command: &str) -> Option<String> {
    let caps = TRAILING_SWITCHES.captures(command.trim())?;
    let switches = caps.get(1)?.as_str().trim();

    let only_placeholders = switches.split_whitespace().all(|token| {
        let lower = token.to_ascii_lowercase();
        PLACEHOLDER_SWITCHES.iter().any(|p| lower.starts_with(p))
    });
    if only_placeholders {
        return None;
    }

    Some(switches.to_string())
}

/// Switches for `installer_type`, preferring those in `install_command`.
pub fn resolve_switches(install_command: Option<&str>, installer_type: InstallerType) -> String {
    install_command
        .and_then(extract_switches)
        .unwrap_or_else(|| installer_type.default_switches().to_string())
}

/// Splits a command line into its program and the remaining arguments.
fn split_command(command: &str) -> (String, String) {
    let command = command.trim();
    if let Some(rest) = command.strip_prefix('"')
        && let Some(end) = rest.find('"')
    {
        return (rest[..end].to_string(), rest[end + 1..].trim().to_string());
    }
    match command.split_once(char::is_whitespace) {
        Some((program, args)) => (program.to_string(), args.trim().to_string()),
        None => (command.to_string(), String::new()),
    }
}

/// Generates the toolkit entry script for `job`.
///
/// `installer_file_name` is the installer's name inside `Files/`.
pub fn generate_script(job: &Job, installer_file_name: &str) -> String {
    let installer_type = job.resolved_installer_type().unwrap_or(InstallerType::Exe);
    let switches = resolve_switches(job.install_command.as_deref(), installer_type);
    let marker = escape_ps(&marker_key_path(job.install_scope, &job.package_id));
    let installer = escape_ps(installer_file_name);

    let mut s = String::new();
    write_header(&mut s, job);

    // Install.
    s.push_str("function Install-ADTDeployment\n{\n");
    s.push_str("    $adtSession.InstallPhase = \"Pre-$($adtSession.DeploymentType)\"\n\n");
    s.push_str("    $adtSession.InstallPhase = $adtSession.DeploymentType\n");
    write_install_call(&mut s, job, installer_type, &installer, &switches);
    s.push_str("\n    $adtSession.InstallPhase = \"Post-$($adtSession.DeploymentType)\"\n");
    let _ = writeln!(
        s,
        "    Set-ADTRegistryKey -LiteralPath {marker} -Name 'Version' -Value {} -Type String",
        escape_ps(&job.version)
    );
    let _ = writeln!(
        s,
        "    Set-ADTRegistryKey -LiteralPath {marker} -Name 'DisplayName' -Value {} -Type String",
        escape_ps(&job.display_name)
    );
    let _ = writeln!(
        s,
        "    Set-ADTRegistryKey -LiteralPath {marker} -Name 'Publisher' -Value {} -Type String",
        escape_ps(&job.publisher)
    );
    let _ = writeln!(
        s,
        "    Set-ADTRegistryKey -LiteralPath {marker} -Name 'InstallDate' -Value (Get-Date -Format 'yyyy-MM-ddTHH:mm:ss') -Type String"
    );
    s.push_str("}\n\n");

    // Uninstall.
    s.push_str("function Uninstall-ADTDeployment\n{\n");
    s.push_str("    $adtSession.InstallPhase = \"Pre-$($adtSession.DeploymentType)\"\n\n");
    s.push_str("    $adtSession.InstallPhase = $adtSession.DeploymentType\n");
    write_uninstall_call(&mut s, job, installer_type, &installer);
    s.push_str("\n    $adtSession.InstallPhase = \"Post-$($adtSession.DeploymentType)\"\n");
    let _ = writeln!(s, "    Remove-ADTRegistryKey -LiteralPath {marker} -Recurse");
    s.push_str("}\n\n");

    // Repair.
    s.push_str("function Repair-ADTDeployment\n{\n");
    s.push_str("    $adtSession.InstallPhase = \"Pre-$($adtSession.DeploymentType)\"\n\n");
    s.push_str("    $adtSession.InstallPhase = $adtSession.DeploymentType\n");
    if installer_type.is_msi_family() {
        let _ = writeln!(
            s,
            "    Start-ADTMsiProcess -Action Repair -FilePath {installer}"
        );
    } else {
        write_install_call(&mut s, job, installer_type, &installer, &switches);
    }
    s.push_str("}\n\n");

    s.push_str(SCRIPT_FOOTER);
    s
}

fn write_header(s: &mut String, job: &Job) {
    s.push_str(SCRIPT_PARAMS);
    s.push_str("$adtSession = @{\n");
    let _ = writeln!(s, "    AppVendor = {}", escape_ps(&job.publisher));
    let _ = writeln!(s, "    AppName = {}", escape_ps(&job.display_name));
    let _ = writeln!(s, "    AppVersion = {}", escape_ps(&job.version));
    let _ = writeln!(s, "    AppArch = {}", escape_ps(job.architecture.as_str()));
    s.push_str("    AppLang = 'EN'\n");
    s.push_str("    AppRevision = '01'\n");
    s.push_str("    AppSuccessExitCodes = @(0)\n");
    s.push_str("    AppRebootExitCodes = @(1641, 3010)\n");
    s.push_str("    AppScriptVersion = '1.0.0'\n");
    s.push_str("    AppScriptAuthor = 'intunepack'\n");
    s.push_str("    InstallName = ''\n");
    s.push_str("    InstallTitle = ''\n");
    s.push_str("    DeployAppScriptFriendlyName = $MyInvocation.MyCommand.Name\n");
    s.push_str("    DeployAppScriptParameters = $PSBoundParameters\n");
    s.push_str("}\n\n");
}

fn write_install_call(
    s: &mut String,
    job: &Job,
    installer_type: InstallerType,
    installer: &str,
    switches: &str,
) {
    if installer_type.is_msi_family() {
        let _ = writeln!(
            s,
            "    Start-ADTMsiProcess -Action Install -FilePath {installer} -ArgumentList {}",
            escape_ps(switches)
        );
    } else if installer_type == InstallerType::Msix {
        let cmdlet = match job.install_scope {
            InstallScope::Machine => {
                "Add-AppxProvisionedPackage -Online -SkipLicense -PackagePath"
            }
            InstallScope::User => "Add-AppxPackage -Path",
        };
        let _ = writeln!(
            s,
            "    {cmdlet} (Join-Path -Path $adtSession.DirFiles -ChildPath {installer})"
        );
    } else if switches.is_empty() {
        let _ = writeln!(s, "    Start-ADTProcess -FilePath {installer}");
    } else {
        let _ = writeln!(
            s,
            "    Start-ADTProcess -FilePath {installer} -ArgumentList {}",
            escape_ps(switches)
        );
    }
}

fn write_uninstall_call(s: &mut String, job: &Job, installer_type: InstallerType, installer: &str) {
    let explicit = job
        .uninstall_command
        .as_deref()
        .map(str::trim)
        .filter(|c| !c.is_empty());

    if let Some(command) = explicit {
        let (program, args) = split_command(command);
        if args.is_empty() {
            let _ = writeln!(s, "    Start-ADTProcess -FilePath {}", escape_ps(&program));
        } else {
            let _ = writeln!(
                s,
                "    Start-ADTProcess -FilePath {} -ArgumentList {}",
                escape_ps(&program),
                escape_ps(&args)
            );
        }
    } else if installer_type.is_msi_family() {
        let _ = writeln!(
            s,
            "    Start-ADTMsiProcess -Action Uninstall -FilePath {installer}"
        );
    } else {
        s.push_str(
            "    Write-ADTLogEntry -Message 'No uninstall command was supplied for this package.' -Severity 2\n",
        );
    }
}

const SCRIPT_PARAMS: &str = r#"[CmdletBinding()]
param
(
    [Parameter(Mandatory = $false)]
    [ValidateSet('Install', 'Uninstall', 'Repair')]
    [System.String]$DeploymentType = 'Install',

    [Parameter(Mandatory = $false)]
    [ValidateSet('Auto', 'Interactive', 'NonInteractive', 'Silent')]
    [System.String]$DeployMode = 'Silent',

    [Parameter(Mandatory = $false)]
    [System.Management.Automation.SwitchParameter]$SuppressRebootPassThru,

    [Parameter(Mandatory = $false)]
    [System.Management.Automation.SwitchParameter]$DisableLogging
)

"#;

const SCRIPT_FOOTER: &str = r#"$ErrorActionPreference = [System.Management.Automation.ActionPreference]::Stop
$ProgressPreference = [System.Management.Automation.ActionPreference]::SilentlyContinue
Set-StrictMode -Version 1

try
{
    $moduleName = if ([System.IO.File]::Exists("$PSScriptRoot\PSAppDeployToolkit\PSAppDeployToolkit.psd1"))
    {
        Get-ChildItem -LiteralPath $PSScriptRoot\PSAppDeployToolkit -Recurse -File | Unblock-File -ErrorAction Ignore
        "$PSScriptRoot\PSAppDeployToolkit\PSAppDeployToolkit.psd1"
    }
    else
    {
        'PSAppDeployToolkit'
    }
    Import-Module -Name $moduleName -Force
    $iadtParams = Get-ADTBoundParametersAndDefaultValues -Invocation $MyInvocation
    $adtSession = Open-ADTSession -SessionState $ExecutionContext.SessionState @adtSession @iadtParams -PassThru
}
catch
{
    $Host.UI.WriteErrorLine((Out-String -InputObject $_ -Width ([System.Int32]::MaxValue)))
    exit 60008
}

try
{
    & "$($adtSession.DeploymentType)-ADTDeployment"
    Close-ADTSession
}
catch
{
    Write-ADTLogEntry -Message "Unhandled error: $(Resolve-ADTErrorRecord -ErrorRecord $_)" -Severity 3
    Close-ADTSession -ExitCode 60001
}
"#;
