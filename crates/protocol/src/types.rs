use serde::{Deserialize, Serialize};

/// Whether an app installs for the whole machine or the signed-in user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallScope {
    #[default]
    Machine,
    User,
}

impl InstallScope {
    /// Graph `runAsAccount` value for this scope.
    pub fn run_as_account(self) -> &'static str {
        match self {
            Self::Machine => "system",
            Self::User => "user",
        }
    }
}

/// Target processor architecture of the installer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Architecture {
    X86,
    #[default]
    X64,
    Arm64,
    Neutral,
}

impl Architecture {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
            Self::Neutral => "neutral",
        }
    }

    /// Graph `applicableArchitectures` flag string.
    pub fn applicable_architectures(self) -> &'static str {
        match self {
            Self::X86 => "x86",
            Self::X64 => "x64",
            Self::Arm64 => "arm64",
            Self::Neutral => "x86,x64",
        }
    }
}

/// Installer technology, which decides the silent switches and the
/// invocation strategy of the generated script.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum InstallerType {
    Msi,
    Exe,
    Inno,
    Nullsoft,
    Wix,
    Burn,
    Msix,
}

impl InstallerType {
    /// Silent switches used when the job supplies none.
    pub fn default_switches(self) -> &'static str {
        match self {
            Self::Msi | Self::Wix => "/qn /norestart",
            Self::Exe | Self::Nullsoft => "/S",
            Self::Inno => "/VERYSILENT /SUPPRESSMSGBOXES /NORESTART",
            Self::Burn => "/q /norestart",
            Self::Msix => "",
        }
    }

    /// MSI-family installers go through the Windows Installer engine.
    pub fn is_msi_family(self) -> bool {
        matches!(self, Self::Msi | Self::Wix)
    }

    /// Guesses the installer type from a file name or URL.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let name = name
            .split(['?', '#'])
            .next()
            .unwrap_or(name)
            .to_ascii_lowercase();
        let ext = name.rsplit_once('.').map(|(_, ext)| ext)?;
        match ext {
            "msi" => Some(Self::Msi),
            "exe" => Some(Self::Exe),
            "msix" | "msixbundle" | "appx" | "appxbundle" => Some(Self::Msix),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Msi => "msi",
            Self::Exe => "exe",
            Self::Inno => "inno",
            Self::Nullsoft => "nullsoft",
            Self::Wix => "wix",
            Self::Burn => "burn",
            Self::Msix => "msix",
        }
    }
}

impl std::fmt::Display for InstallerType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Reference to an Intune app category.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryRef {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Replaces a previous Intune app with the one being deployed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MigrationDirective {
    pub previous_app_id: String,
    /// Reuse the previous app's assignments when the job has none.
    #[serde(default)]
    pub carry_over_assignments: bool,
    /// Clear the previous app's assignments after assigning the new one.
    #[serde(default)]
    pub remove_previous_assignments: bool,
}
