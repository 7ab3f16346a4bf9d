//! Reading the sealed `.intunewin` container.

use std::fs::File;
use std::io::Read;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::PackagingError;

const DETECTION_XML: &str = "IntuneWinPackage/Metadata/Detection.xml";
const CONTENTS_DIR: &str = "IntuneWinPackage/Contents";

/// Encryption parameters produced by the content-prep tool.
///
/// Read from `Detection.xml` and committed to Graph verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all(serialize = "camelCase", deserialize = "PascalCase"))]
pub struct EncryptionInfo {
    pub encryption_key: String,
    pub mac_key: String,
    pub initialization_vector: String,
    pub mac: String,
    pub profile_identifier: String,
    pub file_digest: String,
    pub file_digest_algorithm: String,
}

impl EncryptionInfo {
    fn first_empty_field(&self) -> Option<&'static str> {
        [
            ("EncryptionKey", &self.encryption_key),
            ("MacKey", &self.mac_key),
            ("InitializationVector", &self.initialization_vector),
            ("Mac", &self.mac),
            ("ProfileIdentifier", &self.profile_identifier),
            ("FileDigest", &self.file_digest),
            ("FileDigestAlgorithm", &self.file_digest_algorithm),
        ]
        .into_iter()
        .find(|(_, v)| v.trim().is_empty())
        .map(|(name, _)| name)
    }
}

/// Parsed `Detection.xml`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PackageMetadata {
    #[serde(default)]
    pub name: String,
    /// Name of the encrypted payload under `IntuneWinPackage/Contents/`.
    pub file_name: String,
    #[serde(default)]
    pub setup_file: String,
    pub unencrypted_content_size: u64,
    pub encryption_info: EncryptionInfo,
}

/// Parses `Detection.xml` text, requiring every encryption field.
pub fn parse_detection_xml(xml: &str) -> Result<PackageMetadata, PackagingError> {
    let xml = xml.trim_start_matches('\u{feff}');
    let meta: PackageMetadata = quick_xml::de::from_str(xml)
        .map_err(|e| PackagingError::Metadata(format!("Detection.xml: {e}")))?;

    if meta.file_name.trim().is_empty() {
        return Err(PackagingError::Metadata("FileName is empty".into()));
    }
    if let Some(field) = meta.encryption_info.first_empty_field() {
        return Err(PackagingError::Metadata(format!(
            "EncryptionInfo.{field} is empty"
        )));
    }

    Ok(meta)
}

/// Reads the metadata of the `.intunewin` at `artifact`. Blocking.
pub fn read_package_metadata(artifact: &Path) -> Result<PackageMetadata, PackagingError> {
    let mut zip = zip::ZipArchive::new(File::open(artifact)?)?;
    let mut xml = String::new();
    match zip.by_name(DETECTION_XML) {
        Ok(mut entry) => {
            entry.read_to_string(&mut xml)?;
        }
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(PackagingError::Metadata(format!(
                "{DETECTION_XML} not found in {}",
                artifact.display()
            )));
        }
        Err(e) => return Err(e.into()),
    }
    parse_detection_xml(&xml)
}

/// Copies the encrypted payload `file_name` out of `artifact` to `dest`.
///
/// Returns the payload size in bytes. Blocking.
pub fn extract_encrypted_content(
    artifact: &Path,
    file_name: &str,
    dest: &Path,
) -> Result<u64, PackagingError> {
    if file_name.contains(['/', '\\']) || file_name == ".." {
        return Err(PackagingError::Metadata(format!(
            "unsafe payload name {file_name:?}"
        )));
    }

    let mut zip = zip::ZipArchive::new(File::open(artifact)?)?;
    let entry_name = format!("{CONTENTS_DIR}/{file_name}");
    let mut entry = match zip.by_name(&entry_name) {
        Ok(entry) => entry,
        Err(zip::result::ZipError::FileNotFound) => {
            return Err(PackagingError::Metadata(format!(
                "{entry_name} not found in {}",
                artifact.display()
            )));
        }
        Err(e) => return Err(e.into()),
    };

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let mut out = File::create(dest)?;
    let size = std::io::copy(&mut entry, &mut out)?;
    Ok(size)
}
