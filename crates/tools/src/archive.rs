use std::fs::File;
use std::path::Path;

use crate::error::ArchiveError;

/// Extracts every entry of the zip at `archive` under `dest`.
///
/// Entries whose names would resolve outside `dest` are rejected. Returns
/// the number of files written. Blocking; call from `spawn_blocking`.
pub fn extract_zip(archive: &Path, dest: &Path) -> Result<usize, ArchiveError> {
    let mut zip = zip::ZipArchive::new(File::open(archive)?)?;
    std::fs::create_dir_all(dest)?;

    let mut files = 0;
    for i in 0..zip.len() {
        let mut entry = zip.by_index(i)?;
        let Some(rel) = entry.enclosed_name() else {
            return Err(ArchiveError::UnsafeEntry(entry.name().to_string()));
        };
        let out = dest.join(rel);

        if entry.is_dir() {
            std::fs::create_dir_all(&out)?;
            continue;
        }

        if let Some(parent) = out.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = File::create(&out)?;
        std::io::copy(&mut entry, &mut file)?;
        files += 1;
    }

    Ok(files)
}
