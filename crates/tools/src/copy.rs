//! Recursive directory copy.

use std::path::Path;

/// Copies the tree under `src` into `dst`, creating directories as needed.
///
/// Symbolic links are skipped rather than followed, so a link inside the
/// template cannot pull files from elsewhere into a package. Returns the
/// number of files copied.
pub fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<u64> {
    std::fs::create_dir_all(dst)?;
    let mut copied = 0;

    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let target = dst.join(entry.file_name());

        if file_type.is_symlink() {
            tracing::debug!(path = %entry.path().display(), "skipping symlink");
        } else if file_type.is_dir() {
            copied += copy_dir_recursive(&entry.path(), &target)?;
        } else if file_type.is_file() {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }

    Ok(copied)
}
