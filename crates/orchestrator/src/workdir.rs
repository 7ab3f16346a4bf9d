use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Per-job scratch directory, removed when dropped.
///
/// Removal failures are logged, never raised.
#[derive(Debug)]
pub struct WorkDir {
    path: PathBuf,
}

impl WorkDir {
    /// Creates a fresh directory for `job_id` under `root`.
    pub fn create(root: &Path, job_id: &str) -> std::io::Result<Self> {
        let name: String = job_id
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
            .take(64)
            .collect();
        let path = root.join(format!("job-{name}-{}", uuid::Uuid::new_v4().simple()));
        std::fs::create_dir_all(&path)?;
        debug!(path = %path.display(), "work dir created");
        Ok(Self { path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for WorkDir {
    fn drop(&mut self) {
        match std::fs::remove_dir_all(&self.path) {
            Ok(()) => debug!(path = %self.path.display(), "work dir removed"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %self.path.display(), error = %e, "failed to remove work dir"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let path = {
            let dir = WorkDir::create(root.path(), "job-1").unwrap();
            std::fs::create_dir_all(dir.path().join("Package/Files")).unwrap();
            std::fs::write(dir.path().join("Package/Files/setup.msi"), b"x").unwrap();
            dir.path().to_path_buf()
        };
        assert!(!path.exists());
    }

    #[test]
    fn unsafe_job_ids_are_flattened() {
        let root = tempfile::tempdir().unwrap();
        let dir = WorkDir::create(root.path(), "../../etc").unwrap();
        assert_eq!(dir.path().parent(), Some(root.path()));
        let name = dir.path().file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("job-______etc-"), "{name}");
    }

    #[test]
    fn already_removed_is_fine() {
        let root = tempfile::tempdir().unwrap();
        let dir = WorkDir::create(root.path(), "job-1").unwrap();
        std::fs::remove_dir_all(dir.path()).unwrap();
        drop(dir);
    }
}
