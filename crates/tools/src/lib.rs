//! Filesystem and download helpers, and provisioning of the external
//! packaging tools.
//!
//! The agent needs two things on disk before it can package anything: the
//! content-prep executable and the deployment toolkit template tree. The
//! [`ToolProvisioner`] fetches whichever is missing.

mod archive;
mod copy;
mod download;
mod error;
mod provision;

pub use archive::extract_zip;
pub use copy::copy_dir_recursive;
pub use download::download_file;
pub use error::{ArchiveError, DownloadError, ToolProvisioningError};
pub use provision::{
    CONTENT_PREP_EXE, TOOLKIT_DIR, TOOLKIT_ENTRY_EXE, ToolPaths, ToolProvisioner, ToolSources,
    ToolStatus,
};
