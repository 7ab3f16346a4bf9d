//! Turns a job and its downloaded installer into a sealed `.intunewin`.
//!
//! [`generate_script`] renders the toolkit entry script, and
//! [`PackageAssembler`] lays out the package tree, runs the content-prep
//! tool and reads the encryption metadata back out of the artifact.

pub mod assembler;
mod error;
pub mod metadata;
pub mod script;

pub use assembler::{PackageAssembler, PackagingResult};
pub use error::PackagingError;
pub use metadata::{EncryptionInfo, PackageMetadata};
pub use script::{escape_ps, extract_switches, generate_script, sanitize_package_id};
