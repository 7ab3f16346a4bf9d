//! Wire types shared by the intunepack agent crates.
//!
//! Covers the job record handed out by the control plane, its typed
//! detection and assignment descriptors, and the status/progress payloads
//! pushed back.

pub mod assignment;
pub mod job;
pub mod messages;
pub mod rules;
pub mod types;

pub use assignment::{Assignment, AssignmentFilter, AssignmentIntent, AssignmentTarget, FilterMode};
pub use job::{Job, JobValidationError};
pub use messages::{GraphToken, JobStatus, ProgressUpdate, StatusUpdate};
pub use rules::{DetectionRule, FileDetectionType, RegistryDetectionType, RuleOperator};
pub use types::{Architecture, CategoryRef, InstallScope, InstallerType, MigrationDirective};
