use std::fmt;

use intunepack_graph::BoxFuture;

/// Upload pipeline stages, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum UploadStage {
    CreateApp,
    CreateContentVersion,
    CreateContentFile,
    AwaitStorageUri,
    UploadChunks,
    CommitFile,
    AwaitProcessing,
    CommitVersion,
    AddRules,
    ApplyAssignments,
    ApplyCategories,
}

impl UploadStage {
    pub const ALL: [Self; 11] = [
        Self::CreateApp,
        Self::CreateContentVersion,
        Self::CreateContentFile,
        Self::AwaitStorageUri,
        Self::UploadChunks,
        Self::CommitFile,
        Self::AwaitProcessing,
        Self::CommitVersion,
        Self::AddRules,
        Self::ApplyAssignments,
        Self::ApplyCategories,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::CreateApp => "create-app",
            Self::CreateContentVersion => "create-content-version",
            Self::CreateContentFile => "create-content-file",
            Self::AwaitStorageUri => "await-storage-uri",
            Self::UploadChunks => "upload-chunks",
            Self::CommitFile => "commit-file",
            Self::AwaitProcessing => "await-processing",
            Self::CommitVersion => "commit-version",
            Self::AddRules => "add-rules",
            Self::ApplyAssignments => "apply-assignments",
            Self::ApplyCategories => "apply-categories",
        }
    }

    /// Progress percentage reported when the stage starts.
    pub fn checkpoint(self) -> u8 {
        match self {
            Self::CreateApp => 5,
            Self::CreateContentVersion => 10,
            Self::CreateContentFile => 15,
            Self::AwaitStorageUri => 20,
            Self::UploadChunks => 25,
            Self::CommitFile => 85,
            Self::AwaitProcessing => 90,
            Self::CommitVersion => 95,
            Self::AddRules => 98,
            Self::ApplyAssignments | Self::ApplyCategories => 99,
        }
    }

    /// Human-readable progress message.
    pub fn message(self) -> &'static str {
        match self {
            Self::CreateApp => "Creating app",
            Self::CreateContentVersion => "Creating content version",
            Self::CreateContentFile => "Registering content file",
            Self::AwaitStorageUri => "Waiting for storage location",
            Self::UploadChunks => "Uploading package",
            Self::CommitFile => "Committing file",
            Self::AwaitProcessing => "Waiting for file processing",
            Self::CommitVersion => "Committing content version",
            Self::AddRules => "Adding detection rules",
            Self::ApplyAssignments => "Applying assignments",
            Self::ApplyCategories => "Applying categories",
        }
    }
}

impl fmt::Display for UploadStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Last percentage of the chunk upload range.
pub(crate) const CHUNKS_END: u8 = 80;

/// Percentage for `done` of `total` blocks uploaded.
pub(crate) fn chunk_progress(done: usize, total: usize) -> u8 {
    let start = UploadStage::UploadChunks.checkpoint();
    if total == 0 {
        return CHUNKS_END;
    }
    let span = (CHUNKS_END - start) as usize;
    start + (span * done.min(total) / total) as u8
}

/// Receives stage transitions and progress from an upload.
pub trait UploadObserver: Send + Sync {
    fn on_stage(&self, stage: UploadStage) -> BoxFuture<'_, ()>;

    fn on_progress<'a>(&'a self, percent: u8, message: &'a str) -> BoxFuture<'a, ()>;
}

/// Observer that discards everything.
pub struct NoopObserver;

impl UploadObserver for NoopObserver {
    fn on_stage(&self, _stage: UploadStage) -> BoxFuture<'_, ()> {
        Box::pin(async {})
    }

    fn on_progress<'a>(&'a self, _percent: u8, _message: &'a str) -> BoxFuture<'a, ()> {
        Box::pin(async {})
    }
}
