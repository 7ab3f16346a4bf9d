use std::path::PathBuf;
use std::time::Duration;

/// Errors that can occur while building a sealed package.
#[derive(Debug, thiserror::Error)]
pub enum PackagingError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to start {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("content prep tool exited with {}: {stderr}", exit_label(*.code))]
    ToolFailed { code: Option<i32>, stderr: String },

    #[error("content prep tool did not finish within {0:?}")]
    Timeout(Duration),

    #[error("no .intunewin file produced in {}", .0.display())]
    NoOutput(PathBuf),

    #[error("expected one .intunewin file, found {}", .0.len())]
    AmbiguousOutput(Vec<PathBuf>),

    #[error("package archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("package metadata: {0}")]
    Metadata(String),

    #[error("background task failed: {0}")]
    Join(String),
}

fn exit_label(code: Option<i32>) -> String {
    match code {
        Some(code) => format!("code {code}"),
        None => "no exit code".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tool_failure_message_includes_code() {
        let err = PackagingError::ToolFailed {
            code: Some(3),
            stderr: "bad source folder".into(),
        };
        assert_eq!(
            err.to_string(),
            "content prep tool exited with code 3: bad source folder"
        );
    }

    #[test]
    fn signal_termination_has_no_code() {
        let err = PackagingError::ToolFailed {
            code: None,
            stderr: String::new(),
        };
        assert!(err.to_string().contains("no exit code"));
    }
}
