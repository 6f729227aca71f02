use std::path::PathBuf;

use thiserror::Error;

/// The primary error type for all operations in the `batchstitch` crate.
#[derive(Debug, Error)]
pub enum StitchError {
    /// An I/O error occurred, typically while reading an uploaded file.
    /// Includes the path where the error happened.
    #[error("I/O error on path '{}': {source}", .path.display())]
    Io { source: std::io::Error, path: PathBuf },

    /// The container format of an archive could not be recognized, or no codec for it is loaded.
    #[error("Unsupported archive format for '{path}': {detail}")]
    UnsupportedFormat { path: String, detail: String },

    /// The container was recognized but its entries could not be enumerated or read.
    #[error("Archive '{path}' is corrupt: {detail}")]
    ArchiveCorrupt { path: String, detail: String },

    /// Batch extraction produced no student bundles at all.
    #[error("No students were found in the uploaded files")]
    NoStudentsFound,

    /// Batch extraction produced fewer students than a job requires.
    #[error("A batch must include at least {required} students (found {found})")]
    TooFewStudents { found: usize, required: usize },

    /// A language code that is not present in the configured language table.
    #[error("Unknown language '{0}'")]
    UnknownLanguage(String),

    /// The pipeline configuration is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// An error during deserialization of a configuration file.
    #[error("Serialization error: {0}")]
    SerdeJson(#[from] serde_json::Error),

    /// The caller raised the cancel flag between two files.
    #[error("Extraction was cancelled")]
    Cancelled,

    /// A blocking decode task panicked or was aborted.
    #[error("Background decode task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

impl StitchError {
    pub fn io(source: std::io::Error, path: impl Into<PathBuf>) -> Self {
        StitchError::Io { source, path: path.into() }
    }

    pub(crate) fn corrupt(path: &str, detail: impl ToString) -> Self {
        StitchError::ArchiveCorrupt { path: path.to_string(), detail: detail.to_string() }
    }

    pub(crate) fn unsupported(path: &str, detail: impl ToString) -> Self {
        StitchError::UnsupportedFormat { path: path.to_string(), detail: detail.to_string() }
    }
}

// Generic IO error conversion that doesn't require a path
impl From<std::io::Error> for StitchError {
    fn from(err: std::io::Error) -> Self {
        StitchError::Io { source: err, path: PathBuf::new() }
    }
}

pub type Result<T> = std::result::Result<T, StitchError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_mentions_path() {
        let err = StitchError::io(
            std::io::Error::new(std::io::ErrorKind::NotFound, "gone"),
            "batch/alice.zip",
        );
        let msg = err.to_string();
        assert!(msg.contains("batch/alice.zip"), "{msg}");
        assert!(msg.contains("gone"), "{msg}");
    }

    #[test]
    fn too_few_students_message() {
        let err = StitchError::TooFewStudents { found: 1, required: 2 };
        assert_eq!(err.to_string(), "A batch must include at least 2 students (found 1)");
    }
}
