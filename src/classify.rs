//! Name-based classification: archives, source files, hidden files, and the
//! single-vs-batch heuristic.
//!
//! Everything here is a pure predicate over path strings. Matching is
//! case-sensitive and suffix-based, so `tar.gz` is checked as the literal
//! suffix `.tar.gz` rather than by splitting on the last dot.

use crate::common::{SubmissionKind, UploadedEntry};
use crate::config::PipelineConfig;
use crate::language::LanguageId;
use tracing::debug;

/// True iff `name` ends with `"." + ext` for some `ext` in `extensions`.
pub fn has_extension<S: AsRef<str>>(name: &str, extensions: &[S]) -> bool {
    extensions.iter().any(|ext| {
        let ext = ext.as_ref();
        name.len() > ext.len()
            && name.ends_with(ext)
            && name.as_bytes()[name.len() - ext.len() - 1] == b'.'
    })
}

pub fn is_archive(name: &str, config: &PipelineConfig) -> bool {
    config.is_archive(name)
}

/// Source check against one language, or against every language when `language` is `None`.
pub fn is_source(name: &str, language: Option<&LanguageId>, config: &PipelineConfig) -> bool {
    config.is_source(name, language)
}

/// Dot-files, anything inside a dot-folder, and macOS resource forks.
pub fn is_hidden(path: &str) -> bool {
    path.starts_with('.')
        || path.contains("/.")
        || path.starts_with("__MACOSX/")
        || path.contains("/__MACOSX/")
}

/// Heuristic: more recognized source files than archives means one student.
///
/// Equal counts take the batch path. A student who bundles more archives
/// than loose files is misclassified; callers treat the answer as a best
/// guess, never as an error.
pub fn is_single_submission(entries: &[UploadedEntry], config: &PipelineConfig) -> bool {
    let mut sources = 0usize;
    let mut archives = 0usize;
    for entry in entries.iter().filter(|e| !e.is_directory()) {
        if config.is_source(entry.path(), None) {
            sources += 1;
        }
        if config.is_archive(entry.path()) {
            archives += 1;
        }
    }
    debug!(sources, archives, "classifying submission");
    sources > archives
}

impl SubmissionKind {
    pub fn classify(entries: &[UploadedEntry], config: &PipelineConfig) -> Self {
        if is_single_submission(entries, config) {
            SubmissionKind::Single
        } else {
            SubmissionKind::Batch
        }
    }
}
