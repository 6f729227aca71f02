//! # Batch extraction
//!
//! Splits a batch upload into students and stitches each of them.
//!
//! The following assumptions are made about a batch:
//! - One root folder divides all students (see [`crate::root`]).
//! - Students submit archives; once an archive is found, its folder is terminal.
//! - Loose files at batch level belong to nobody and are ignored.
//!
//! Grouping is by adjacency, not a full group-by: a student's archives must be
//! contiguous in the input. `alice, bob, alice` produces three bundles, two of
//! them for `alice`.
//!
//! Extraction is strictly sequential. One student is unpacked and stitched
//! before the next one starts, which bounds memory to a single student.

use crate::common::{StudentBundle, UploadedEntry};
use crate::context::ExtractionContext;
use crate::error::Result;
use crate::language::LanguageId;
use crate::progress::BatchProgress;
use crate::root::{get_root_index, strip_root};
use crate::stitch::extract_multiple;
use std::vec::IntoIter;
use tracing::{debug, info};

/// A student's archives, before anything has been unpacked.
#[derive(Debug, Clone)]
pub struct StudentGroup {
    pub student_key: String,
    pub archives: Vec<UploadedEntry>,
}

/// Folder segment that identifies the student owning `path`.
///
/// After stripping the root this is everything up to the first `/`, or the
/// whole remainder when the archive sits directly in the root. An empty
/// remainder falls back to the archive's file name.
pub fn student_key(path: &str, root: Option<usize>) -> String {
    let relative = strip_root(path, root);
    let key = match relative.find('/') {
        Some(i) => &relative[..i],
        None => relative,
    };
    if key.is_empty() {
        path.rsplit('/').next().unwrap_or(path).to_string()
    } else {
        key.to_string()
    }
}

/// Groups consecutive archives that share a student key.
pub fn group_students(entries: &[UploadedEntry], ctx: &ExtractionContext) -> Vec<StudentGroup> {
    let config = ctx.config();
    let root = get_root_index(entries, config);
    let mut groups: Vec<StudentGroup> = Vec::new();

    for entry in entries.iter().filter(|e| !e.is_directory() && config.is_archive(e.path())) {
        let key = student_key(entry.path(), root);
        match groups.last_mut() {
            Some(current) if current.student_key == key => current.archives.push(entry.clone()),
            _ => {
                debug!(student = %key, "student boundary");
                groups.push(StudentGroup { student_key: key, archives: vec![entry.clone()] });
            }
        }
    }
    groups
}

/// Lazy sequence of [`StudentBundle`]s over one batch.
///
/// Nothing is unpacked until [`next_bundle`](Self::next_bundle) is awaited,
/// and each call unpacks exactly one student.
pub struct BatchExtractor {
    ctx: ExtractionContext,
    language: LanguageId,
    groups: IntoIter<StudentGroup>,
    progress: BatchProgress,
    failed: bool,
}

impl BatchExtractor {
    pub fn new(entries: &[UploadedEntry], language: LanguageId, ctx: &ExtractionContext) -> Self {
        let groups = group_students(entries, ctx);
        let total_archives = groups.iter().map(|g| g.archives.len()).sum();
        if let Some(tracker) = ctx.progress() {
            tracker.set_total_archives(total_archives as u64);
        }
        Self {
            ctx: ctx.clone(),
            language,
            groups: groups.into_iter(),
            progress: BatchProgress { total_archives, ..BatchProgress::default() },
            failed: false,
        }
    }

    /// Students not yet extracted.
    pub fn remaining(&self) -> usize {
        self.groups.len()
    }

    pub fn progress(&self) -> BatchProgress {
        self.progress
    }

    /// Unpacks and stitches the next student.
    ///
    /// Returns `None` once every student has been emitted, or after an error
    /// has been returned.
    pub async fn next_bundle(&mut self) -> Option<Result<StudentBundle>> {
        if self.failed {
            return None;
        }
        let group = self.groups.next()?;
        if let Err(e) = self.ctx.check_cancelled() {
            self.failed = true;
            return Some(Err(e));
        }

        match extract_multiple(&group.archives, &self.language, &self.ctx).await {
            Ok(text) => {
                self.progress.archives_processed += group.archives.len();
                self.progress.students_emitted += 1;
                if let Some(tracker) = self.ctx.progress() {
                    tracker.record_student(group.archives.len() as u64);
                }
                info!(
                    student = %group.student_key,
                    archives = group.archives.len(),
                    bytes = text.len(),
                    "student extracted"
                );
                Some(Ok(StudentBundle::new(group.student_key, text)))
            }
            Err(e) => {
                self.failed = true;
                Some(Err(e))
            }
        }
    }
}

/// Callback form of the batch extractor: `on_student_extracted` is invoked
/// once per student, in input order. Returns the number of students emitted.
///
/// With zero archives the callback is never invoked; deciding whether that is
/// an error is up to the caller.
pub async fn extract_batch<F>(
    entries: &[UploadedEntry],
    language: &LanguageId,
    ctx: &ExtractionContext,
    mut on_student_extracted: F,
) -> Result<usize>
where
    F: FnMut(&str, String),
{
    let mut extractor = BatchExtractor::new(entries, language.clone(), ctx);
    let mut emitted = 0;
    while let Some(bundle) = extractor.next_bundle().await {
        let bundle = bundle?;
        on_student_extracted(&bundle.student_key, bundle.stitched_text);
        emitted += 1;
    }
    Ok(emitted)
}
