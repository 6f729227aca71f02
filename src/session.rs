//! Submission session: the top-level flow for one upload.
//!
//! An upload is split into units before anything is classified. Every
//! top-level archive is unpacked and forms its own unit; loose files and
//! folder drops together form one more. Each unit is then classified on its
//! own flat entry list and takes either the single-student or the batch
//! path. A batch unit must yield at least `min_students` bundles, and a
//! failure while extracting any student fails the whole preparation.

use crate::batch::BatchExtractor;
use crate::common::{StudentBundle, SubmissionKind, UploadedEntry};
use crate::config::PipelineConfig;
use crate::context::ExtractionContext;
use crate::error::{Result, StitchError};
use crate::language::{detect_language_deep, LanguageId};
use crate::stitch::{expand_nested, extract_multiple, extract_single};
use tracing::{debug, info};

/// One independently classified part of an upload.
#[derive(Debug, Clone)]
pub struct SubmissionUnit {
    /// The archive's file name, or the top-level name of the loose files.
    pub name: String,
    pub kind: SubmissionKind,
    pub entries: Vec<UploadedEntry>,
    /// `entries` are the contents of an uploaded archive.
    pub unpacked: bool,
}

pub struct SubmissionSession {
    ctx: ExtractionContext,
}

impl SubmissionSession {
    pub fn new(ctx: ExtractionContext) -> Self {
        Self { ctx }
    }

    pub fn context(&self) -> &ExtractionContext {
        &self.ctx
    }

    /// Classifies one flat entry list.
    pub fn classify(&self, entries: &[UploadedEntry]) -> SubmissionKind {
        SubmissionKind::classify(entries, self.ctx.config())
    }

    fn check_language(&self, id: LanguageId) -> Result<LanguageId> {
        if self.ctx.config().languages.contains(&id) {
            Ok(id)
        } else {
            Err(StitchError::UnknownLanguage(id.to_string()))
        }
    }

    /// The explicit language when it is in the table, otherwise detection.
    pub async fn resolve_language(
        &self,
        entries: &[UploadedEntry],
        language: Option<LanguageId>,
    ) -> Result<LanguageId> {
        match language {
            Some(id) => self.check_language(id),
            None => detect_language_deep(entries, &self.ctx).await,
        }
    }

    fn is_top_level_archive(&self, entry: &UploadedEntry) -> bool {
        !entry.is_directory()
            && !entry.path().contains('/')
            && self.ctx.config().is_archive(entry.path())
    }

    /// Unpacks every top-level archive and classifies each unit, keeping
    /// upload order. Loose entries are grouped where the first of them appears.
    pub async fn split(&self, entries: &[UploadedEntry]) -> Result<Vec<SubmissionUnit>> {
        let mut units: Vec<Option<SubmissionUnit>> = Vec::new();
        let mut loose_slot = None;
        let mut loose = Vec::new();

        for entry in entries {
            if self.is_top_level_archive(entry) {
                self.ctx.check_cancelled()?;
                let contents = self.ctx.codec().extract_files(entry).await?;
                let kind = self.classify(&contents);
                debug!(
                    archive = entry.path(),
                    %kind,
                    members = contents.len(),
                    "archive classified"
                );
                units.push(Some(SubmissionUnit {
                    name: entry.file_name().to_string(),
                    kind,
                    entries: contents,
                    unpacked: true,
                }));
            } else {
                if loose_slot.is_none() {
                    loose_slot = Some(units.len());
                    units.push(None);
                }
                loose.push(entry.clone());
            }
        }

        if let Some(slot) = loose_slot {
            let kind = self.classify(&loose);
            units[slot] = Some(SubmissionUnit {
                name: loose_name(&loose, kind, self.ctx.config()),
                kind,
                entries: loose,
                unpacked: false,
            });
        }
        Ok(units.into_iter().flatten().collect())
    }

    /// Turns an upload into student bundles.
    pub async fn prepare(
        &self,
        entries: &[UploadedEntry],
        language: Option<LanguageId>,
    ) -> Result<Vec<StudentBundle>> {
        let explicit = language.map(|id| self.check_language(id)).transpose()?;
        let units = self.split(entries).await?;
        if units.is_empty() {
            return Err(StitchError::NoStudentsFound);
        }
        let language = match explicit {
            Some(id) => id,
            None => {
                let sample: Vec<UploadedEntry> =
                    units.iter().flat_map(|u| u.entries.iter().cloned()).collect();
                detect_language_deep(&sample, &self.ctx).await?
            }
        };
        info!(units = units.len(), %language, entries = entries.len(), "preparing submission");

        let mut bundles = Vec::new();
        for unit in &units {
            match unit.kind {
                SubmissionKind::Single => {
                    bundles.push(self.prepare_single(unit, &language).await?)
                }
                SubmissionKind::Batch => {
                    bundles.extend(self.prepare_batch(&unit.entries, &language).await?)
                }
            }
        }
        if let Some(tracker) = self.ctx.progress() {
            tracker.force_completion();
        }
        info!(students = bundles.len(), "submission prepared");
        Ok(bundles)
    }

    async fn prepare_single(
        &self,
        unit: &SubmissionUnit,
        language: &LanguageId,
    ) -> Result<StudentBundle> {
        let text = if unit.unpacked {
            let expanded = expand_nested(unit.entries.clone(), 1, &self.ctx).await?;
            extract_single(&expanded, language, &self.ctx).await?
        } else {
            let config = self.ctx.config();
            let archives: Vec<UploadedEntry> = unit
                .entries
                .iter()
                .filter(|e| !e.is_directory() && config.is_archive(e.path()))
                .cloned()
                .collect();
            let mut text = extract_single(&unit.entries, language, &self.ctx).await?;
            text.push_str(&extract_multiple(&archives, language, &self.ctx).await?);
            text
        };
        info!(student = %unit.name, bytes = text.len(), "single submission extracted");
        Ok(StudentBundle::new(unit.name.clone(), text))
    }

    async fn prepare_batch(
        &self,
        entries: &[UploadedEntry],
        language: &LanguageId,
    ) -> Result<Vec<StudentBundle>> {
        let mut extractor = BatchExtractor::new(entries, language.clone(), &self.ctx);
        let mut bundles = Vec::with_capacity(extractor.remaining());
        while let Some(bundle) = extractor.next_bundle().await {
            bundles.push(bundle?);
        }

        let required = self.ctx.config().min_students;
        match bundles.len() {
            0 => Err(StitchError::NoStudentsFound),
            found if found < required => Err(StitchError::TooFewStudents { found, required }),
            _ => Ok(bundles),
        }
    }
}

/// Name of loose files: the top-level name of the first file. A single
/// student who included archives is named after the first of them.
fn loose_name(entries: &[UploadedEntry], kind: SubmissionKind, config: &PipelineConfig) -> String {
    let mut files = entries.iter().filter(|e| !e.is_directory());
    if kind == SubmissionKind::Single {
        if let Some(archive) = files.clone().find(|e| config.is_archive(e.path())) {
            return archive.file_name().to_string();
        }
    }
    files
        .find_map(|e| e.path().split('/').find(|s| !s.is_empty()))
        .unwrap_or("submission")
        .to_string()
}
