//! Common types shared by every pipeline stage.

use crate::error::{Result, StitchError};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{Cursor, Read};
use std::path::PathBuf;
use std::sync::Arc;

/// A parsed zip archive over shared bytes. Clones share the central directory.
pub(crate) type SharedZip = zip::ZipArchive<Cursor<Arc<[u8]>>>;

/// Upper bound on buffer pre-allocation from sizes claimed by archive headers.
const MAX_PREALLOC: u64 = 8 * 1024 * 1024;

/// Initial capacity for a member whose header claims `claimed` bytes.
pub(crate) fn prealloc(claimed: u64) -> usize {
    claimed.min(MAX_PREALLOC) as usize
}

/// Where the bytes of an entry live until somebody asks for them.
#[derive(Clone)]
enum EntrySource {
    /// Already decoded, e.g. a tar member or an in-memory upload.
    Memory(Arc<[u8]>),
    /// A file on the local disk, read on demand.
    File(PathBuf),
    /// A member of a zip archive; inflated only when read.
    ZipMember { archive: SharedZip, index: usize },
    #[cfg(test)]
    Delayed { bytes: Arc<[u8]>, delay: std::time::Duration },
}

/// A single file handed to the pipeline, either straight from the upload or
/// produced by unpacking an archive.
///
/// `path` uses `/` separators. Top-level uploads usually carry no separator;
/// archive members and folder drops can be nested arbitrarily. Entries are
/// immutable and cheap to clone: the content is shared.
#[derive(Clone)]
pub struct UploadedEntry {
    path: String,
    is_directory: bool,
    source: EntrySource,
}

impl UploadedEntry {
    /// An entry backed by bytes already in memory.
    pub fn from_bytes(path: impl Into<String>, bytes: impl Into<Arc<[u8]>>) -> Self {
        Self { path: path.into(), is_directory: false, source: EntrySource::Memory(bytes.into()) }
    }

    /// An entry whose content is read from `location` on first access.
    pub fn from_file(path: impl Into<String>, location: impl Into<PathBuf>) -> Self {
        Self { path: path.into(), is_directory: false, source: EntrySource::File(location.into()) }
    }

    /// A directory marker. Codecs never emit these; they exist so callers can
    /// hand raw listings to the pipeline unchanged.
    pub fn directory(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            is_directory: true,
            source: EntrySource::Memory(Arc::from(Vec::new())),
        }
    }

    pub(crate) fn zip_member(path: impl Into<String>, archive: SharedZip, index: usize) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            source: EntrySource::ZipMember { archive, index },
        }
    }

    #[cfg(test)]
    pub(crate) fn delayed(
        path: impl Into<String>,
        bytes: &[u8],
        delay: std::time::Duration,
    ) -> Self {
        Self {
            path: path.into(),
            is_directory: false,
            source: EntrySource::Delayed { bytes: Arc::from(bytes), delay },
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn is_directory(&self) -> bool {
        self.is_directory
    }

    /// The last path component.
    pub fn file_name(&self) -> &str {
        match self.path.rfind('/') {
            Some(i) => &self.path[i + 1..],
            None => &self.path,
        }
    }

    /// Everything before the last `/`, or `""` for a bare file name.
    pub fn parent_path(&self) -> &str {
        match self.path.rfind('/') {
            Some(i) => &self.path[..i],
            None => "",
        }
    }

    /// The same content under `prefix` + the current path.
    pub fn with_prefix(&self, prefix: &str) -> Self {
        Self { path: format!("{}{}", prefix, self.path), ..self.clone() }
    }

    /// Reads the full content of the entry.
    pub async fn read_bytes(&self) -> Result<Vec<u8>> {
        match &self.source {
            EntrySource::Memory(bytes) => Ok(bytes.to_vec()),
            EntrySource::File(location) => tokio::fs::read(location)
                .await
                .map_err(|e| StitchError::io(e, location.clone())),
            EntrySource::ZipMember { archive, index } => {
                let archive = archive.clone();
                let index = *index;
                let path = self.path.clone();
                tokio::task::spawn_blocking(move || read_zip_member(archive, index, &path))
                    .await?
            }
            #[cfg(test)]
            EntrySource::Delayed { bytes, delay } => {
                tokio::time::sleep(*delay).await;
                Ok(bytes.to_vec())
            }
        }
    }
}

fn read_zip_member(mut zip: SharedZip, index: usize, path: &str) -> Result<Vec<u8>> {
    let mut member = zip.by_index(index).map_err(|e| StitchError::corrupt(path, e))?;
    let mut out = Vec::with_capacity(prealloc(member.size()));
    member.read_to_end(&mut out).map_err(|e| StitchError::corrupt(path, e))?;
    Ok(out)
}

impl fmt::Debug for UploadedEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.source {
            EntrySource::Memory(b) => format!("memory({} bytes)", b.len()),
            EntrySource::File(p) => format!("file({})", p.display()),
            EntrySource::ZipMember { index, .. } => format!("zip-member(#{})", index),
            #[cfg(test)]
            EntrySource::Delayed { delay, .. } => format!("delayed({:?})", delay),
        };
        f.debug_struct("UploadedEntry")
            .field("path", &self.path)
            .field("is_directory", &self.is_directory)
            .field("source", &source)
            .finish()
    }
}

/// Terminal output of the pipeline: one stitched text buffer per student.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct StudentBundle {
    /// Inferred folder name, or the archive's own name when there is no folder.
    pub student_key: String,
    pub stitched_text: String,
}

impl StudentBundle {
    pub fn new(student_key: impl Into<String>, stitched_text: impl Into<String>) -> Self {
        Self { student_key: student_key.into(), stitched_text: stitched_text.into() }
    }
}

/// Whether an upload holds one student's work or many.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmissionKind {
    Single,
    Batch,
}

impl fmt::Display for SubmissionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubmissionKind::Single => write!(f, "single"),
            SubmissionKind::Batch => write!(f, "batch"),
        }
    }
}
