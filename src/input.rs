//! Turns local paths into upload entries.
//!
//! Files become top-level entries named after themselves. Directories are
//! walked and each file inside is named `{dir name}/{relative path}`, which is
//! how a browser reports the files of a dropped folder. Content stays on disk
//! until read.

use crate::common::UploadedEntry;
use crate::error::{Result, StitchError};
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

pub fn collect_entries(inputs: &[PathBuf]) -> Result<Vec<UploadedEntry>> {
    let mut entries = Vec::new();
    for input in inputs {
        if input.is_file() {
            entries.push(UploadedEntry::from_file(display_name(input), input.clone()));
        } else if input.is_dir() {
            collect_dir(input, &mut entries)?;
        } else {
            let missing = io::Error::new(io::ErrorKind::NotFound, "no such file or directory");
            return Err(StitchError::io(missing, input));
        }
    }
    debug!(inputs = inputs.len(), entries = entries.len(), "collected upload entries");
    Ok(entries)
}

fn collect_dir(dir: &Path, entries: &mut Vec<UploadedEntry>) -> Result<()> {
    let root = display_name(dir);
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| StitchError::io(io::Error::from(e), dir))?;
        if !entry.file_type().is_file() {
            continue;
        }
        let relative = entry.path().strip_prefix(dir).unwrap_or(entry.path());
        let relative: Vec<String> =
            relative.components().map(|c| c.as_os_str().to_string_lossy().into_owned()).collect();
        let name = if root.is_empty() {
            relative.join("/")
        } else {
            format!("{}/{}", root, relative.join("/"))
        };
        entries.push(UploadedEntry::from_file(name, entry.path()));
    }
    Ok(())
}

fn display_name(path: &Path) -> String {
    path.file_name().map(|n| n.to_string_lossy().into_owned()).unwrap_or_default()
}
