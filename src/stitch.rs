//! # Stitching
//!
//! Concatenates a student's source files into one text buffer. Every file
//! contributes a header line, its content decoded as (lossy) UTF-8, and a
//! blank line:
//!
//! ```text
//! >>> alice/main.py <<<
//! print("hello")
//!
//! ```
//!
//! Output order always follows input order, even when reads run concurrently.

use crate::common::UploadedEntry;
use crate::context::ExtractionContext;
use crate::error::{Result, StitchError};
use crate::language::LanguageId;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{debug, warn};

fn append_file(buffer: &mut String, path: &str, content: &[u8]) {
    buffer.push_str(">>> ");
    buffer.push_str(path);
    buffer.push_str(" <<<\n");
    buffer.push_str(&String::from_utf8_lossy(content));
    buffer.push_str("\n\n");
}

/// Stitches every entry that is a source file of `language`, in input order.
///
/// Directories, and hidden files when `skip_hidden` is set, are left out.
/// Archives are not unpacked here; see [`extract_multiple`].
pub async fn extract_single(
    entries: &[UploadedEntry],
    language: &LanguageId,
    ctx: &ExtractionContext,
) -> Result<String> {
    let config = ctx.config();
    let selected: Vec<&UploadedEntry> = entries
        .iter()
        .filter(|e| !e.is_directory())
        .filter(|e| !(config.skip_hidden && crate::classify::is_hidden(e.path())))
        .filter(|e| config.is_source(e.path(), Some(language)))
        .collect();
    debug!(total = entries.len(), selected = selected.len(), %language, "stitching files");

    let mut buffer = String::new();
    if config.read_concurrency <= 1 || selected.len() <= 1 {
        for entry in selected {
            ctx.check_cancelled()?;
            let content = entry.read_bytes().await?;
            append_file(&mut buffer, entry.path(), &content);
        }
        return Ok(buffer);
    }

    ctx.check_cancelled()?;
    let permits = Arc::new(Semaphore::new(config.read_concurrency));
    let mut reads = Vec::with_capacity(selected.len());
    for entry in &selected {
        let entry = (*entry).clone();
        let permits = Arc::clone(&permits);
        reads.push(tokio::spawn(async move {
            let _permit = permits.acquire_owned().await.ok();
            entry.read_bytes().await
        }));
    }

    for i in 0..reads.len() {
        if let Err(e) = ctx.check_cancelled() {
            reads[i..].iter().for_each(|r| r.abort());
            return Err(e);
        }
        let content = match (&mut reads[i]).await {
            Ok(Ok(content)) => content,
            Ok(Err(e)) => {
                reads[i + 1..].iter().for_each(|r| r.abort());
                return Err(e);
            }
            Err(e) => {
                reads[i + 1..].iter().for_each(|r| r.abort());
                return Err(e.into());
            }
        };
        append_file(&mut buffer, selected[i].path(), &content);
    }
    Ok(buffer)
}

type Expansion<'a> = Pin<Box<dyn Future<Output = Result<Vec<UploadedEntry>>> + Send + 'a>>;

/// Replaces archives in `entries` by their contents, recursively, while fewer
/// than `max_nesting_depth` layers have been opened.
///
/// Nested members are renamed to `{archive path}/{member path}` so their
/// headers stay unique. A nested archive whose format has no codec is logged
/// and skipped; any other failure propagates.
pub fn expand_nested<'a>(
    entries: Vec<UploadedEntry>,
    depth: usize,
    ctx: &'a ExtractionContext,
) -> Expansion<'a> {
    Box::pin(async move {
        let config = ctx.config();
        let mut expanded = Vec::with_capacity(entries.len());
        for entry in entries {
            let openable = !entry.is_directory()
                && config.is_archive(entry.path())
                && depth < config.max_nesting_depth
                && !(config.skip_hidden && crate::classify::is_hidden(entry.path()));
            if !openable {
                expanded.push(entry);
                continue;
            }
            ctx.check_cancelled()?;
            let contents = match ctx.codec().extract_files(&entry).await {
                Ok(contents) => contents,
                Err(StitchError::UnsupportedFormat { path, detail }) => {
                    warn!(archive = %path, %detail, "skipping nested archive");
                    continue;
                }
                Err(e) => return Err(e),
            };
            let prefix = format!("{}/", entry.path());
            let renamed = contents.iter().map(|c| c.with_prefix(&prefix)).collect();
            expanded.extend(expand_nested(renamed, depth + 1, ctx).await?);
        }
        Ok(expanded)
    })
}

/// Unpacks each archive of one student, in order, and stitches the results
/// into a single buffer. Archives nested inside them are opened as well.
pub async fn extract_multiple(
    archives: &[UploadedEntry],
    language: &LanguageId,
    ctx: &ExtractionContext,
) -> Result<String> {
    let mut buffer = String::new();
    for archive in archives {
        ctx.check_cancelled()?;
        let contents = ctx.codec().extract_files(archive).await?;
        let contents = expand_nested(contents, 1, ctx).await?;
        buffer.push_str(&extract_single(&contents, language, ctx).await?);
    }
    Ok(buffer)
}
