//! # batchstitch
//!
//! Turns an unstructured upload of student work into one stitched text
//! buffer per student, ready for a code similarity checker.
//!
//! An upload is a flat list of [`UploadedEntry`]s: archives (zip, tar,
//! tar.gz, tar.xz), loose source files, or both. The pipeline decides whether
//! it is a single submission or a batch, infers student boundaries from the
//! folder layout, unpacks nested archives and concatenates the source files
//! of the chosen language.
//!
//! ## Key Modules
//!
//! - [`classify`]: Extension matching and the single/batch heuristic.
//! - [`codec`]: Archive decoding behind a one-time format gate.
//! - [`root`]: Finds the folder that divides students in a batch.
//! - [`stitch`]: Concatenates one student's sources.
//! - [`batch`]: Groups a batch by student and extracts them one at a time.
//! - [`language`]: The language table and detection.
//! - [`session`]: The top-level flow for one submission.
//!
//! ## Examples
//!
//! ```no_run
//! use batchstitch::{collect_entries, ExtractionContext, SubmissionSession};
//! use std::path::PathBuf;
//!
//! # async fn run() -> batchstitch::Result<()> {
//! let entries = collect_entries(&[PathBuf::from("assignment1")])?;
//! let session = SubmissionSession::new(ExtractionContext::with_defaults());
//! for bundle in session.prepare(&entries, None).await? {
//!     println!("{}: {} bytes", bundle.student_key, bundle.stitched_text.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod classify;
pub mod cli;
pub mod cli_runner;
pub mod codec;
pub mod common;
pub mod config;
pub mod context;
pub mod error;
pub mod input;
pub mod language;
pub mod progress;
pub mod root;
pub mod session;
pub mod stitch;
pub mod upload;

pub use batch::{extract_batch, BatchExtractor};
pub use codec::ArchiveCodec;
pub use common::{StudentBundle, SubmissionKind, UploadedEntry};
pub use config::PipelineConfig;
pub use context::{CancelFlag, ExtractionContext};
pub use error::{Result, StitchError};
pub use input::collect_entries;
pub use language::{LanguageId, LanguageTable};
pub use session::SubmissionSession;
