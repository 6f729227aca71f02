//! Per-submission extraction context.
//!
//! Bundles what every pipeline stage needs for one submission attempt:
//! the read-only configuration, the archive codec, an optional cancel flag
//! and an optional progress tracker. Cloning is cheap; clones share state.

use crate::codec::ArchiveCodec;
use crate::config::PipelineConfig;
use crate::error::{Result, StitchError};
use crate::progress::ProgressTracker;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Cooperative cancellation, checked between files and never mid-read.
#[derive(Debug, Clone, Default)]
pub struct CancelFlag(Arc<AtomicBool>);

impl CancelFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

#[derive(Clone)]
pub struct ExtractionContext {
    config: Arc<PipelineConfig>,
    codec: Arc<ArchiveCodec>,
    cancel: Option<CancelFlag>,
    progress: Option<Arc<ProgressTracker>>,
}

impl ExtractionContext {
    pub fn new(config: Arc<PipelineConfig>, codec: Arc<ArchiveCodec>) -> Self {
        Self { config, codec, cancel: None, progress: None }
    }

    /// Context over the default configuration and the process-wide codec.
    pub fn with_defaults() -> Self {
        Self::new(Arc::new(PipelineConfig::default()), ArchiveCodec::shared())
    }

    pub fn with_cancel(mut self, flag: CancelFlag) -> Self {
        self.cancel = Some(flag);
        self
    }

    pub fn with_progress(mut self, tracker: Arc<ProgressTracker>) -> Self {
        self.progress = Some(tracker);
        self
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn codec(&self) -> &ArchiveCodec {
        &self.codec
    }

    /// The attached tracker, if one is attached and enabled.
    pub fn progress(&self) -> Option<&ProgressTracker> {
        self.progress.as_deref().filter(|tracker| tracker.is_enabled())
    }

    pub fn check_cancelled(&self) -> Result<()> {
        match &self.cancel {
            Some(flag) if flag.is_cancelled() => Err(StitchError::Cancelled),
            _ => Ok(()),
        }
    }
}
