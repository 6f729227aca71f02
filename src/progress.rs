//! Progress tracking for batch extraction.
//!
//! Extraction runs one student at a time, so progress is counted in archives
//! processed against the archives the batch holds, plus the number of student
//! bundles emitted so far.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

/// Snapshot of a running batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchProgress {
    pub archives_processed: usize,
    pub total_archives: usize,
    pub students_emitted: usize,
}

impl BatchProgress {
    pub fn fraction(&self) -> f32 {
        if self.total_archives == 0 {
            return 0.0;
        }
        (self.archives_processed as f32 / self.total_archives as f32).min(1.0)
    }
}

/// Current progress state as delivered to callbacks.
#[derive(Debug, Clone)]
pub struct ProgressState {
    pub total_archives: u64,
    pub processed_archives: u64,
    pub students_emitted: u64,
    pub elapsed_time: Duration,
    pub progress_percent: f32,
}

impl ProgressState {
    /// Estimated time remaining, extrapolated from the archive rate so far.
    pub fn estimated_time_remaining(&self) -> Duration {
        if self.processed_archives == 0 || self.progress_percent <= 0.0 {
            return Duration::from_secs(0);
        }
        let per_archive = self.elapsed_time.as_secs_f32() / self.processed_archives as f32;
        let remaining = self.total_archives.saturating_sub(self.processed_archives) as f32;
        Duration::from_secs_f32((per_archive * remaining).max(0.0))
    }
}

/// Progress callback function type
pub type ProgressCallback = dyn Fn(ProgressState) + Send + Sync;

/// Aggregates progress for one submission and forwards it to a callback.
pub struct ProgressTracker {
    /// Whether progress tracking is enabled
    enabled: bool,
    total_archives: AtomicU64,
    processed_archives: AtomicU64,
    students_emitted: AtomicUsize,
    start_time: Instant,
    last_emit_time: Mutex<Instant>,
    emit_interval: Duration,
    callback: Option<Arc<ProgressCallback>>,
}

impl ProgressTracker {
    pub fn new(emit_interval: Duration) -> Self {
        Self {
            enabled: false,
            total_archives: AtomicU64::new(0),
            processed_archives: AtomicU64::new(0),
            students_emitted: AtomicUsize::new(0),
            start_time: Instant::now(),
            last_emit_time: Mutex::new(Instant::now()),
            emit_interval,
            callback: None,
        }
    }

    /// Enable progress tracking with a callback
    pub fn enable_with_callback<F>(&mut self, callback: F)
    where
        F: Fn(ProgressState) + Send + Sync + 'static,
    {
        self.enabled = true;
        self.callback = Some(Arc::new(callback));
        self.start_time = Instant::now();
        if let Ok(mut last) = self.last_emit_time.lock() {
            *last = Instant::now();
        }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn set_total_archives(&self, total: u64) {
        if !self.enabled {
            return;
        }
        self.total_archives.store(total, Ordering::Relaxed);
    }

    /// Records one flushed student and the archives it consumed.
    pub fn record_student(&self, archives: u64) {
        if !self.enabled {
            return;
        }
        self.processed_archives.fetch_add(archives, Ordering::Relaxed);
        self.students_emitted.fetch_add(1, Ordering::Relaxed);
        self.maybe_emit_progress();
    }

    /// Force emit progress update
    pub fn emit_progress(&self) {
        if !self.enabled {
            return;
        }
        let state = self.calculate_progress_state();
        if let Some(ref callback) = self.callback {
            callback(state);
        }
    }

    /// Force completion and emit final 100% progress
    pub fn force_completion(&self) {
        if !self.enabled {
            return;
        }
        if let Some(ref callback) = self.callback {
            let mut state = self.calculate_progress_state();
            state.progress_percent = 100.0;
            state.processed_archives = state.total_archives;
            callback(state);
        }
    }

    /// Emit progress only if enough time has passed
    fn maybe_emit_progress(&self) {
        let now = Instant::now();
        let should_emit = match self.last_emit_time.lock() {
            Ok(mut last) if now.duration_since(*last) >= self.emit_interval => {
                *last = now;
                true
            }
            _ => false,
        };
        if should_emit {
            self.emit_progress();
        }
    }

    fn calculate_progress_state(&self) -> ProgressState {
        let total_archives = self.total_archives.load(Ordering::Relaxed);
        let processed_archives = self.processed_archives.load(Ordering::Relaxed);
        let students_emitted = self.students_emitted.load(Ordering::Relaxed) as u64;
        let progress_percent = if total_archives > 0 {
            ((processed_archives as f32 / total_archives as f32) * 100.0).min(100.0)
        } else {
            0.0
        };
        ProgressState {
            total_archives,
            processed_archives,
            students_emitted,
            elapsed_time: self.start_time.elapsed(),
            progress_percent,
        }
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(Duration::from_millis(100))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn batch_progress_fraction() {
        let p = BatchProgress { archives_processed: 3, total_archives: 4, students_emitted: 2 };
        assert!((p.fraction() - 0.75).abs() < f32::EPSILON);
        assert_eq!(BatchProgress::default().fraction(), 0.0);
    }

    #[test]
    fn test_progress_tracker() {
        let mut tracker = ProgressTracker::new(Duration::from_millis(0));
        let updates = Arc::new(Mutex::new(Vec::new()));
        let updates_clone = Arc::clone(&updates);
        tracker.enable_with_callback(move |state| {
            updates_clone.lock().unwrap().push(state.progress_percent);
        });

        tracker.set_total_archives(4);
        tracker.record_student(2);
        tracker.record_student(1);
        tracker.force_completion();

        let updates = updates.lock().unwrap();
        assert_eq!(updates.len(), 3);
        assert!((updates[0] - 50.0).abs() < 0.01);
        assert!((updates[1] - 75.0).abs() < 0.01);
        assert_eq!(updates[2], 100.0);
    }

    #[test]
    fn disabled_tracker_stays_silent() {
        let tracker = ProgressTracker::default();
        assert!(!tracker.is_enabled());
        tracker.set_total_archives(10);
        tracker.record_student(5);
        tracker.force_completion();
        assert_eq!(tracker.calculate_progress_state().processed_archives, 0);
    }

    #[test]
    fn throttles_by_interval() {
        let mut tracker = ProgressTracker::new(Duration::from_secs(3600));
        let updates = Arc::new(Mutex::new(Vec::new()));
        let updates_clone = Arc::clone(&updates);
        tracker.enable_with_callback(move |state| {
            updates_clone.lock().unwrap().push(state.students_emitted);
        });
        tracker.set_total_archives(3);
        tracker.record_student(1);
        tracker.record_student(1);
        assert!(updates.lock().unwrap().is_empty());
        tracker.force_completion();
        assert_eq!(*updates.lock().unwrap(), [2]);
    }
}
