//! Upload set: the files a user has queued for one submission.
//!
//! Only names matching the accepted extensions are taken, and a name can be
//! queued once. Observers hear about every change.

use crate::classify::has_extension;
use crate::common::UploadedEntry;
use crate::config::PipelineConfig;
use thiserror::Error;
use tracing::debug;

/// Why a file was refused.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RejectReason {
    #[error("You must upload an archive.")]
    NotAnArchive,
    #[error("That file has already been uploaded.")]
    Duplicate,
}

/// Callbacks for upload set changes. Every method defaults to doing nothing.
pub trait UploadObserver: Send {
    fn on_added(&mut self, _entry: &UploadedEntry) {}
    fn on_removed(&mut self, _entry: &UploadedEntry) {}
    fn on_rejected(&mut self, _name: &str, _reason: &RejectReason) {}
}

pub struct UploadSet {
    accepted: Vec<String>,
    entries: Vec<UploadedEntry>,
    observers: Vec<Box<dyn UploadObserver>>,
}

impl UploadSet {
    pub fn new(accepted: Vec<String>) -> Self {
        Self { accepted, entries: Vec::new(), observers: Vec::new() }
    }

    /// An upload set accepting the configured upload extensions.
    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.upload_extensions.clone())
    }

    pub fn subscribe(&mut self, observer: Box<dyn UploadObserver>) {
        self.observers.push(observer);
    }

    /// Queues `entry`, keyed by its file name.
    pub fn add(&mut self, entry: UploadedEntry) -> Result<(), RejectReason> {
        let name = entry.file_name().to_string();
        let verdict = if !has_extension(&name, &self.accepted) {
            Err(RejectReason::NotAnArchive)
        } else if self.contains(&name) {
            Err(RejectReason::Duplicate)
        } else {
            Ok(())
        };

        match verdict {
            Ok(()) => {
                debug!(file = %name, "file queued");
                self.observers.iter_mut().for_each(|o| o.on_added(&entry));
                self.entries.push(entry);
                Ok(())
            }
            Err(reason) => {
                debug!(file = %name, %reason, "file rejected");
                self.observers.iter_mut().for_each(|o| o.on_rejected(&name, &reason));
                Err(reason)
            }
        }
    }

    /// Adds every entry, collecting the rejections.
    pub fn add_all<I>(&mut self, entries: I) -> Vec<(String, RejectReason)>
    where
        I: IntoIterator<Item = UploadedEntry>,
    {
        let mut rejected = Vec::new();
        for entry in entries {
            let name = entry.file_name().to_string();
            if let Err(reason) = self.add(entry) {
                rejected.push((name, reason));
            }
        }
        rejected
    }

    /// Drops the entry named `name`. Returns whether anything was removed.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.entries.iter().position(|e| e.file_name() == name) {
            Some(index) => {
                let entry = self.entries.remove(index);
                self.observers.iter_mut().for_each(|o| o.on_removed(&entry));
                true
            }
            None => false,
        }
    }

    pub fn reset(&mut self) {
        while let Some(entry) = self.entries.first() {
            let name = entry.file_name().to_string();
            self.remove(&name);
        }
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.iter().any(|e| e.file_name() == name)
    }

    /// Queued entries in insertion order.
    pub fn entries(&self) -> &[UploadedEntry] {
        &self.entries
    }

    pub fn into_entries(self) -> Vec<UploadedEntry> {
        self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Human-readable size in KB, MB or GB, rounded to two decimals.
pub fn format_file_size(bytes: u64) -> String {
    let kb = bytes as f64 / 1024.0;
    let mb = kb / 1024.0;
    let gb = mb / 1024.0;
    let (size, unit) = if gb > 1.0 {
        (gb, "GB")
    } else if mb > 1.0 {
        (mb, "MB")
    } else {
        (kb, "KB")
    };
    format!("{} {}", (size * 100.0).round() / 100.0, unit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Recorder(Arc<Mutex<Vec<String>>>);

    impl UploadObserver for Recorder {
        fn on_added(&mut self, entry: &UploadedEntry) {
            self.0.lock().unwrap().push(format!("+{}", entry.file_name()));
        }
        fn on_removed(&mut self, entry: &UploadedEntry) {
            self.0.lock().unwrap().push(format!("-{}", entry.file_name()));
        }
        fn on_rejected(&mut self, name: &str, reason: &RejectReason) {
            self.0.lock().unwrap().push(format!("!{}: {}", name, reason));
        }
    }

    fn entry(name: &str) -> UploadedEntry {
        UploadedEntry::from_bytes(name, Vec::new())
    }

    #[test]
    fn accepts_archives_once() {
        let recorder = Recorder::default();
        let mut set = UploadSet::from_config(&PipelineConfig::default());
        set.subscribe(Box::new(recorder.clone()));

        assert!(set.add(entry("batch.zip")).is_ok());
        assert_eq!(set.add(entry("notes.py")), Err(RejectReason::NotAnArchive));
        assert_eq!(set.add(entry("batch.zip")), Err(RejectReason::Duplicate));
        assert!(set.add(entry("more.tar.gz")).is_ok());

        let names: Vec<&str> = set.entries().iter().map(|e| e.file_name()).collect();
        assert_eq!(names, ["batch.zip", "more.tar.gz"]);
        assert_eq!(
            *recorder.0.lock().unwrap(),
            [
                "+batch.zip",
                "!notes.py: You must upload an archive.",
                "!batch.zip: That file has already been uploaded.",
                "+more.tar.gz",
            ]
        );
    }

    #[test]
    fn remove_and_reset_notify() {
        let recorder = Recorder::default();
        let mut set = UploadSet::new(vec!["zip".into()]);
        set.subscribe(Box::new(recorder.clone()));
        let rejected =
            set.add_all(vec![entry("a.zip"), entry("b.zip"), entry("c.zip"), entry("c.rar")]);
        assert_eq!(rejected, [("c.rar".to_string(), RejectReason::NotAnArchive)]);

        assert!(set.remove("b.zip"));
        assert!(!set.remove("b.zip"));
        set.reset();
        assert!(set.is_empty());

        let log = recorder.0.lock().unwrap();
        assert_eq!(log[log.len() - 3..], ["-b.zip", "-a.zip", "-c.zip"]);
    }

    #[test]
    fn removed_name_can_be_added_again() {
        let mut set = UploadSet::new(vec!["zip".into()]);
        set.add(entry("a.zip")).unwrap();
        set.remove("a.zip");
        assert!(set.add(entry("a.zip")).is_ok());
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn file_sizes() {
        assert_eq!(format_file_size(512), "0.5 KB");
        assert_eq!(format_file_size(1024), "1 KB");
        assert_eq!(format_file_size(1536 * 1024), "1.5 MB");
        assert_eq!(format_file_size(3 * 1024 * 1024 * 1024 + 1), "3 GB");
        assert_eq!(format_file_size(1000), "0.98 KB");
    }
}
