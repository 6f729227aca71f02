//! Root inference for batch uploads.
//!
//! A batch is assumed to have one folder (the root) whose children divide the
//! students. The root is found by taking two archives that live in different
//! folders and snapping their first point of divergence back to the start of
//! the last folder segment they fully share.

use crate::common::UploadedEntry;
use crate::config::PipelineConfig;
use tracing::debug;

/// Index of the first byte at which `a` and `b` differ, or `None` when equal.
/// When one is a prefix of the other, the shorter length is the answer.
pub fn first_diff_index(a: &str, b: &str) -> Option<usize> {
    let (a, b) = (a.as_bytes(), b.as_bytes());
    let longer = a.len().max(b.len());
    (0..longer).find(|&i| a.get(i) != b.get(i))
}

/// Offset where student-specific path segments begin.
///
/// Only archive entries take part; other entries are skipped. `None` means the
/// root could not be determined (fewer than two archives, or every archive in
/// the same folder) and paths should be used as they are.
pub fn get_root_index(entries: &[UploadedEntry], config: &PipelineConfig) -> Option<usize> {
    let mut prev_path: Option<&str> = None;
    for entry in entries.iter().filter(|e| config.is_archive(e.path())) {
        let path = entry.parent_path();
        if let Some(prev) = prev_path.filter(|p| !p.is_empty()) {
            if path != prev {
                let diff = first_diff_index(path, prev).unwrap_or(path.len());
                let common = &path.as_bytes()[..diff];
                let root = common.iter().rposition(|&b| b == b'/').map_or(0, |i| i + 1);
                debug!(first = prev, second = path, root, "root index inferred");
                return Some(root);
            }
        }
        prev_path = Some(path);
    }
    None
}

/// The part of `path` after the root, or the whole path when there is no root.
/// Out-of-range roots yield an empty remainder.
pub fn strip_root(path: &str, root: Option<usize>) -> &str {
    match root {
        None => path,
        Some(i) => path.get(i..).unwrap_or(""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entries(paths: &[&str]) -> Vec<UploadedEntry> {
        paths.iter().map(|p| UploadedEntry::from_bytes(*p, Vec::new())).collect()
    }

    fn root_of(paths: &[&str]) -> Option<usize> {
        get_root_index(&entries(paths), &PipelineConfig::default())
    }

    #[test]
    fn diff_index() {
        assert_eq!(first_diff_index("batch/alice", "batch/bob"), Some(6));
        assert_eq!(first_diff_index("root/al", "root/alice"), Some(7));
        assert_eq!(first_diff_index("same", "same"), None);
        assert_eq!(first_diff_index("", "x"), Some(0));
    }

    #[test]
    fn two_students_under_one_root() {
        let root = root_of(&["batch/alice/sub.zip", "batch/bob/sub.zip"]);
        assert_eq!(root, Some("batch/".len()));
    }

    #[test]
    fn deeper_roots_snap_to_segment_start() {
        let root = root_of(&[
            "course/2021/assignment 1/ann/Submission attachment(s)/a.zip",
            "course/2021/assignment 1/anthony/Submission attachment(s)/b.zip",
        ]);
        assert_eq!(root, Some("course/2021/assignment 1/".len()));
    }

    #[test]
    fn prefix_named_students() {
        assert_eq!(root_of(&["root/al/a.zip", "root/alice/b.zip"]), Some("root/".len()));
    }

    #[test]
    fn no_shared_folder_gives_zero() {
        assert_eq!(root_of(&["alice/a.zip", "bob/b.zip"]), Some(0));
    }

    #[test]
    fn single_archive_is_undetermined() {
        assert_eq!(root_of(&["batch/alice/sub.zip"]), None);
        assert_eq!(root_of(&[]), None);
    }

    #[test]
    fn same_parent_is_undetermined() {
        assert_eq!(root_of(&["batch/a.zip", "batch/b.tar.gz", "batch/c.zip"]), None);
    }

    #[test]
    fn loose_files_are_ignored() {
        let root = root_of(&[
            "batch/alice/sub.zip",
            "batch/readme.txt",
            "other/notes.py",
            "batch/bob/sub.zip",
        ]);
        assert_eq!(root, Some("batch/".len()));
    }

    #[test]
    fn archives_found_after_first_with_same_parent() {
        let root = root_of(&["b/alice/1.zip", "b/alice/2.zip", "b/bob/1.zip"]);
        assert_eq!(root, Some(2));
    }

    #[test]
    fn strip_root_bounds() {
        assert_eq!(strip_root("batch/alice/a.zip", Some(6)), "alice/a.zip");
        assert_eq!(strip_root("batch/alice/a.zip", None), "batch/alice/a.zip");
        assert_eq!(strip_root("a.zip", Some(40)), "");
    }
}
