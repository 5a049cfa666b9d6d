// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Retention policies for rotated files.
//!
//! Invoked after every successful rollover with the path of the just-opened
//! file. Both policies rescan the directory on each call and never delete
//! the file currently being written, even if nothing has been flushed to it
//! yet.

use crate::template::{PathTemplate, RolledFile};
use chrono::{Duration, NaiveDateTime};
use std::fs;
use std::path::Path;

/// A rule deleting obsolete rotated files after a rollover.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetentionPolicy {
    /// Keep at most this many files, the current one included.
    Count(usize),
    /// Delete files whose bucket start is older than `now - age`.
    Age(Duration),
}

impl RetentionPolicy {
    /// Sweep the template directory, deleting files beyond the limit.
    ///
    /// The file at `current_path` is treated as present even if empty and is
    /// never a deletion candidate. Each deletion is attempted independently;
    /// failures are reported and do not stop the sweep. Returns the number
    /// of files deleted.
    pub fn apply(&self, template: &PathTemplate, current_path: &Path, now: NaiveDateTime) -> usize {
        let current_name = current_path
            .file_name()
            .and_then(|name| name.to_str())
            .unwrap_or_default();

        let mut files = template.existing_files();
        if !files
            .iter()
            .any(|file| file.filename.eq_ignore_ascii_case(current_name))
        {
            files.extend(template.match_name(current_name));
        }
        // Newest first, by bucket then collision sequence.
        files.sort_by(|a, b| (b.bucket, b.sequence).cmp(&(a.bucket, a.sequence)));

        let doomed = files
            .iter()
            .filter(|file| !file.filename.eq_ignore_ascii_case(current_name));
        let doomed: Vec<&RolledFile> = match *self {
            RetentionPolicy::Count(limit) => doomed.skip(limit.saturating_sub(1)).collect(),
            RetentionPolicy::Age(age) => doomed.filter(|file| file.bucket < now - age).collect(),
        };

        let mut deleted = 0;
        for file in doomed {
            let path = template.directory().join(&file.filename);
            match fs::remove_file(&path) {
                Ok(()) => {
                    tracing::debug!(path = %path.display(), "deleted expired log file");
                    deleted += 1;
                }
                Err(err) => {
                    tracing::warn!(path = %path.display(), %err, "failed to delete expired log file");
                }
            }
        }
        deleted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn dt(y: i32, mo: u32, d: u32) -> NaiveDateTime {
        NaiveDate::from_ymd_opt(y, mo, d)
            .unwrap()
            .and_hms_opt(12, 0, 0)
            .unwrap()
    }

    fn template(dir: &TempDir) -> PathTemplate {
        let pattern = dir.path().join("log-{Date}.txt");
        PathTemplate::new(pattern.to_str().unwrap()).unwrap()
    }

    fn touch(dir: &TempDir, name: &str) {
        std::fs::write(dir.path().join(name), b"x").unwrap();
    }

    #[test]
    fn test_count_policy_keeps_newest_files() {
        let dir = TempDir::new().unwrap();
        let t = template(&dir);
        touch(&dir, "log-20230101.txt");
        touch(&dir, "log-20230102.txt");
        touch(&dir, "log-20230103.txt");

        let current = dir.path().join("log-20230103.txt");
        let deleted = RetentionPolicy::Count(2).apply(&t, &current, dt(2023, 1, 3));

        assert_eq!(deleted, 1);
        assert!(!dir.path().join("log-20230101.txt").exists());
        assert!(dir.path().join("log-20230102.txt").exists());
        assert!(dir.path().join("log-20230103.txt").exists());
    }

    #[test]
    fn test_count_policy_never_deletes_current_file() {
        let dir = TempDir::new().unwrap();
        let t = template(&dir);
        touch(&dir, "log-20230101.txt");
        touch(&dir, "log-20230102.txt");

        // Current file not yet on disk; it still counts as present.
        let current = dir.path().join("log-20230103.txt");
        let deleted = RetentionPolicy::Count(1).apply(&t, &current, dt(2023, 1, 3));

        assert_eq!(deleted, 2);
        assert!(!dir.path().join("log-20230101.txt").exists());
        assert!(!dir.path().join("log-20230102.txt").exists());
    }

    #[test]
    fn test_count_policy_orders_by_sequence_within_bucket() {
        let dir = TempDir::new().unwrap();
        let t = template(&dir);
        touch(&dir, "log-20230101.txt");
        touch(&dir, "log-20230101_001.txt");
        touch(&dir, "log-20230101_002.txt");

        let current = dir.path().join("log-20230101_002.txt");
        RetentionPolicy::Count(2).apply(&t, &current, dt(2023, 1, 1));

        // Current plus the newest survivor (_001) remain.
        assert!(!dir.path().join("log-20230101.txt").exists());
        assert!(dir.path().join("log-20230101_001.txt").exists());
        assert!(dir.path().join("log-20230101_002.txt").exists());
    }

    #[test]
    fn test_age_policy_deletes_only_stale_files() {
        let dir = TempDir::new().unwrap();
        let t = template(&dir);
        touch(&dir, "log-20230105.txt"); // today - 5
        touch(&dir, "log-20230107.txt"); // today - 3
        touch(&dir, "log-20230110.txt"); // today

        let current = dir.path().join("log-20230110.txt");
        let deleted = RetentionPolicy::Age(Duration::days(4)).apply(&t, &current, dt(2023, 1, 10));

        assert_eq!(deleted, 1);
        assert!(!dir.path().join("log-20230105.txt").exists());
        assert!(dir.path().join("log-20230107.txt").exists());
        assert!(dir.path().join("log-20230110.txt").exists());
    }

    #[test]
    fn test_age_policy_never_deletes_current_file() {
        let dir = TempDir::new().unwrap();
        let t = template(&dir);
        touch(&dir, "log-20230101.txt");

        let current = dir.path().join("log-20230101.txt");
        let deleted = RetentionPolicy::Age(Duration::days(1)).apply(&t, &current, dt(2023, 6, 1));

        assert_eq!(deleted, 0);
        assert!(dir.path().join("log-20230101.txt").exists());
    }

    #[test]
    fn test_policies_ignore_unrelated_files() {
        let dir = TempDir::new().unwrap();
        let t = template(&dir);
        touch(&dir, "log-20230101.txt");
        touch(&dir, "notes.txt");

        let current = dir.path().join("log-20230102.txt");
        RetentionPolicy::Count(1).apply(&t, &current, dt(2023, 1, 2));

        assert!(dir.path().join("notes.txt").exists());
        assert!(!dir.path().join("log-20230101.txt").exists());
    }
}
