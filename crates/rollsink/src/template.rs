// SPDX-License-Identifier: Apache-2.0 OR MIT
// Copyright (c) 2025-2026 naskel.com

//! Path templating and file matching.
//!
//! A [`PathTemplate`] is built once from a user pattern such as
//! `logs/app-{Date}.log` and translates both ways: from a (bucket, sequence)
//! pair to a concrete path, and from existing directory entries back into
//! structured [`RolledFile`] values.

use crate::bucket::BucketKind;
use crate::error::ConfigError;
use chrono::NaiveDateTime;
use regex::Regex;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// A rotated file recovered from a directory listing.
///
/// Ephemeral: recomputed on every listing, never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RolledFile {
    /// Bare file name, without directory.
    pub filename: String,
    /// Start instant of the bucket the file belongs to.
    pub bucket: NaiveDateTime,
    /// Collision sequence number (0 for the primary file of a bucket).
    pub sequence: u32,
}

/// Immutable path template parsed from a user-supplied pattern.
///
/// The pattern holds at most one placeholder token (`{Date}`, `{Hour}` or
/// `{HalfHour}`). A pattern without a token defaults to daily rotation with
/// the bucket value inserted before the file extension.
#[derive(Debug)]
pub struct PathTemplate {
    directory: PathBuf,
    prefix: String,
    suffix: String,
    bucket: BucketKind,
    matcher: Regex,
    glob: String,
}

impl PathTemplate {
    /// Parse a path pattern into a template.
    pub fn new(pattern: &str) -> Result<Self, ConfigError> {
        if pattern.trim().is_empty() {
            return Err(ConfigError::EmptyPattern);
        }

        let token_count: usize = BucketKind::ALL
            .iter()
            .map(|kind| pattern.matches(kind.token()).count())
            .sum();
        if token_count > 1 {
            return Err(ConfigError::MultiplePlaceholders);
        }

        let path = Path::new(pattern);
        let file_name = path
            .file_name()
            .and_then(|name| name.to_str())
            .ok_or(ConfigError::MissingFileName)?
            .to_string();

        let parent = path.parent().map(Path::to_path_buf).unwrap_or_default();
        let parent_str = parent.to_string_lossy();
        if BucketKind::ALL
            .iter()
            .any(|kind| parent_str.contains(kind.token()))
        {
            return Err(ConfigError::PlaceholderInDirectory);
        }

        let directory = if parent.as_os_str().is_empty() {
            env::current_dir()?
        } else if parent.is_absolute() {
            parent
        } else {
            env::current_dir()?.join(parent)
        };

        let (bucket, prefix, suffix) = match locate_token(&file_name) {
            Some((kind, at)) => (
                kind,
                file_name[..at].to_string(),
                file_name[at + kind.token().len()..].to_string(),
            ),
            // No token anywhere: daily buckets, inserted before the extension.
            None => match file_name.rfind('.').filter(|&at| at > 0) {
                Some(at) => (
                    BucketKind::Day,
                    format!("{}-", &file_name[..at]),
                    file_name[at..].to_string(),
                ),
                None => (BucketKind::Day, format!("{file_name}-"), String::new()),
            },
        };

        let matcher = Regex::new(&format!(
            "(?i)^{}(\\d{{{}}})(?:_(\\d{{3,}}))?{}$",
            regex::escape(&prefix),
            bucket.digits(),
            regex::escape(&suffix),
        ))
        .expect("escaped literal pattern is always a valid regex");
        let glob = format!("{prefix}*{suffix}");

        Ok(Self {
            directory,
            prefix,
            suffix,
            bucket,
            matcher,
            glob,
        })
    }

    /// Absolute directory the template writes into.
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Bucket granularity selected by the pattern.
    pub fn bucket(&self) -> BucketKind {
        self.bucket
    }

    /// Wildcard pattern enumerating plausible candidates before matching.
    pub fn search_glob(&self) -> &str {
        &self.glob
    }

    /// Concrete path for the bucket containing `t` and a sequence number.
    ///
    /// The sequence suffix `_NNN` only appears when `sequence > 0`, zero
    /// padded to at least three digits.
    pub fn path_for(&self, t: NaiveDateTime, sequence: u32) -> PathBuf {
        let mut name = format!("{}{}", self.prefix, self.bucket.render(t));
        if sequence > 0 {
            name.push_str(&format!("_{sequence:03}"));
        }
        name.push_str(&self.suffix);
        self.directory.join(name)
    }

    /// Match a single file name against the template.
    pub fn match_name(&self, name: &str) -> Option<RolledFile> {
        let caps = self.matcher.captures(name)?;
        let bucket = self.bucket.parse(caps.get(1)?.as_str())?;
        let sequence = match caps.get(2) {
            Some(digits) => digits.as_str().parse().ok()?,
            None => 0,
        };
        Some(RolledFile {
            filename: name.to_string(),
            bucket,
            sequence,
        })
    }

    /// Lazily match a list of file names against the template.
    ///
    /// Names whose bucket digits do not parse as a valid date and time are
    /// silently skipped. Pure function of its input, restartable.
    pub fn match_all<'a, I>(&'a self, names: I) -> impl Iterator<Item = RolledFile> + 'a
    where
        I: IntoIterator + 'a,
        I::Item: AsRef<str>,
    {
        names
            .into_iter()
            .filter_map(move |name| self.match_name(name.as_ref()))
    }

    /// Scan the template directory for rotated files.
    ///
    /// A missing directory yields an empty set.
    pub fn existing_files(&self) -> Vec<RolledFile> {
        let entries = match fs::read_dir(&self.directory) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };
        entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                if !entry.metadata().ok()?.is_file() {
                    return None;
                }
                let name = entry.file_name();
                let name = name.to_str()?;
                if !self.is_candidate(name) {
                    return None;
                }
                self.match_name(name)
            })
            .collect()
    }

    // Cheap case-insensitive prefix/suffix check, the moral equivalent of
    // listing with the search glob before regex filtering.
    fn is_candidate(&self, name: &str) -> bool {
        name.len() >= self.prefix.len() + self.suffix.len()
            && name
                .get(..self.prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(&self.prefix))
            && name
                .get(name.len() - self.suffix.len()..)
                .is_some_and(|tail| tail.eq_ignore_ascii_case(&self.suffix))
    }
}

fn locate_token(name: &str) -> Option<(BucketKind, usize)> {
    BucketKind::ALL
        .iter()
        .find_map(|&kind| name.find(kind.token()).map(|at| (kind, at)))
}
